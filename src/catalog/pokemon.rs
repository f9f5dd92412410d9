use tracing::info;

use crate::error::CatalogError;
use crate::store::{Store, UnitOfWork};

use super::model::{Pokemon, PokemonDraft};

/// Pokemon CRUD. Drafts are validated before anything is staged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PokemonService;

impl PokemonService {
    pub fn new() -> Self {
        Self
    }

    pub fn create<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        draft: &PokemonDraft,
    ) -> Result<Pokemon, CatalogError> {
        let mut pokemon = draft.validate(0)?;
        pokemon.id = uow.next_id::<Pokemon>()?;
        uow.persist(&pokemon)?;
        info!(pokemon_id = pokemon.id, pokedex_number = pokemon.pokedex_number, "pokemon created");
        Ok(pokemon)
    }

    pub fn find<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<Option<Pokemon>, CatalogError> {
        Ok(uow.find(id)?)
    }

    /// All pokemon ordered by species number, then id.
    pub fn list<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
    ) -> Result<Vec<Pokemon>, CatalogError> {
        let mut pokemons: Vec<Pokemon> = uow.find_all()?;
        pokemons.sort_by_key(|pokemon| (pokemon.pokedex_number, pokemon.id));
        Ok(pokemons)
    }

    pub fn update<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
        draft: &PokemonDraft,
    ) -> Result<Option<Pokemon>, CatalogError> {
        let pokemon = draft.validate(id)?;
        if uow.find::<Pokemon>(id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(uow.merge(&pokemon)?))
    }

    pub fn delete<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<bool, CatalogError> {
        Ok(uow.remove::<Pokemon>(id)?)
    }
}
