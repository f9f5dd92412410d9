use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::{CatalogError, EntityKind};
use crate::store::{IndexKey, Store, UnitOfWork};

use super::model::{Capture, Pokemon, Trainer, POKEMON_INDEX, TRAINER_INDEX};

/// Captures linking a trainer to a pokemon.
///
/// Both owners must exist when a capture is created. The trainer and pokemon
/// indexes are written in the same commit as the capture row, so listings
/// never see a half-written association.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssociationManager;

impl AssociationManager {
    pub fn new() -> Self {
        Self
    }

    /// Link `trainer_id` and `pokemon_id`. The trainer is checked first.
    pub fn create_capture<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        trainer_id: u64,
        pokemon_id: u64,
    ) -> Result<Capture, CatalogError> {
        if uow.find::<Trainer>(trainer_id)?.is_none() {
            return Err(CatalogError::not_found(EntityKind::Trainer, trainer_id));
        }
        if uow.find::<Pokemon>(pokemon_id)?.is_none() {
            return Err(CatalogError::not_found(EntityKind::Pokemon, pokemon_id));
        }

        let capture = Capture {
            id: uow.next_id::<Capture>()?,
            trainer_id,
            pokemon_id,
            caught_at: SystemTime::now(),
        };
        uow.persist(&capture)?;
        info!(capture_id = capture.id, trainer_id, pokemon_id, "capture created");
        Ok(capture)
    }

    pub fn get_capture<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<Option<Capture>, CatalogError> {
        Ok(uow.find(id)?)
    }

    /// Captures of a trainer, ordered by id. Empty when the trainer does not
    /// exist.
    pub fn list_captures_by_trainer<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        trainer_id: u64,
    ) -> Result<Vec<Capture>, CatalogError> {
        if uow.find::<Trainer>(trainer_id)?.is_none() {
            return Ok(Vec::new());
        }
        Ok(uow.find_by_index(&IndexKey::new(TRAINER_INDEX, trainer_id))?)
    }

    /// Captures of a pokemon, ordered by id. Empty when the pokemon does not
    /// exist.
    pub fn list_captures_by_pokemon<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        pokemon_id: u64,
    ) -> Result<Vec<Capture>, CatalogError> {
        if uow.find::<Pokemon>(pokemon_id)?.is_none() {
            return Ok(Vec::new());
        }
        Ok(uow.find_by_index(&IndexKey::new(POKEMON_INDEX, pokemon_id))?)
    }

    /// Remove a capture and its index entries. Unknown ids are a no-op.
    pub fn delete_capture<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        id: u64,
    ) -> Result<bool, CatalogError> {
        let removed = uow.remove::<Capture>(id)?;
        if !removed {
            debug!(capture_id = id, "capture already absent");
        }
        Ok(removed)
    }
}
