use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::store::{IndexKey, Record};

pub(crate) const TRAINER_INDEX: &str = "trainer";
pub(crate) const POKEMON_INDEX: &str = "pokemon";
pub(crate) const NAME_INDEX: &str = "name";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trainer {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl Record for Trainer {
    const COLLECTION: &'static str = "trainers";

    fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pokemon {
    pub id: u64,
    /// Species number. Several rows may share one.
    pub pokedex_number: u32,
    pub name: String,
    pub hp: u32,
    pub attack: u32,
    pub defense: u32,
    pub speed: u32,
}

impl Record for Pokemon {
    const COLLECTION: &'static str = "pokemons";

    fn id(&self) -> u64 {
        self.id
    }
}

/// Unvalidated pokemon attributes as they come from a request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PokemonDraft {
    pub pokedex_number: i64,
    pub name: String,
    pub hp: i64,
    pub attack: i64,
    pub defense: i64,
    pub speed: i64,
}

impl PokemonDraft {
    pub fn new(pokedex_number: i64, name: impl Into<String>) -> Self {
        Self {
            pokedex_number,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_stats(mut self, hp: i64, attack: i64, defense: i64, speed: i64) -> Self {
        self.hp = hp;
        self.attack = attack;
        self.defense = defense;
        self.speed = speed;
        self
    }

    /// Check the draft and build the entity it describes.
    pub fn validate(&self, id: u64) -> Result<Pokemon, CatalogError> {
        if self.pokedex_number <= 0 {
            return Err(CatalogError::validation(format!(
                "pokedex number must be positive, got {}",
                self.pokedex_number
            )));
        }
        Ok(Pokemon {
            id,
            pokedex_number: stat("pokedex number", self.pokedex_number)?,
            name: require_text("name", &self.name)?,
            hp: stat("hp", self.hp)?,
            attack: stat("attack", self.attack)?,
            defense: stat("defense", self.defense)?,
            speed: stat("speed", self.speed)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTag {
    pub id: u64,
    pub name: String,
}

impl Record for TypeTag {
    const COLLECTION: &'static str = "types";

    fn id(&self) -> u64 {
        self.id
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![IndexKey::new(NAME_INDEX, &self.name)]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountUser {
    pub id: u64,
    pub name: String,
    pub email: String,
}

impl Record for AccountUser {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> u64 {
        self.id
    }
}

/// Join entity: a trainer caught a pokemon. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    pub id: u64,
    pub trainer_id: u64,
    pub pokemon_id: u64,
    pub caught_at: SystemTime,
}

impl Record for Capture {
    const COLLECTION: &'static str = "captures";

    fn id(&self) -> u64 {
        self.id
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![
            IndexKey::new(TRAINER_INDEX, self.trainer_id),
            IndexKey::new(POKEMON_INDEX, self.pokemon_id),
        ]
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::validation(format!("{} must not be blank", field)));
    }
    Ok(trimmed.to_string())
}

fn stat(field: &str, value: i64) -> Result<u32, CatalogError> {
    u32::try_from(value).map_err(|_| {
        CatalogError::validation(format!(
            "{} must be between 0 and {}, got {}",
            field,
            u32::MAX,
            value
        ))
    })
}
