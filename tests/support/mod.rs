//! Shared fixtures for the integration tests.

#![allow(dead_code)]

pub mod channels;

use pokecatalog::{
    CatalogError, InMemoryStore, Pokemon, PokemonDraft, PokemonService, Store, Trainer,
    TrainerService,
};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness. Set `RUST_LOG=debug` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Trainer "Ash" and a Pikachu stored with the explicit id 25.
pub fn ash_and_pikachu(store: &InMemoryStore) -> (Trainer, Pokemon) {
    store
        .transaction(|uow| {
            let ash = TrainerService.create(uow, "Ash", "ash@pokemon.com")?;
            let pikachu = PokemonDraft::new(25, "Pikachu")
                .with_stats(35, 55, 40, 90)
                .validate(25)?;
            uow.persist(&pikachu)?;
            Ok::<_, CatalogError>((ash, pikachu))
        })
        .expect("seed ash and pikachu")
}

pub fn pokemon(store: &InMemoryStore, number: i64, name: &str) -> Pokemon {
    store
        .transaction(|uow| PokemonService.create(uow, &PokemonDraft::new(number, name)))
        .expect("seed pokemon")
}
