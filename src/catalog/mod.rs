//! Catalog - trainers, pokemon, types, account users and the captures that
//! link trainers to pokemon.
//!
//! Every service operation runs inside a caller-owned `UnitOfWork`, so several
//! operations can be grouped into one atomic commit:
//!
//! ```
//! use pokecatalog::{
//!     AssociationManager, InMemoryStore, PokemonDraft, PokemonService, Store, TrainerService,
//! };
//!
//! let store = InMemoryStore::new();
//! let capture = store
//!     .transaction(|uow| {
//!         let ash = TrainerService.create(uow, "Ash", "ash@pokemon.com")?;
//!         let pikachu = PokemonService.create(uow, &PokemonDraft::new(25, "Pikachu"))?;
//!         AssociationManager.create_capture(uow, ash.id, pikachu.id)
//!     })
//!     .unwrap();
//! assert_eq!(capture.pokemon_id, 1);
//! ```

mod account;
mod association;
mod model;
mod pokemon;
mod trainer;
mod type_tag;

pub use account::AccountService;
pub use association::AssociationManager;
pub use model::{AccountUser, Capture, Pokemon, PokemonDraft, Trainer, TypeTag};
pub use pokemon::PokemonService;
pub use trainer::TrainerService;
pub use type_tag::TypeService;
