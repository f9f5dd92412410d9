mod catalog;
mod channel;
mod config;
mod error;
mod outbox;
mod store;

pub use catalog::{
    AccountService, AccountUser, AssociationManager, Capture, Pokemon, PokemonDraft,
    PokemonService, Trainer, TrainerService, TypeService, TypeTag,
};
#[cfg(feature = "emitter")]
pub use channel::EmitterChannel;
pub use channel::{Channel, ChannelError, DeliveryReceipt, InMemoryChannel, LogChannel, Message};
pub use config::DispatcherConfig;
pub use error::{CatalogError, EntityKind, Result};
pub use outbox::{
    AccountCreated, DispatchTrigger, DispatcherStats, DispatcherThread, DrainResult, EventKind,
    NotificationDispatcher, OutboxEvent, OutboxRecord, OutboxRecorder, OutboxStatus, OutboxStore,
    Signal,
};
pub use store::{
    Expected, InMemoryStore, IndexKey, Record, Store, StoreError, StoredRecord, UnitOfWork, Write,
};

// Re-export the EventEmitter from the event_emitter_rs crate
#[cfg(feature = "emitter")]
pub use event_emitter_rs::EventEmitter;
