//! Store - transactional record persistence behind an explicit unit of work.
//!
//! Records are plain serde structs identified by a numeric id inside a named
//! collection. The `Store` trait is the raw, type-erased boundary (bytes plus
//! a version per record); `UnitOfWork` layers typed reads, staged writes and
//! read-your-writes on top of it and applies everything atomically on commit.
//!
//! ## Example
//!
//! ```
//! use pokecatalog::{InMemoryStore, Store, Trainer};
//!
//! let store = InMemoryStore::new();
//! let trainer = store
//!     .transaction(|uow| {
//!         let trainer = Trainer {
//!             id: uow.next_id::<Trainer>()?,
//!             name: "Ash".into(),
//!             email: "ash@pokemon.com".into(),
//!         };
//!         uow.persist(&trainer)?;
//!         Ok(trainer)
//!     })
//!     .unwrap();
//! assert_eq!(store.count("trainers").unwrap(), 1);
//! assert_eq!(trainer.id, 1);
//! ```

mod in_memory;
mod unit_of_work;

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::error::CatalogError;

pub use in_memory::InMemoryStore;
pub(crate) use in_memory::Tables;
pub use unit_of_work::UnitOfWork;

/// Trait for types that can be persisted through a unit of work.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Collection name (a table in SQL, a key prefix in a KV store).
    const COLLECTION: &'static str;

    fn id(&self) -> u64;

    /// Secondary index entries for this record. The store keeps them in step
    /// with the committed rows.
    fn index_keys(&self) -> Vec<IndexKey> {
        Vec::new()
    }
}

/// A secondary index entry: index name plus the indexed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    pub name: &'static str,
    pub value: String,
}

impl IndexKey {
    pub fn new(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }
}

/// A record as the store holds it.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub bytes: Vec<u8>,
    pub version: u64,
    pub index_keys: Vec<IndexKey>,
}

/// Version expectation checked when a write is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// The record must not exist yet.
    Absent,
    /// The record must still be at this version.
    Version(u64),
    /// No check.
    Any,
}

/// One write of a change set.
#[derive(Debug, Clone)]
pub enum Write {
    Put {
        collection: &'static str,
        id: u64,
        bytes: Vec<u8>,
        index_keys: Vec<IndexKey>,
        expected: Expected,
    },
    Delete {
        collection: &'static str,
        id: u64,
        expected: Expected,
    },
}

impl Write {
    pub fn collection(&self) -> &'static str {
        match self {
            Write::Put { collection, .. } | Write::Delete { collection, .. } => collection,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Write::Put { id, .. } | Write::Delete { id, .. } => *id,
        }
    }
}

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// Optimistic concurrency conflict. `expected`/`actual` are versions,
    /// 0 meaning "absent".
    #[error(
        "concurrency conflict on {collection}:{id} \
         (expected version {expected}, actual {actual})"
    )]
    Conflict {
        collection: String,
        id: u64,
        expected: u64,
        actual: u64,
    },

    #[error("record missing: {collection}:{id}")]
    Missing { collection: String, id: u64 },

    #[error("record serialization error: {0}")]
    Serde(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}

/// Raw transactional persistence.
///
/// `apply` is the only mutation: a change set is validated against every
/// version expectation first and then applied in full, or not at all.
pub trait Store: Send + Sync {
    fn load(&self, collection: &str, id: u64) -> Result<Option<StoredRecord>, StoreError>;

    /// All committed records of a collection, ordered by id.
    fn scan(&self, collection: &str) -> Result<Vec<(u64, StoredRecord)>, StoreError>;

    /// Ids of committed records carrying the given index entry.
    fn lookup(&self, collection: &str, key: &IndexKey) -> Result<Vec<u64>, StoreError>;

    /// Allocate the next id of a collection. Allocations are not returned on
    /// rollback.
    fn next_id(&self, collection: &str) -> Result<u64, StoreError>;

    fn apply(&self, writes: Vec<Write>) -> Result<(), StoreError>;

    /// Open a unit of work against this store.
    fn begin(&self) -> UnitOfWork<'_, Self>
    where
        Self: Sized,
    {
        UnitOfWork::new(self)
    }

    /// Run `f` inside a unit of work: commit when it returns `Ok`, roll back
    /// when it returns `Err`.
    fn transaction<T, F>(&self, f: F) -> Result<T, CatalogError>
    where
        Self: Sized,
        F: FnOnce(&mut UnitOfWork<'_, Self>) -> Result<T, CatalogError>,
    {
        let mut uow = self.begin();
        match f(&mut uow) {
            Ok(value) => {
                uow.commit()?;
                Ok(value)
            }
            Err(err) => {
                uow.rollback();
                Err(err)
            }
        }
    }
}
