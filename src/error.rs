use std::fmt;

use thiserror::Error;

use crate::channel::ChannelError;
use crate::store::StoreError;

/// The aggregate a capture referenced but could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Trainer,
    Pokemon,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Trainer => "Trainer",
            EntityKind::Pokemon => "Pokemon",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by catalog operations.
///
/// `NotFound` and `ValidationFailed` are client errors and are never retried.
/// `PersistenceConflict` is retryable by the caller of the triggering write.
/// `TransientChannelFailure` only ever appears inside the dispatcher; the
/// request path never sees it.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{kind} not found with id: {id}")]
    NotFound { kind: EntityKind, id: u64 },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("transient channel failure: {0}")]
    TransientChannelFailure(#[from] ChannelError),

    #[error(
        "persistence conflict on {collection}:{id} \
         (expected version {expected}, actual {actual})"
    )]
    PersistenceConflict {
        collection: String,
        id: u64,
        expected: u64,
        actual: u64,
    },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("payload encoding failed: {0}")]
    Encode(String),
}

impl CatalogError {
    pub fn not_found(kind: EntityKind, id: u64) -> Self {
        CatalogError::NotFound { kind, id }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        CatalogError::ValidationFailed(reason.into())
    }

    /// Whether the caller may retry the whole unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::PersistenceConflict { .. } | CatalogError::TransientChannelFailure(_)
        )
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                collection,
                id,
                expected,
                actual,
            } => CatalogError::PersistenceConflict {
                collection,
                id,
                expected,
                actual,
            },
            other => CatalogError::Store(other),
        }
    }
}

impl From<bitcode::Error> for CatalogError {
    fn from(err: bitcode::Error) -> Self {
        CatalogError::Encode(err.to_string())
    }
}

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_kind_and_id() {
        let err = CatalogError::not_found(EntityKind::Trainer, 999);
        assert_eq!(err.to_string(), "Trainer not found with id: 999");
    }

    #[test]
    fn missing_pokemon_is_named_in_the_message() {
        let err = CatalogError::not_found(EntityKind::Pokemon, 150);
        assert_eq!(err.to_string(), "Pokemon not found with id: 150");
        assert!(!err.is_retryable());
    }

    #[test]
    fn store_conflict_maps_to_persistence_conflict() {
        let err: CatalogError = StoreError::Conflict {
            collection: "trainers".into(),
            id: 1,
            expected: 1,
            actual: 2,
        }
        .into();
        assert!(matches!(err, CatalogError::PersistenceConflict { id: 1, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn validation_is_not_retryable() {
        assert!(!CatalogError::validation("negative hp").is_retryable());
    }
}
