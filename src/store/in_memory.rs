//! InMemoryStore - HashMap-backed transactional store for tests and single-process use.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Expected, IndexKey, Store, StoreError, StoredRecord, Write};

#[derive(Default)]
pub(crate) struct Tables {
    pub(crate) collections: HashMap<String, BTreeMap<u64, StoredRecord>>,
    indexes: HashMap<(String, IndexKey), BTreeSet<u64>>,
    sequences: HashMap<String, u64>,
}

impl Tables {
    fn current_version(&self, collection: &str, id: u64) -> u64 {
        self.collections
            .get(collection)
            .and_then(|rows| rows.get(&id))
            .map(|stored| stored.version)
            .unwrap_or(0)
    }

    fn check(&self, write: &Write) -> Result<(), StoreError> {
        let (collection, id, expected) = match write {
            Write::Put {
                collection,
                id,
                expected,
                ..
            }
            | Write::Delete {
                collection,
                id,
                expected,
            } => (*collection, *id, *expected),
        };
        let actual = self.current_version(collection, id);
        let wanted = match expected {
            Expected::Any => return Ok(()),
            Expected::Absent => 0,
            Expected::Version(version) => version,
        };
        if actual != wanted {
            return Err(StoreError::Conflict {
                collection: collection.to_string(),
                id,
                expected: wanted,
                actual,
            });
        }
        Ok(())
    }

    /// Committed rows of `collection` carrying `key`, ordered by id.
    pub(crate) fn indexed_rows(&self, collection: &str, key: &IndexKey) -> Vec<&StoredRecord> {
        let (Some(ids), Some(rows)) = (
            self.indexes.get(&(collection.to_string(), key.clone())),
            self.collections.get(collection),
        ) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| rows.get(id)).collect()
    }

    fn unindex(&mut self, collection: &str, id: u64, keys: &[IndexKey]) {
        for key in keys {
            let slot = (collection.to_string(), key.clone());
            if let Some(ids) = self.indexes.get_mut(&slot) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.indexes.remove(&slot);
                }
            }
        }
    }

    /// Replace or insert a row, keeping indexes and the sequence in step.
    pub(crate) fn put(
        &mut self,
        collection: &str,
        id: u64,
        bytes: Vec<u8>,
        index_keys: Vec<IndexKey>,
    ) -> u64 {
        let previous = self
            .collections
            .get_mut(collection)
            .and_then(|rows| rows.remove(&id));
        let version = match previous {
            Some(old) => {
                self.unindex(collection, id, &old.index_keys);
                old.version + 1
            }
            None => 1,
        };

        for key in &index_keys {
            self.indexes
                .entry((collection.to_string(), key.clone()))
                .or_default()
                .insert(id);
        }

        let sequence = self.sequences.entry(collection.to_string()).or_insert(0);
        if *sequence < id {
            *sequence = id;
        }

        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(
                id,
                StoredRecord {
                    bytes,
                    version,
                    index_keys,
                },
            );
        version
    }

    fn delete(&mut self, collection: &str, id: u64) {
        let removed = self
            .collections
            .get_mut(collection)
            .and_then(|rows| rows.remove(&id));
        if let Some(old) = removed {
            self.unindex(collection, id, &old.index_keys);
        }
    }
}

/// In-memory store backed by a HashMap of collections.
///
/// Clone-friendly via Arc: every clone is another handle to the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn read_tables(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::LockPoisoned("read"))
    }

    pub(crate) fn write_tables(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::LockPoisoned("write"))
    }

    /// Number of committed records in a collection.
    pub fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let tables = self.read_tables()?;
        Ok(tables
            .collections
            .get(collection)
            .map(BTreeMap::len)
            .unwrap_or(0))
    }
}

impl Store for InMemoryStore {
    fn load(&self, collection: &str, id: u64) -> Result<Option<StoredRecord>, StoreError> {
        let tables = self.read_tables()?;
        Ok(tables
            .collections
            .get(collection)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    fn scan(&self, collection: &str) -> Result<Vec<(u64, StoredRecord)>, StoreError> {
        let tables = self.read_tables()?;
        Ok(tables
            .collections
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .map(|(id, stored)| (*id, stored.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn lookup(&self, collection: &str, key: &IndexKey) -> Result<Vec<u64>, StoreError> {
        let tables = self.read_tables()?;
        Ok(tables
            .indexes
            .get(&(collection.to_string(), key.clone()))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    fn next_id(&self, collection: &str) -> Result<u64, StoreError> {
        let mut tables = self.write_tables()?;
        let sequence = tables.sequences.entry(collection.to_string()).or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }

    fn apply(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        let mut tables = self.write_tables()?;

        for write in &writes {
            tables.check(write)?;
        }

        for write in writes {
            match write {
                Write::Put {
                    collection,
                    id,
                    bytes,
                    index_keys,
                    ..
                } => {
                    tables.put(collection, id, bytes, index_keys);
                }
                Write::Delete { collection, id, .. } => tables.delete(collection, id),
            }
        }

        Ok(())
    }
}
