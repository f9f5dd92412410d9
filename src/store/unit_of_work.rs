//! UnitOfWork - explicit transaction object over a `Store`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::mem;

use tracing::debug;

use super::{Expected, IndexKey, Record, Store, StoreError, Write};

type Key = (&'static str, u64);

/// A write queued until commit (type-erased).
enum Staged {
    Put {
        bytes: Vec<u8>,
        index_keys: Vec<IndexKey>,
        expected: Expected,
    },
    Delete {
        expected: Expected,
    },
}

/// Scoped unit of work.
///
/// Writes are staged locally and reach the store in one atomic `apply` on
/// `commit`. Reads go through the staged writes first, so code running in the
/// unit of work sees its own changes. Records read from the store remember
/// their version; `merge` and `remove` are checked against it at commit.
///
/// A unit of work that is dropped without `commit` is rolled back.
pub struct UnitOfWork<'a, S: Store> {
    store: &'a S,
    staged: BTreeMap<Key, Staged>,
    observed: HashMap<Key, u64>,
    after_commit: Vec<Box<dyn FnOnce() + Send + 'a>>,
    finished: bool,
}

impl<'a, S: Store> UnitOfWork<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
            observed: HashMap::new(),
            after_commit: Vec::new(),
            finished: false,
        }
    }

    /// The store this unit of work runs against.
    pub fn store(&self) -> &'a S {
        self.store
    }

    /// Number of staged writes.
    pub fn pending_writes(&self) -> usize {
        self.staged.len()
    }

    pub fn next_id<M: Record>(&self) -> Result<u64, StoreError> {
        self.store.next_id(M::COLLECTION)
    }

    /// Find a record by id.
    pub fn find<M: Record>(&mut self, id: u64) -> Result<Option<M>, StoreError> {
        let key = (M::COLLECTION, id);
        match self.staged.get(&key) {
            Some(Staged::Put { bytes, .. }) => return Ok(Some(serde_json::from_slice(bytes)?)),
            Some(Staged::Delete { .. }) => return Ok(None),
            None => {}
        }

        match self.store.load(M::COLLECTION, id)? {
            Some(stored) => {
                self.observed.insert(key, stored.version);
                Ok(Some(serde_json::from_slice(&stored.bytes)?))
            }
            None => Ok(None),
        }
    }

    /// All records of a collection, ordered by id.
    pub fn find_all<M: Record>(&mut self) -> Result<Vec<M>, StoreError> {
        let mut rows = BTreeMap::new();
        for (id, stored) in self.store.scan(M::COLLECTION)? {
            if self.staged.contains_key(&(M::COLLECTION, id)) {
                continue;
            }
            self.observed.insert((M::COLLECTION, id), stored.version);
            rows.insert(id, serde_json::from_slice::<M>(&stored.bytes)?);
        }

        for ((collection, id), staged) in &self.staged {
            if *collection != M::COLLECTION {
                continue;
            }
            if let Staged::Put { bytes, .. } = staged {
                rows.insert(*id, serde_json::from_slice::<M>(bytes)?);
            }
        }

        Ok(rows.into_values().collect())
    }

    /// Records carrying the given secondary index entry, ordered by id.
    pub fn find_by_index<M: Record>(&mut self, index: &IndexKey) -> Result<Vec<M>, StoreError> {
        let mut ids: BTreeSet<u64> = self
            .store
            .lookup(M::COLLECTION, index)?
            .into_iter()
            .collect();

        for ((collection, id), staged) in &self.staged {
            if *collection != M::COLLECTION {
                continue;
            }
            match staged {
                Staged::Put { index_keys, .. } if index_keys.contains(index) => {
                    ids.insert(*id);
                }
                _ => {
                    ids.remove(id);
                }
            }
        }

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.find::<M>(id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Stage the insertion of a new record. Fails at commit if a record with
    /// the same id exists by then.
    pub fn persist<M: Record>(&mut self, record: &M) -> Result<(), StoreError> {
        let key = (M::COLLECTION, record.id());
        let expected = match self.staged.get(&key) {
            Some(Staged::Put { .. }) => {
                return Err(StoreError::Conflict {
                    collection: M::COLLECTION.to_string(),
                    id: record.id(),
                    expected: 0,
                    actual: self.observed.get(&key).copied().unwrap_or(1),
                });
            }
            Some(Staged::Delete { expected }) => *expected,
            None => Expected::Absent,
        };

        self.staged.insert(
            key,
            Staged::Put {
                bytes: serde_json::to_vec(record)?,
                index_keys: record.index_keys(),
                expected,
            },
        );
        Ok(())
    }

    /// Stage an update of an existing record.
    pub fn merge<M: Record>(&mut self, record: &M) -> Result<M, StoreError> {
        let key = (M::COLLECTION, record.id());
        let expected = match self.staged.get(&key) {
            Some(Staged::Put { expected, .. }) => *expected,
            Some(Staged::Delete { .. }) => return Err(missing::<M>(record.id())),
            None => Expected::Version(self.observed_version::<M>(record.id())?),
        };

        self.staged.insert(
            key,
            Staged::Put {
                bytes: serde_json::to_vec(record)?,
                index_keys: record.index_keys(),
                expected,
            },
        );
        Ok(record.clone())
    }

    /// Stage the removal of a record. Returns false if there was nothing to
    /// remove.
    pub fn remove<M: Record>(&mut self, id: u64) -> Result<bool, StoreError> {
        let key = (M::COLLECTION, id);
        match self.staged.get(&key) {
            Some(Staged::Put {
                expected: Expected::Absent,
                ..
            }) => {
                self.staged.remove(&key);
                Ok(true)
            }
            Some(Staged::Put { expected, .. }) => {
                let expected = *expected;
                self.staged.insert(key, Staged::Delete { expected });
                Ok(true)
            }
            Some(Staged::Delete { .. }) => Ok(false),
            None => match self.observed_version::<M>(id) {
                Ok(version) => {
                    self.staged.insert(
                        key,
                        Staged::Delete {
                            expected: Expected::Version(version),
                        },
                    );
                    Ok(true)
                }
                Err(StoreError::Missing { .. }) => Ok(false),
                Err(err) => Err(err),
            },
        }
    }

    /// Register a callback to run once this unit of work has committed.
    /// Callbacks never run on rollback.
    pub fn after_commit(&mut self, hook: impl FnOnce() + Send + 'a) {
        self.after_commit.push(Box::new(hook));
    }

    /// Apply every staged write atomically, then run the after-commit hooks.
    pub fn commit(mut self) -> Result<(), StoreError> {
        self.finished = true;
        let staged = mem::take(&mut self.staged);
        let hooks = mem::take(&mut self.after_commit);

        let writes: Vec<Write> = staged
            .into_iter()
            .map(|((collection, id), staged)| match staged {
                Staged::Put {
                    bytes,
                    index_keys,
                    expected,
                } => Write::Put {
                    collection,
                    id,
                    bytes,
                    index_keys,
                    expected,
                },
                Staged::Delete { expected } => Write::Delete {
                    collection,
                    id,
                    expected,
                },
            })
            .collect();

        let count = writes.len();
        if count > 0 {
            if let Err(err) = self.store.apply(writes) {
                debug!(error = %err, "unit of work commit rejected, rolled back");
                return Err(err);
            }
        }
        debug!(writes = count, "unit of work committed");

        for hook in hooks {
            hook();
        }
        Ok(())
    }

    /// Discard every staged write.
    pub fn rollback(mut self) {
        self.finished = true;
        debug!(writes = self.staged.len(), "unit of work rolled back");
        self.staged.clear();
        self.after_commit.clear();
    }

    fn observed_version<M: Record>(&mut self, id: u64) -> Result<u64, StoreError> {
        let key = (M::COLLECTION, id);
        if let Some(version) = self.observed.get(&key) {
            return Ok(*version);
        }
        match self.store.load(M::COLLECTION, id)? {
            Some(stored) => {
                self.observed.insert(key, stored.version);
                Ok(stored.version)
            }
            None => Err(missing::<M>(id)),
        }
    }
}

impl<S: Store> Drop for UnitOfWork<'_, S> {
    fn drop(&mut self) {
        if !self.finished && !self.staged.is_empty() {
            debug!(
                writes = self.staged.len(),
                "unit of work dropped without commit, rolled back"
            );
        }
    }
}

fn missing<M: Record>(id: u64) -> StoreError {
    StoreError::Missing {
        collection: M::COLLECTION.to_string(),
        id,
    }
}
