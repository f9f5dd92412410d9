use std::time::{Duration, SystemTime};

use crate::store::{InMemoryStore, Record, StoreError, Tables};

use super::record::{OutboxRecord, OutboxStatus};

/// Outbox operations a store must provide for the dispatcher.
///
/// Every transition is an atomic compare-and-set on the record status, so
/// concurrent dispatchers never hold the same record at once.
pub trait OutboxStore: Send + Sync {
    /// Records with the given status, oldest first.
    fn outbox_records_by_status(
        &self,
        status: OutboxStatus,
    ) -> Result<Vec<OutboxRecord>, StoreError>;

    fn outbox_records_pending(&self) -> Result<Vec<OutboxRecord>, StoreError> {
        self.outbox_records_by_status(OutboxStatus::Pending)
    }

    fn outbox_record(&self, id: u64) -> Result<Option<OutboxRecord>, StoreError>;

    /// Claim up to `max` claimable records (pending, or in flight with an
    /// expired lease), oldest first.
    fn claim_outbox_records(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, StoreError>;

    /// Mark a claimed record delivered. Returns false if `worker_id` no longer
    /// holds the claim.
    fn complete_outbox_record(&self, id: u64, worker_id: &str) -> Result<bool, StoreError>;

    /// Return a claimed record to pending. Returns false if `worker_id` no
    /// longer holds the claim.
    fn release_outbox_record(
        &self,
        id: u64,
        worker_id: &str,
        error: &str,
    ) -> Result<bool, StoreError>;
}

impl InMemoryStore {
    fn update_outbox_record<F>(&self, id: u64, update: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut OutboxRecord) -> bool,
    {
        let mut tables = self.write_tables()?;
        let stored = tables
            .collections
            .get(OutboxRecord::COLLECTION)
            .and_then(|rows| rows.get(&id));

        let Some(stored) = stored else {
            return Ok(false);
        };
        let mut record: OutboxRecord = serde_json::from_slice(&stored.bytes)?;
        if !update(&mut record) {
            return Ok(false);
        }

        let bytes = serde_json::to_vec(&record)?;
        tables.put(OutboxRecord::COLLECTION, id, bytes, record.index_keys());
        Ok(true)
    }
}

/// Records in `status`, read through the status index so delivered history
/// is never scanned.
fn with_status(tables: &Tables, status: OutboxStatus) -> Result<Vec<OutboxRecord>, StoreError> {
    tables
        .indexed_rows(OutboxRecord::COLLECTION, &OutboxRecord::status_key(status))
        .into_iter()
        .map(|stored| serde_json::from_slice(&stored.bytes).map_err(StoreError::from))
        .collect()
}

fn oldest_first(records: &mut [OutboxRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

impl OutboxStore for InMemoryStore {
    fn outbox_records_by_status(
        &self,
        status: OutboxStatus,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let tables = self.read_tables()?;
        let mut records = with_status(&tables, status)?;
        oldest_first(&mut records);
        Ok(records)
    }

    fn outbox_record(&self, id: u64) -> Result<Option<OutboxRecord>, StoreError> {
        let tables = self.read_tables()?;
        tables
            .collections
            .get(OutboxRecord::COLLECTION)
            .and_then(|rows| rows.get(&id))
            .map(|stored| serde_json::from_slice(&stored.bytes).map_err(StoreError::from))
            .transpose()
    }

    fn claim_outbox_records(
        &self,
        worker_id: &str,
        max: usize,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, StoreError> {
        let mut tables = self.write_tables()?;
        let now = SystemTime::now();

        let mut candidates = with_status(&tables, OutboxStatus::Pending)?;
        let expired = with_status(&tables, OutboxStatus::InFlight)?
            .into_iter()
            .filter(|record| record.is_claimable(now));
        candidates.extend(expired);
        oldest_first(&mut candidates);

        let mut claimed = Vec::new();
        for mut record in candidates.into_iter().take(max) {
            if record.claim(worker_id, lease, now) {
                let bytes = serde_json::to_vec(&record)?;
                tables.put(OutboxRecord::COLLECTION, record.id, bytes, record.index_keys());
                claimed.push(record);
            }
        }

        Ok(claimed)
    }

    fn complete_outbox_record(&self, id: u64, worker_id: &str) -> Result<bool, StoreError> {
        self.update_outbox_record(id, |record| record.complete(worker_id, SystemTime::now()))
    }

    fn release_outbox_record(
        &self,
        id: u64,
        worker_id: &str,
        error: &str,
    ) -> Result<bool, StoreError> {
        self.update_outbox_record(id, |record| record.release(worker_id, error))
    }
}
