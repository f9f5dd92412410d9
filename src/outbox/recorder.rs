use tracing::debug;

use crate::error::CatalogError;
use crate::store::{Store, UnitOfWork};

use super::event::OutboxEvent;
use super::record::{EventKind, OutboxRecord};
use super::thread::DispatchTrigger;

/// Stages outbox records inside the caller's unit of work.
///
/// The record commits or rolls back together with the triggering write; the
/// recorder never talks to the channel. With a trigger attached, a committed
/// unit of work wakes the dispatcher right away instead of waiting for its
/// next sweep.
#[derive(Clone, Default)]
pub struct OutboxRecorder {
    trigger: Option<DispatchTrigger>,
}

impl OutboxRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trigger(trigger: DispatchTrigger) -> Self {
        Self {
            trigger: Some(trigger),
        }
    }

    pub fn record_pending<S: Store>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        kind: EventKind,
        payload: Vec<u8>,
    ) -> Result<OutboxRecord, CatalogError> {
        let id = uow.next_id::<OutboxRecord>()?;
        let record = OutboxRecord::pending(id, kind, payload);
        uow.persist(&record)?;

        if let Some(trigger) = &self.trigger {
            let trigger = trigger.clone();
            uow.after_commit(move || trigger.wake());
        }

        debug!(outbox_id = id, event_kind = kind.as_str(), "outbox record staged");
        Ok(record)
    }

    /// Encode `event` and stage it.
    pub fn record<S: Store, E: OutboxEvent>(
        &self,
        uow: &mut UnitOfWork<'_, S>,
        event: &E,
    ) -> Result<OutboxRecord, CatalogError> {
        let payload = event.encode()?;
        self.record_pending(uow, E::KIND, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbox::{AccountCreated, OutboxStore};
    use crate::store::InMemoryStore;

    fn event() -> AccountCreated {
        AccountCreated {
            user_id: 1,
            name: "Red".into(),
            email: "red@x.com".into(),
        }
    }

    #[test]
    fn staged_record_commits_with_the_unit_of_work() {
        let store = InMemoryStore::new();
        let recorder = OutboxRecorder::new();

        let mut uow = store.begin();
        let record = recorder.record(&mut uow, &event()).unwrap();
        assert!(store.outbox_records_pending().unwrap().is_empty());
        uow.commit().unwrap();

        let pending = store.outbox_records_pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, record.id);
        assert_eq!(pending[0].decode::<AccountCreated>().unwrap(), event());
    }

    #[test]
    fn rolled_back_record_never_persists() {
        let store = InMemoryStore::new();
        let recorder = OutboxRecorder::new();

        let mut uow = store.begin();
        recorder.record(&mut uow, &event()).unwrap();
        uow.rollback();

        assert!(store.outbox_records_pending().unwrap().is_empty());
    }

    #[test]
    fn trigger_fires_only_after_commit() {
        let store = InMemoryStore::new();
        let (trigger, signals) = DispatchTrigger::detached();
        let recorder = OutboxRecorder::with_trigger(trigger);

        let mut uow = store.begin();
        recorder.record(&mut uow, &event()).unwrap();
        uow.rollback();
        assert!(signals.try_recv().is_err());

        let mut uow = store.begin();
        recorder.record(&mut uow, &event()).unwrap();
        uow.commit().unwrap();
        assert!(signals.try_recv().is_ok());
    }
}
