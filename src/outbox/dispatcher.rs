use std::time::Instant;

use tracing::{info, warn};

use crate::channel::{Channel, ChannelError};
use crate::config::DispatcherConfig;
use crate::error::CatalogError;
use crate::store::StoreError;

use super::record::OutboxRecord;
use super::repository_ext::OutboxStore;

/// Result of a drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainResult {
    pub claimed: usize,
    pub delivered: usize,
    /// Publish failed; the record is pending again.
    pub released: usize,
    /// The claim expired and another dispatcher took the record over before
    /// this one could finish it.
    pub lost: usize,
}

impl DrainResult {
    /// Records this drain worked on.
    pub fn processed(&self) -> usize {
        self.claimed
    }

    fn merge(&mut self, outcome: Outcome) {
        self.claimed += 1;
        match outcome {
            Outcome::Delivered => self.delivered += 1,
            Outcome::Released => self.released += 1,
            Outcome::Lost => self.lost += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Delivered,
    Released,
    Lost,
}

/// Drives pending outbox records to a channel.
///
/// Each record is claimed in the store before it is published, so two
/// dispatchers draining the same store never publish the same record
/// concurrently. Publish failures leave the record pending for a later drain;
/// they are logged, never returned.
pub struct NotificationDispatcher<S, C> {
    store: S,
    channel: C,
    config: DispatcherConfig,
}

impl<S, C> NotificationDispatcher<S, C> {
    pub fn new(store: S, channel: C) -> Self {
        Self::with_config(store, channel, DispatcherConfig::default())
    }

    /// The lease in `config` is stretched past its publish timeout if needed.
    pub fn with_config(store: S, channel: C, config: DispatcherConfig) -> Self {
        Self {
            store,
            channel,
            config: config.clamped(),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}

impl<S: OutboxStore, C: Channel> NotificationDispatcher<S, C> {
    /// Claim and publish pending records, oldest first, batch by batch.
    ///
    /// Stops when nothing is left to claim or after the first batch in which
    /// the channel failed. Only store failures are returned.
    pub fn drain_pending(&self) -> Result<DrainResult, StoreError> {
        let mut result = DrainResult::default();
        let batch_size = self.config.batch_size.max(1);

        loop {
            let batch = self.store.claim_outbox_records(
                &self.config.worker_id,
                batch_size,
                self.config.lease,
            )?;
            let claimed = batch.len();
            if claimed == 0 {
                break;
            }

            let mut channel_failed = false;
            for record in &batch {
                let outcome = self.dispatch(record)?;
                channel_failed |= outcome == Outcome::Released;
                result.merge(outcome);
            }

            if channel_failed || claimed < batch_size {
                break;
            }
        }

        Ok(result)
    }

    fn dispatch(&self, record: &OutboxRecord) -> Result<Outcome, StoreError> {
        let worker_id = self.config.worker_id.as_str();
        let timeout = self.config.publish_timeout;
        let message = record.to_message();

        let started = Instant::now();
        let published = match self.channel.publish(&message, timeout) {
            Ok(_) if started.elapsed() > timeout => Err(ChannelError::Timeout(timeout)),
            other => other,
        };

        match published {
            Ok(receipt) => {
                if self.store.complete_outbox_record(record.id, worker_id)? {
                    info!(
                        outbox_id = record.id,
                        message_id = %message.id,
                        attempt = record.attempts,
                        duplicate = receipt.duplicate,
                        "outbox record delivered"
                    );
                    Ok(Outcome::Delivered)
                } else {
                    warn!(outbox_id = record.id, worker_id, "claim lost before completion");
                    Ok(Outcome::Lost)
                }
            }
            Err(err) => {
                let failure = CatalogError::TransientChannelFailure(err);
                warn!(
                    outbox_id = record.id,
                    attempt = record.attempts,
                    error = %failure,
                    "publish failed, record left pending"
                );
                if self
                    .store
                    .release_outbox_record(record.id, worker_id, &failure.to_string())?
                {
                    Ok(Outcome::Released)
                } else {
                    warn!(outbox_id = record.id, worker_id, "claim lost before release");
                    Ok(Outcome::Lost)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{DeliveryReceipt, InMemoryChannel, Message};
    use crate::outbox::{EventKind, OutboxStatus};
    use crate::store::{InMemoryStore, Store};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FailingChannel {
        calls: AtomicUsize,
    }

    impl Channel for FailingChannel {
        fn publish(
            &self,
            _message: &Message,
            _timeout: Duration,
        ) -> Result<DeliveryReceipt, ChannelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ChannelError::Unavailable("broker down".into()))
        }
    }

    struct SlowChannel;

    impl Channel for SlowChannel {
        fn publish(
            &self,
            message: &Message,
            _timeout: Duration,
        ) -> Result<DeliveryReceipt, ChannelError> {
            std::thread::sleep(Duration::from_millis(30));
            Ok(DeliveryReceipt::accepted(&message.id))
        }
    }

    fn seed(store: &InMemoryStore, count: u64) {
        store
            .transaction(|uow| {
                for _ in 0..count {
                    let id = uow.next_id::<OutboxRecord>()?;
                    uow.persist(&OutboxRecord::pending(id, EventKind::AccountCreated, vec![1]))?;
                }
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn drain_delivers_everything_across_batches() {
        let store = InMemoryStore::new();
        seed(&store, 5);
        let channel = InMemoryChannel::new();
        let dispatcher = NotificationDispatcher::with_config(
            store.clone(),
            channel.clone(),
            DispatcherConfig::new().with_batch_size(2),
        );

        let result = dispatcher.drain_pending().unwrap();
        assert_eq!(result.processed(), 5);
        assert_eq!(result.delivered, 5);
        assert_eq!(channel.len(), 5);
        assert_eq!(
            channel.delivered().iter().map(|m| m.id.as_str()).collect::<Vec<_>>(),
            vec!["outbox:1", "outbox:2", "outbox:3", "outbox:4", "outbox:5"]
        );
        assert_eq!(
            store.outbox_records_by_status(OutboxStatus::Delivered).unwrap().len(),
            5
        );
    }

    #[test]
    fn failure_leaves_records_pending_and_stops_the_drain() {
        let store = InMemoryStore::new();
        seed(&store, 3);
        let dispatcher = NotificationDispatcher::with_config(
            store.clone(),
            FailingChannel {
                calls: AtomicUsize::new(0),
            },
            DispatcherConfig::new().with_batch_size(1),
        );

        let result = dispatcher.drain_pending().unwrap();
        assert_eq!(result.claimed, 1);
        assert_eq!(result.released, 1);
        assert_eq!(dispatcher.channel().calls.load(Ordering::SeqCst), 1);

        let pending = store.outbox_records_pending().unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].attempts, 1);
        assert!(pending[0].last_error.as_deref().unwrap().contains("broker down"));
    }

    #[test]
    fn late_acknowledgement_counts_as_timeout() {
        let store = InMemoryStore::new();
        seed(&store, 1);
        let dispatcher = NotificationDispatcher::with_config(
            store.clone(),
            SlowChannel,
            DispatcherConfig::new().with_publish_timeout(Duration::from_millis(5)),
        );

        let result = dispatcher.drain_pending().unwrap();
        assert_eq!(result.released, 1);
        let record = store.outbox_record(1).unwrap().unwrap();
        assert!(record.is_pending());
        assert!(record.last_error.unwrap().contains("timed out"));
    }

    #[test]
    fn empty_outbox_drains_nothing() {
        let dispatcher = NotificationDispatcher::new(InMemoryStore::new(), InMemoryChannel::new());
        assert_eq!(dispatcher.drain_pending().unwrap(), DrainResult::default());
    }
}
