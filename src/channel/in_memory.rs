//! In-memory channel for tests and single-process deployments.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{Channel, ChannelError, DeliveryReceipt, Message};

#[derive(Default)]
struct Log {
    /// Every publish call, duplicates included.
    attempts: Vec<Message>,
    /// What a consumer observes: one entry per idempotency key.
    delivered: Vec<Message>,
    seen: HashSet<String>,
}

/// Thread-safe in-memory channel.
///
/// Clones share the same log. Duplicate publishes of the same idempotency key
/// are acknowledged but not delivered twice, the way an idempotent consumer
/// would treat them.
///
/// ```
/// use std::time::Duration;
/// use pokecatalog::{Channel, InMemoryChannel, Message};
///
/// let channel = InMemoryChannel::new();
/// let message = Message::new("outbox:1", "UserCreatedQueue", "AccountCreated", vec![]);
/// channel.publish(&message, Duration::from_secs(1)).unwrap();
/// channel.publish(&message, Duration::from_secs(1)).unwrap();
///
/// assert_eq!(channel.attempts().len(), 2);
/// assert_eq!(channel.delivered().len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryChannel {
    log: Arc<Mutex<Log>>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        // A poisoned log still holds consistent data; keep serving it.
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every message passed to `publish`, in call order.
    pub fn attempts(&self) -> Vec<Message> {
        self.log().attempts.clone()
    }

    /// Deduplicated deliveries, in first-delivery order.
    pub fn delivered(&self) -> Vec<Message> {
        self.log().delivered.clone()
    }

    /// Deliveries of one event type.
    pub fn delivered_of(&self, event_type: &str) -> Vec<Message> {
        self.log()
            .delivered
            .iter()
            .filter(|message| message.event_type == event_type)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log().delivered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log().delivered.is_empty()
    }

    pub fn clear(&self) {
        let mut log = self.log();
        log.attempts.clear();
        log.delivered.clear();
        log.seen.clear();
    }
}

impl Channel for InMemoryChannel {
    fn publish(
        &self,
        message: &Message,
        _timeout: Duration,
    ) -> Result<DeliveryReceipt, ChannelError> {
        let mut log = self.log();
        log.attempts.push(message.clone());
        if !log.seen.insert(message.id.clone()) {
            return Ok(DeliveryReceipt::duplicate(&message.id));
        }
        log.delivered.push(message.clone());
        Ok(DeliveryReceipt::accepted(&message.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, event_type: &str) -> Message {
        Message::new(id, "queue", event_type, b"{}".to_vec())
    }

    #[test]
    fn publish_records_delivery() {
        let channel = InMemoryChannel::new();
        let receipt = channel
            .publish(&message("outbox:1", "AccountCreated"), Duration::from_secs(1))
            .unwrap();

        assert_eq!(receipt.message_id, "outbox:1");
        assert!(!receipt.duplicate);
        assert_eq!(channel.len(), 1);
    }

    #[test]
    fn duplicate_keys_are_delivered_once() {
        let channel = InMemoryChannel::new();
        let timeout = Duration::from_secs(1);
        channel.publish(&message("outbox:1", "AccountCreated"), timeout).unwrap();
        let receipt = channel
            .publish(&message("outbox:1", "AccountCreated"), timeout)
            .unwrap();

        assert!(receipt.duplicate);
        assert_eq!(channel.attempts().len(), 2);
        assert_eq!(channel.delivered().len(), 1);
    }

    #[test]
    fn clones_share_the_log_and_filter_by_type() {
        let channel = InMemoryChannel::new();
        let handle = channel.clone();
        let timeout = Duration::from_secs(1);
        channel.publish(&message("outbox:1", "AccountCreated"), timeout).unwrap();
        channel.publish(&message("outbox:2", "Other"), timeout).unwrap();

        assert_eq!(handle.delivered_of("AccountCreated").len(), 1);
        handle.clear();
        assert!(channel.is_empty());
    }
}
