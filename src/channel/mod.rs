//! Channel - the at-least-once message transport notifications are delivered to.
//!
//! The dispatcher only needs fire-and-acknowledge semantics: `publish` either
//! returns a receipt (the transport accepted the message) or an error, which
//! the dispatcher treats as transient and retries later.
//!
//! ```text
//! NotificationDispatcher ──publish(message, timeout)──▶ Channel
//!                                                        │
//!          ┌──────────────────┬──────────────────────────┤
//!          ▼                  ▼                          ▼
//!   InMemoryChannel      LogChannel            EmitterChannel (emitter)
//! ```

mod in_memory;
mod log;
#[cfg(feature = "emitter")]
mod emitter;

use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use in_memory::InMemoryChannel;
pub use log::LogChannel;
#[cfg(feature = "emitter")]
pub use emitter::EmitterChannel;

/// A notification handed to the channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Idempotency key; the same outbox record always produces the same id.
    pub id: String,
    /// Queue or topic name.
    pub destination: String,
    /// Event kind (e.g. "AccountCreated").
    pub event_type: String,
    /// Opaque serialized payload.
    pub payload: Vec<u8>,
    /// Delivery attempt this message belongs to, starting at 1.
    pub attempt: u32,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        destination: impl Into<String>,
        event_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
            event_type: event_type.into(),
            payload,
            attempt: 1,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.payload)
    }
}

/// Acknowledgement returned by a successful publish.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub accepted_at: SystemTime,
    /// The transport had already seen this idempotency key.
    pub duplicate: bool,
}

impl DeliveryReceipt {
    pub fn accepted(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            accepted_at: SystemTime::now(),
            duplicate: false,
        }
    }

    pub fn duplicate(message_id: impl Into<String>) -> Self {
        Self {
            duplicate: true,
            ..Self::accepted(message_id)
        }
    }
}

/// Publish failures. All of them leave the outbox record pending.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("channel unavailable: {0}")]
    Unavailable(String),

    #[error("message rejected: {0}")]
    Rejected(String),
}

/// Trait for transports that can deliver notifications.
///
/// `timeout` bounds how long an implementation may wait for the
/// acknowledgement; the dispatcher also enforces it on the returned result.
pub trait Channel: Send + Sync {
    fn publish(
        &self,
        message: &Message,
        timeout: Duration,
    ) -> Result<DeliveryReceipt, ChannelError>;
}

impl<C: Channel + ?Sized> Channel for std::sync::Arc<C> {
    fn publish(
        &self,
        message: &Message,
        timeout: Duration,
    ) -> Result<DeliveryReceipt, ChannelError> {
        (**self).publish(message, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_construction() {
        let message =
            Message::new("outbox:1", "UserCreatedQueue", "AccountCreated", b"{}".to_vec());
        assert_eq!(message.id, "outbox:1");
        assert_eq!(message.destination, "UserCreatedQueue");
        assert_eq!(message.attempt, 1);
        assert_eq!(message.with_attempt(3).attempt, 3);
    }

    #[test]
    fn duplicate_receipt_is_flagged() {
        assert!(!DeliveryReceipt::accepted("outbox:1").duplicate);
        assert!(DeliveryReceipt::duplicate("outbox:1").duplicate);
    }
}
