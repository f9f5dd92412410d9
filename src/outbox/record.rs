use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::channel::Message;
use crate::store::{IndexKey, Record};

/// Delivery status of an outbox record.
///
/// `InFlight` is the claim marker: a dispatcher owns the record until it
/// completes or releases it, or until the lease runs out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutboxStatus {
    #[default]
    Pending,
    InFlight,
    Delivered,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::InFlight => "in_flight",
            OutboxStatus::Delivered => "delivered",
        }
    }
}

/// Kinds of events that go through the outbox.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    AccountCreated,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AccountCreated => "AccountCreated",
        }
    }

    /// Queue the event is delivered to.
    pub fn destination(&self) -> &'static str {
        match self {
            EventKind::AccountCreated => "UserCreatedQueue",
        }
    }
}

/// Durable "this event must be delivered" record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: u64,
    pub event_kind: EventKind,
    pub payload: Vec<u8>,
    pub status: OutboxStatus,
    pub created_at: SystemTime,
    /// Publish attempts so far; bumped on every claim.
    pub attempts: u32,
    pub claimed_by: Option<String>,
    pub claimed_until: Option<SystemTime>,
    pub delivered_at: Option<SystemTime>,
    pub last_error: Option<String>,
}

impl Record for OutboxRecord {
    const COLLECTION: &'static str = "outbox_records";

    fn id(&self) -> u64 {
        self.id
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![Self::status_key(self.status)]
    }
}

impl OutboxRecord {
    pub const KEY_PREFIX: &'static str = "outbox:";
    pub const STATUS_INDEX: &'static str = "status";

    /// Secondary index entry of every record in `status`.
    pub fn status_key(status: OutboxStatus) -> IndexKey {
        IndexKey::new(Self::STATUS_INDEX, status.as_str())
    }

    pub fn pending(id: u64, event_kind: EventKind, payload: Vec<u8>) -> Self {
        Self {
            id,
            event_kind,
            payload,
            status: OutboxStatus::Pending,
            created_at: SystemTime::now(),
            attempts: 0,
            claimed_by: None,
            claimed_until: None,
            delivered_at: None,
            last_error: None,
        }
    }

    /// Idempotency key derived from the record identity. Every attempt of
    /// this record carries the same key.
    pub fn idempotency_key(&self) -> String {
        format!("{}{}", Self::KEY_PREFIX, self.id)
    }

    pub fn is_pending(&self) -> bool {
        self.status == OutboxStatus::Pending
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == OutboxStatus::InFlight
    }

    pub fn is_delivered(&self) -> bool {
        self.status == OutboxStatus::Delivered
    }

    /// Pending, or in flight under a lease that has run out.
    pub fn is_claimable(&self, now: SystemTime) -> bool {
        match self.status {
            OutboxStatus::Pending => true,
            OutboxStatus::InFlight => self.claimed_until.map(|until| until <= now).unwrap_or(true),
            OutboxStatus::Delivered => false,
        }
    }

    fn is_claimed_by(&self, worker_id: &str) -> bool {
        self.is_in_flight() && self.claimed_by.as_deref() == Some(worker_id)
    }

    /// Take the record for one publish attempt. Returns false if it is not
    /// claimable.
    pub fn claim(&mut self, worker_id: &str, lease: Duration, now: SystemTime) -> bool {
        if !self.is_claimable(now) {
            return false;
        }
        self.status = OutboxStatus::InFlight;
        self.attempts = self.attempts.saturating_add(1);
        self.claimed_by = Some(worker_id.to_string());
        self.claimed_until = Some(now.checked_add(lease).unwrap_or(now));
        true
    }

    /// Mark delivered. Only the current claimant may do so.
    pub fn complete(&mut self, worker_id: &str, now: SystemTime) -> bool {
        if !self.is_claimed_by(worker_id) {
            return false;
        }
        self.status = OutboxStatus::Delivered;
        self.delivered_at = Some(now);
        self.claimed_by = None;
        self.claimed_until = None;
        self.last_error = None;
        true
    }

    /// Hand the record back for a later retry. Only the current claimant may
    /// do so.
    pub fn release(&mut self, worker_id: &str, error: &str) -> bool {
        if !self.is_claimed_by(worker_id) {
            return false;
        }
        self.status = OutboxStatus::Pending;
        self.claimed_by = None;
        self.claimed_until = None;
        self.last_error = if error.is_empty() {
            None
        } else {
            Some(error.to_string())
        };
        true
    }

    /// The channel message for the current attempt.
    pub fn to_message(&self) -> Message {
        Message::new(
            self.idempotency_key(),
            self.event_kind.destination(),
            self.event_kind.as_str(),
            self.payload.clone(),
        )
        .with_attempt(self.attempts.max(1))
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.payload)
    }
}
