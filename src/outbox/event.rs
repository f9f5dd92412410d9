use serde::{Deserialize, Serialize};

use super::record::EventKind;

/// Payload types that can be staged in the outbox.
pub trait OutboxEvent: Serialize {
    const KIND: EventKind;

    /// Encode with bitcode (fast binary).
    fn encode(&self) -> Result<Vec<u8>, bitcode::Error> {
        bitcode::serialize(self)
    }
}

/// Emitted when an account user has been created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub user_id: u64,
    pub name: String,
    pub email: String,
}

impl OutboxEvent for AccountCreated {
    const KIND: EventKind = EventKind::AccountCreated;
}
