//! Outbox - transactional staging and retried delivery of notifications.
//!
//! The pattern has two distinct phases:
//! 1. **Record phase** (`OutboxRecorder`) - stage an `OutboxRecord` in the same
//!    unit of work as the triggering write; both commit or neither does.
//! 2. **Dispatch phase** (`NotificationDispatcher`, `DispatcherThread`) - claim
//!    committed records, publish them to a `Channel`, mark them delivered on
//!    acknowledgement, leave them pending on failure.
//!
//! ```text
//! Pending ──claim──▶ InFlight ──ack──▶ Delivered
//!    ▲                  │
//!    └──fail/timeout────┘  (attempts += 1 per claim)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! let recorder = OutboxRecorder::new();
//! store.transaction(|uow| {
//!     uow.persist(&user)?;
//!     recorder.record(uow, &AccountCreated { user_id: user.id, .. })
//! })?;
//!
//! let dispatcher = NotificationDispatcher::new(store.clone(), channel);
//! let result = dispatcher.drain_pending()?;
//! ```

mod dispatcher;
mod event;
mod record;
mod recorder;
mod repository_ext;
mod thread;

pub use dispatcher::{DrainResult, NotificationDispatcher};
pub use event::{AccountCreated, OutboxEvent};
pub use record::{EventKind, OutboxRecord, OutboxStatus};
pub use recorder::OutboxRecorder;
pub use repository_ext::OutboxStore;
pub use thread::{DispatchTrigger, DispatcherStats, DispatcherThread, Signal};
