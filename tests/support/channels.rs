//! Channels with scripted failures for dispatcher tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pokecatalog::{Channel, ChannelError, DeliveryReceipt, InMemoryChannel, Message};

/// Fails the first `failures` publishes, then delegates to an `InMemoryChannel`.
#[derive(Clone)]
pub struct FlakyChannel {
    remaining_failures: Arc<AtomicUsize>,
    pub inner: InMemoryChannel,
}

impl FlakyChannel {
    pub fn new(failures: usize) -> Self {
        Self {
            remaining_failures: Arc::new(AtomicUsize::new(failures)),
            inner: InMemoryChannel::new(),
        }
    }
}

impl Channel for FlakyChannel {
    fn publish(
        &self,
        message: &Message,
        timeout: Duration,
    ) -> Result<DeliveryReceipt, ChannelError> {
        let failing = self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ChannelError::Unavailable("broker restarting".into()));
        }
        self.inner.publish(message, timeout)
    }
}

/// Counts publishes per call and sleeps a little to widen race windows.
#[derive(Clone)]
pub struct SlowChannel {
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
    pub inner: InMemoryChannel,
}

impl SlowChannel {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: Arc::new(AtomicUsize::new(0)),
            inner: InMemoryChannel::new(),
        }
    }
}

impl Channel for SlowChannel {
    fn publish(
        &self,
        message: &Message,
        timeout: Duration,
    ) -> Result<DeliveryReceipt, ChannelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.inner.publish(message, timeout)
    }
}
