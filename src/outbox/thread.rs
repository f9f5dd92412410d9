//! Background dispatcher thread.
//!
//! Drains the outbox on a fixed sweep interval and immediately whenever a
//! committed unit of work wakes it through a `DispatchTrigger`.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::channel::Channel;

use super::dispatcher::NotificationDispatcher;
use super::repository_ext::OutboxStore;

/// Control signal for a dispatcher thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Wake,
    Stop,
}

/// Cloneable handle that asks the dispatcher to drain now.
#[derive(Clone, Debug)]
pub struct DispatchTrigger {
    tx: Sender<Signal>,
}

impl DispatchTrigger {
    /// A trigger not bound to a `DispatcherThread`, plus the receiving end,
    /// for callers that schedule drains themselves.
    pub fn detached() -> (Self, Receiver<Signal>) {
        let (tx, rx) = channel();
        (Self { tx }, rx)
    }

    /// Never blocks; a stopped dispatcher simply ignores the signal.
    pub fn wake(&self) {
        let _ = self.tx.send(Signal::Wake);
    }
}

/// Statistics from the dispatcher thread.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatcherStats {
    pub drains: usize,
    pub delivered: usize,
    pub released: usize,
    pub lost: usize,
    /// Drains that failed on the store.
    pub errors: usize,
}

/// A background thread running `NotificationDispatcher::drain_pending`.
///
/// ## Example
///
/// ```ignore
/// let dispatcher = NotificationDispatcher::new(store.clone(), channel.clone());
/// let thread = DispatcherThread::spawn(dispatcher);
/// let accounts = AccountService::with_recorder(OutboxRecorder::with_trigger(thread.trigger()));
///
/// // ... create users ...
///
/// let stats = thread.stop();
/// ```
pub struct DispatcherThread {
    control: Sender<Signal>,
    handle: Option<JoinHandle<DispatcherStats>>,
}

impl DispatcherThread {
    pub fn spawn<S, C>(dispatcher: NotificationDispatcher<S, C>) -> Self
    where
        S: OutboxStore + 'static,
        C: Channel + 'static,
    {
        let (control, signals) = channel();
        let poll_interval = dispatcher.config().poll_interval;

        let handle = thread::spawn(move || {
            let mut stats = DispatcherStats::default();

            loop {
                match signals.recv_timeout(poll_interval) {
                    Ok(Signal::Wake) | Err(RecvTimeoutError::Timeout) => {}
                    Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                }

                // Coalesce wakes that piled up while the previous drain ran.
                let mut stop = false;
                loop {
                    match signals.try_recv() {
                        Ok(Signal::Wake) => {}
                        Ok(Signal::Stop) | Err(TryRecvError::Disconnected) => {
                            stop = true;
                            break;
                        }
                        Err(TryRecvError::Empty) => break,
                    }
                }

                stats.drains += 1;
                match dispatcher.drain_pending() {
                    Ok(result) => {
                        stats.delivered += result.delivered;
                        stats.released += result.released;
                        stats.lost += result.lost;
                        if result.claimed > 0 {
                            debug!(?result, "outbox drained");
                        }
                    }
                    Err(err) => {
                        stats.errors += 1;
                        error!(error = %err, "outbox drain failed");
                    }
                }

                if stop {
                    break;
                }
            }

            stats
        });

        Self {
            control,
            handle: Some(handle),
        }
    }

    /// A trigger that wakes this thread.
    pub fn trigger(&self) -> DispatchTrigger {
        DispatchTrigger {
            tx: self.control.clone(),
        }
    }

    /// Signal the thread to stop, wait for it, and return its statistics.
    pub fn stop(mut self) -> DispatcherStats {
        let _ = self.control.send(Signal::Stop);
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => DispatcherStats::default(),
        }
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        let _ = self.control.send(Signal::Stop);
        // Not joined: the thread finishes its current drain on its own.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::InMemoryChannel;
    use crate::config::DispatcherConfig;
    use crate::outbox::{AccountCreated, OutboxRecorder};
    use crate::store::{InMemoryStore, Store};
    use std::time::{Duration, Instant};

    #[test]
    fn wake_after_commit_delivers_without_waiting_for_the_sweep() {
        let store = InMemoryStore::new();
        let channel = InMemoryChannel::new();
        let dispatcher = NotificationDispatcher::with_config(
            store.clone(),
            channel.clone(),
            DispatcherConfig::new().with_poll_interval(Duration::from_secs(30)),
        );
        let thread = DispatcherThread::spawn(dispatcher);
        let recorder = OutboxRecorder::with_trigger(thread.trigger());

        store
            .transaction(|uow| {
                recorder.record(
                    uow,
                    &AccountCreated {
                        user_id: 1,
                        name: "Red".into(),
                        email: "red@x.com".into(),
                    },
                )
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.is_empty() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let stats = thread.stop();
        assert_eq!(channel.len(), 1);
        assert_eq!(stats.delivered, 1);
    }

    #[test]
    fn stop_returns_stats() {
        let dispatcher = NotificationDispatcher::with_config(
            InMemoryStore::new(),
            InMemoryChannel::new(),
            DispatcherConfig::new().with_poll_interval(Duration::from_millis(5)),
        );
        let thread = DispatcherThread::spawn(dispatcher);
        std::thread::sleep(Duration::from_millis(30));
        let stats = thread.stop();
        assert!(stats.drains >= 1);
        assert_eq!(stats.errors, 0);
    }
}
