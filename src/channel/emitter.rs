use std::sync::Mutex;
use std::time::Duration;

use event_emitter_rs::EventEmitter;

use super::{Channel, ChannelError, DeliveryReceipt, Message};

/// A channel that hands notifications to in-process listeners through an
/// `EventEmitter`, one emitter event per destination.
///
/// Listeners run on the emitter's own threads; `publish` is acknowledged once
/// the message has been handed to the emitter.
pub struct EmitterChannel {
    emitter: Mutex<EventEmitter>,
}

impl Default for EmitterChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitterChannel {
    pub fn new() -> Self {
        Self::with_emitter(EventEmitter::new())
    }

    pub fn with_emitter(emitter: EventEmitter) -> Self {
        EmitterChannel {
            emitter: Mutex::new(emitter),
        }
    }

    /// Register a listener for every message sent to `destination`.
    pub fn on<F>(&self, destination: &str, listener: F) -> Result<(), ChannelError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| ChannelError::Unavailable("emitter poisoned".into()))?;
        emitter.on(destination, move |json: String| {
            if let Ok(message) = serde_json::from_str::<Message>(&json) {
                listener(message);
            }
        });
        Ok(())
    }
}

impl Channel for EmitterChannel {
    fn publish(
        &self,
        message: &Message,
        _timeout: Duration,
    ) -> Result<DeliveryReceipt, ChannelError> {
        let json = serde_json::to_string(message)
            .map_err(|err| ChannelError::Rejected(err.to_string()))?;
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| ChannelError::Unavailable("emitter poisoned".into()))?;
        emitter.emit(&message.destination, json);
        Ok(DeliveryReceipt::accepted(&message.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn listeners_receive_published_messages() {
        let channel = EmitterChannel::new();
        let (tx, rx) = mpsc::channel();
        channel
            .on("UserCreatedQueue", move |message| {
                let _ = tx.send(message);
            })
            .unwrap();

        let sent = Message::new("outbox:7", "UserCreatedQueue", "AccountCreated", b"x".to_vec());
        channel.publish(&sent, Duration::from_secs(1)).unwrap();

        let received = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received, sent);
    }
}
