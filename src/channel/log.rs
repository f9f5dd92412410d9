use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::info;

use super::{Channel, ChannelError, DeliveryReceipt, Message};

/// A channel that logs each notification, optionally keeping the rendered
/// lines in a buffer.
#[derive(Clone, Default)]
pub struct LogChannel {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogChannel {
    pub fn new() -> Self {
        LogChannel { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogChannel {
            buffer: Some(buffer),
        }
    }

    fn render(message: &Message) -> String {
        format!(
            "[OUTBOX] {} -> {} {} {}",
            message.event_type,
            message.destination,
            message.id,
            STANDARD.encode(&message.payload)
        )
    }
}

impl Channel for LogChannel {
    fn publish(
        &self,
        message: &Message,
        _timeout: Duration,
    ) -> Result<DeliveryReceipt, ChannelError> {
        let line = Self::render(message);
        info!(
            message_id = %message.id,
            destination = %message.destination,
            event_type = %message.event_type,
            attempt = message.attempt,
            "notification sent"
        );
        if let Some(buffer) = &self.buffer {
            let mut buffer = buffer
                .lock()
                .map_err(|_| ChannelError::Unavailable("log buffer poisoned".into()))?;
            buffer.push(line);
        }
        Ok(DeliveryReceipt::accepted(&message.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_channel_to_buffer() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let channel = LogChannel::with_buffer(buffer.clone());
        let timeout = Duration::from_secs(1);

        channel
            .publish(
                &Message::new("outbox:1", "UserCreatedQueue", "AccountCreated", b"hi".to_vec()),
                timeout,
            )
            .unwrap();
        channel
            .publish(
                &Message::new("outbox:2", "UserCreatedQueue", "AccountCreated", vec![]),
                timeout,
            )
            .unwrap();

        let lines = buffer.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("AccountCreated"));
        assert!(lines[0].contains("outbox:1"));
        assert!(lines[0].ends_with(&STANDARD.encode(b"hi")));
    }
}
