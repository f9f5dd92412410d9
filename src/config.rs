//! Dispatcher configuration.
//!
//! Built in code with the `with_*` methods, or deserialized (durations in
//! milliseconds, every field optional):
//!
//! ```
//! use std::time::Duration;
//! use pokecatalog::DispatcherConfig;
//!
//! let json = r#"{"worker_id":"d-1","publish_timeout_ms":250}"#;
//! let config = DispatcherConfig::from_json(json).unwrap();
//! assert_eq!(config.worker_id, "d-1");
//! assert_eq!(config.publish_timeout, Duration::from_millis(250));
//! assert_eq!(config.batch_size, 100);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Claimant name written on in-flight records.
    pub worker_id: String,
    /// Max records claimed per batch.
    pub batch_size: usize,
    /// How long a claim stays exclusive before another dispatcher may take it.
    #[serde(rename = "lease_ms", with = "duration_ms")]
    pub lease: Duration,
    /// Upper bound on a single publish attempt.
    #[serde(rename = "publish_timeout_ms", with = "duration_ms")]
    pub publish_timeout: Duration,
    /// Sweep period of the background dispatcher thread.
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_id: format!("dispatcher-{}", std::process::id()),
            batch_size: 100,
            lease: Duration::from_secs(60),
            publish_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl DispatcherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<Self>(json).map(Self::clamped)
    }

    /// Stretch the lease so it always outlasts a publish attempt; a claim
    /// must not expire while its record is still being published. A lease
    /// not longer than `publish_timeout` becomes twice the timeout.
    pub fn clamped(mut self) -> Self {
        if self.lease <= self.publish_timeout {
            self.lease = self
                .publish_timeout
                .saturating_mul(2)
                .max(Duration::from_millis(1));
        }
        self
    }

    pub fn with_worker_id(mut self, id: impl Into<String>) -> Self {
        self.worker_id = id.into();
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self.clamped()
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self.clamped()
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
