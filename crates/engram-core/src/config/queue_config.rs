use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Async write queue parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Buffered ops beyond which `write` fails fast.
    pub max_queue_size: usize,
    /// Ops applied per transaction.
    pub batch_size: usize,
    /// Background flush tick.
    #[serde(with = "duration_millis")]
    pub flush_interval: Duration,
    /// Consecutive batch failures before the queue is dropped.
    pub max_consecutive_failures: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            batch_size: 10,
            flush_interval: Duration::from_millis(1000),
            max_consecutive_failures: 10,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
