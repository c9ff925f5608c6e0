//! Configuration Record
//!
//! The versioned settings record served by the config provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Key/value payload of a configuration
pub type Payload = serde_json::Map<String, Value>;

/// Key read by the bot for its refresh interval
pub const REFRESH_INTERVAL_KEY: &str = "refresh_interval_secs";

/// Key read by the bot for its work interval
pub const WORK_INTERVAL_KEY: &str = "work_interval_secs";

/// Key read by the bot for its hourly work budget
pub const MAX_UNITS_PER_HOUR_KEY: &str = "max_units_per_hour";

/// A published configuration.
///
/// Once a version has been assigned the record is never mutated; newer
/// versions supersede it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Monotonically increasing version, 0 for the empty default
    pub version: u64,

    /// Settings
    #[serde(default)]
    pub payload: Payload,

    /// When this version was published (absent for the default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Configuration {
    /// The configuration served before anything has been published
    pub fn empty() -> Self {
        Self {
            version: 0,
            payload: Payload::new(),
            published_at: None,
        }
    }

    /// Build the successor of `self` carrying `payload`
    pub fn next(&self, payload: Payload) -> Self {
        Self {
            version: self.version + 1,
            payload,
            published_at: Some(Utc::now()),
        }
    }

    /// Whether this is the unpublished default
    pub fn is_default(&self) -> bool {
        self.version == 0
    }

    /// Raw value for a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Non-negative integer value for a key
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    /// Interval in whole seconds for a key; zero is treated as absent
    pub fn interval_secs(&self, key: &str) -> Option<Duration> {
        self.get_u64(key)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::empty()
    }
}
