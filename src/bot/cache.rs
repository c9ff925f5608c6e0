//! Cached configuration snapshot owned by the bot.

use crate::config::Configuration;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// Last configuration the bot fetched, and how fresh it is
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSnapshot {
    /// The configuration itself
    pub configuration: Arc<Configuration>,

    /// When `configuration` was fetched
    pub fetched_at: DateTime<Utc>,

    /// When the last fetch was attempted, successful or not
    pub last_attempt_at: DateTime<Utc>,

    /// Set when the last refresh failed and `configuration` may be stale
    pub degraded: bool,
}

/// What `ConfigCache::store` replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replaced {
    pub previous_version: Option<u64>,
    pub was_degraded: bool,
}

/// Holder of the bot's snapshot; written only by the bot's fetch paths
#[derive(Debug, Default)]
pub struct ConfigCache {
    inner: RwLock<Option<CachedSnapshot>>,
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Option<CachedSnapshot> {
        self.inner.read().clone()
    }

    /// Cached configuration, if any was ever fetched
    pub fn configuration(&self) -> Option<Arc<Configuration>> {
        self.inner.read().as_ref().map(|s| s.configuration.clone())
    }

    /// Replace the snapshot after a successful fetch; clears degraded mode
    pub(crate) fn store(&self, configuration: Arc<Configuration>) -> Replaced {
        let now = Utc::now();
        let mut inner = self.inner.write();

        let replaced = Replaced {
            previous_version: inner.as_ref().map(|s| s.configuration.version),
            was_degraded: inner.as_ref().is_some_and(|s| s.degraded),
        };

        *inner = Some(CachedSnapshot {
            configuration,
            fetched_at: now,
            last_attempt_at: now,
            degraded: false,
        });

        replaced
    }

    /// Record a failed fetch: keep the configuration, flag it as degraded.
    ///
    /// Returns true when this call entered degraded mode. Without a cached
    /// snapshot there is nothing to degrade and nothing changes.
    pub(crate) fn mark_degraded(&self) -> bool {
        let mut inner = self.inner.write();
        match inner.as_mut() {
            Some(snapshot) => {
                let entered = !snapshot.degraded;
                snapshot.degraded = true;
                snapshot.last_attempt_at = Utc::now();
                entered
            }
            None => false,
        }
    }
}
