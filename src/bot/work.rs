//! Work units: one iteration of the bot's operational loop.

use crate::bot::cache::CachedSnapshot;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// A unit of work driven by the cached configuration.
///
/// Units are never interrupted once started; shutdown waits for the
/// in-flight unit. Errors are logged and the loop carries on unless
/// [`TetherError::is_fatal`](crate::error::TetherError::is_fatal) holds.
#[async_trait]
pub trait WorkUnit: Send + Sync {
    async fn run(&self, snapshot: &CachedSnapshot) -> Result<()>;
}

/// Default work unit: reports the configuration it is running on
#[derive(Debug, Default)]
pub struct Heartbeat {
    beats: AtomicU64,
}

impl Heartbeat {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkUnit for Heartbeat {
    async fn run(&self, snapshot: &CachedSnapshot) -> Result<()> {
        let beat = self.beats.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            beat,
            version = snapshot.configuration.version,
            keys = snapshot.configuration.payload.len(),
            degraded = snapshot.degraded,
            "Heartbeat"
        );
        Ok(())
    }
}
