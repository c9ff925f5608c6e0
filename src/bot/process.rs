//! The bot's control loop.
//!
//! Two suspension points: the backoff wait while fetching the first
//! configuration, and the interval wait between work units (during which
//! refreshes fire). Both are raced against the shutdown token; a work unit
//! in progress is never raced.

use crate::bot::budget::WorkBudget;
use crate::bot::cache::{CachedSnapshot, ConfigCache};
use crate::bot::state::BotState;
use crate::bot::work::WorkUnit;
use crate::client::{ConfigSource, RetryPolicy};
use crate::config::{
    BotSettings, Configuration, MAX_UNITS_PER_HOUR_KEY, REFRESH_INTERVAL_KEY, WORK_INTERVAL_KEY,
};
use crate::error::{Result, TetherError};
use backoff::backoff::Backoff;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, sleep_until, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Refresh interval when neither the configuration nor the environment sets one
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(300);

/// Work interval when neither the configuration nor the environment sets one
pub const DEFAULT_WORK_INTERVAL: Duration = Duration::from_secs(60);

/// Per-fetch timeout default
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest refresh or work interval the bot will schedule, whatever the
/// provider or environment asks for
pub const MAX_INTERVAL: Duration = Duration::from_secs(86_400);

/// Runtime knobs for a bot
#[derive(Debug, Clone)]
pub struct BotOptions {
    /// Upper bound on a single fetch
    pub fetch_timeout: Duration,

    /// Startup backoff
    pub retry: RetryPolicy,

    /// Give up on startup after this long (None = retry forever)
    pub max_startup: Option<Duration>,

    /// Refresh interval fallback
    pub refresh_interval: Duration,

    /// Work interval fallback
    pub work_interval: Duration,
}

impl Default for BotOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry: RetryPolicy::default(),
            max_startup: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            work_interval: DEFAULT_WORK_INTERVAL,
        }
    }
}

impl From<&BotSettings> for BotOptions {
    fn from(settings: &BotSettings) -> Self {
        Self {
            fetch_timeout: settings.fetch_timeout,
            retry: RetryPolicy::new(settings.backoff_base, settings.backoff_cap),
            max_startup: settings.max_startup,
            refresh_interval: settings.refresh_interval.unwrap_or(DEFAULT_REFRESH_INTERVAL),
            work_interval: settings.work_interval.unwrap_or(DEFAULT_WORK_INTERVAL),
        }
    }
}

/// Result of one refresh attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A different version is now cached
    Updated { from: u64, to: u64 },
    /// Provider still serves the cached version
    Unchanged { version: u64 },
    /// Fetch failed; stale configuration kept
    Degraded,
    /// Another refresh was running, or the bot is not running
    Skipped,
}

/// Point-in-time view of the bot for observability
#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub state: BotState,
    pub version: Option<u64>,
    pub degraded: bool,
    pub fetched_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub units_this_window: u32,
}

/// The long-running consumer of the configuration
pub struct Bot {
    source: Arc<dyn ConfigSource>,
    work: Arc<dyn WorkUnit>,
    options: BotOptions,
    cache: ConfigCache,
    budget: WorkBudget,
    state: watch::Sender<BotState>,
    refreshing: AtomicBool,
}

/// Holds the refresh-in-progress flag; clears it on drop
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Bot {
    pub fn new(source: Arc<dyn ConfigSource>, work: Arc<dyn WorkUnit>, options: BotOptions) -> Self {
        let (state, _) = watch::channel(BotState::Starting);
        Self {
            source,
            work,
            options,
            cache: ConfigCache::new(),
            budget: WorkBudget::hourly(),
            state,
            refreshing: AtomicBool::new(false),
        }
    }

    /// Replace the work budget (e.g. a shorter window)
    pub fn with_budget(mut self, budget: WorkBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn state(&self) -> BotState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<BotState> {
        self.state.subscribe()
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn status(&self) -> BotStatus {
        let snapshot = self.cache.snapshot();
        BotStatus {
            state: self.state(),
            version: snapshot.as_ref().map(|s| s.configuration.version),
            degraded: snapshot.as_ref().is_some_and(|s| s.degraded),
            fetched_at: snapshot.as_ref().map(|s| s.fetched_at),
            last_attempt_at: snapshot.as_ref().map(|s| s.last_attempt_at),
            units_this_window: self.budget.used(),
        }
    }

    /// Refresh interval in effect: configuration, then options, capped at
    /// [`MAX_INTERVAL`]
    pub fn refresh_interval(&self) -> Duration {
        self.interval(REFRESH_INTERVAL_KEY, self.options.refresh_interval)
    }

    /// Work interval in effect: configuration, then options, capped at
    /// [`MAX_INTERVAL`]
    pub fn work_interval(&self) -> Duration {
        self.interval(WORK_INTERVAL_KEY, self.options.work_interval)
    }

    fn interval(&self, key: &str, fallback: Duration) -> Duration {
        self.cache
            .configuration()
            .and_then(|c| c.interval_secs(key))
            .unwrap_or(fallback)
            .min(MAX_INTERVAL)
    }

    fn enter(&self, next: BotState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Bot state transition");
        }
    }

    /// Move `from → to` only if the bot is currently in `from`
    fn transition(&self, from: BotState, to: BotState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == from {
                *state = to;
                true
            } else {
                false
            }
        })
    }

    /// Run until `shutdown` is cancelled or a fatal error occurs.
    ///
    /// Returns `Ok` on a requested shutdown, including one that arrives
    /// before the first configuration.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        info!(source = %self.source.describe(), "Starting bot");

        let initial = match self.fetch_initial(&shutdown).await {
            Ok(initial) => initial,
            Err(e) => {
                error!(error = %e, "Giving up on startup");
                self.enter(BotState::ShuttingDown);
                return Err(e);
            }
        };

        let Some(configuration) = initial else {
            info!("Shutdown requested before a configuration arrived");
            self.enter(BotState::ShuttingDown);
            return Ok(());
        };

        info!(version = configuration.version, "Configuration loaded");
        self.cache.store(configuration);
        self.enter(BotState::Running);

        let result = self.run_loop(&shutdown).await;
        self.enter(BotState::ShuttingDown);

        match &result {
            Ok(()) => info!("Bot stopped"),
            Err(e) => error!(kind = e.kind(), error = %e, "Bot stopped on fatal error"),
        }
        result
    }

    /// Fetch the first configuration, backing off between failures
    async fn fetch_initial(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<Option<Arc<Configuration>>> {
        self.enter(BotState::FetchingConfig);

        let started = Instant::now();
        let mut backoff = self.options.retry.backoff();
        let mut attempts = 0u32;

        loop {
            if shutdown.is_cancelled() {
                return Ok(None);
            }

            attempts += 1;
            let error = match self.fetch_once().await {
                Ok(configuration) => {
                    if attempts > 1 {
                        info!(
                            attempts,
                            waited_ms = started.elapsed().as_millis() as u64,
                            "Config provider reachable"
                        );
                    }
                    return Ok(Some(Arc::new(configuration)));
                }
                Err(e) => e,
            };

            let delay = backoff.next_backoff().unwrap_or(self.options.retry.cap);

            if let Some(window) = self.options.max_startup {
                if started.elapsed().saturating_add(delay) > window {
                    return Err(TetherError::FatalStartup {
                        attempts,
                        waited: started.elapsed(),
                    });
                }
            }

            warn!(
                attempt = attempts,
                kind = error.kind(),
                error = %error,
                retry_in_ms = delay.as_millis() as u64,
                "Failed to fetch configuration, retrying"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(None),
                _ = sleep(delay) => {}
            }
        }
    }

    /// One fetch bounded by the fetch timeout; a timeout counts as unavailable
    async fn fetch_once(&self) -> Result<Configuration> {
        match timeout(self.options.fetch_timeout, self.source.fetch()).await {
            Ok(result) => result,
            Err(_) => Err(TetherError::Unavailable(format!(
                "fetch timed out after {}ms",
                self.options.fetch_timeout.as_millis()
            ))),
        }
    }

    async fn run_loop(&self, shutdown: &CancellationToken) -> Result<()> {
        let mut next_refresh = Instant::now() + self.refresh_interval();

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            self.run_work_unit().await?;

            let next_work = Instant::now() + self.work_interval();
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = sleep_until(next_work.min(next_refresh)) => {}
                }

                if Instant::now() >= next_refresh {
                    self.refresh().await;
                    next_refresh = Instant::now() + self.refresh_interval();
                }

                if Instant::now() >= next_work {
                    break;
                }
            }
        }
    }

    async fn run_work_unit(&self) -> Result<()> {
        let Some(snapshot) = self.cache.snapshot() else {
            return Ok(());
        };

        let limit = Self::budget_limit(&snapshot);
        if !self.budget.try_acquire(limit) {
            warn!(
                limit = limit.unwrap_or_default(),
                resets_in_secs = self.budget.resets_in().as_secs(),
                "Work budget exhausted, skipping unit"
            );
            return Ok(());
        }

        match self.work.run(&snapshot).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Work unit failed");
                Ok(())
            }
        }
    }

    fn budget_limit(snapshot: &CachedSnapshot) -> Option<u32> {
        snapshot
            .configuration
            .get_u64(MAX_UNITS_PER_HOUR_KEY)
            .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
    }

    /// Re-fetch the configuration.
    ///
    /// Success replaces the cache and leaves degraded mode; failure keeps
    /// the cached configuration untouched and enters degraded mode. Never
    /// overlaps another refresh and never fails.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("Refresh already in progress");
            return RefreshOutcome::Skipped;
        };

        if !self.transition(BotState::Running, BotState::Refreshing) {
            return RefreshOutcome::Skipped;
        }

        let outcome = match self.fetch_once().await {
            Ok(configuration) => {
                let to = configuration.version;
                let replaced = self.cache.store(Arc::new(configuration));
                let from = replaced.previous_version.unwrap_or_default();

                if replaced.was_degraded {
                    info!(version = to, "Config provider reachable again, leaving degraded mode");
                }

                if to == from {
                    RefreshOutcome::Unchanged { version: to }
                } else {
                    if to < from {
                        warn!(from, to, "Config provider version went backwards");
                    } else {
                        info!(from, to, "Configuration updated");
                    }
                    RefreshOutcome::Updated { from, to }
                }
            }
            Err(e) => {
                if self.cache.mark_degraded() {
                    warn!(
                        kind = e.kind(),
                        error = %e,
                        "Refresh failed, entering degraded mode with cached configuration"
                    );
                } else {
                    warn!(kind = e.kind(), error = %e, "Refresh failed, still degraded");
                }
                RefreshOutcome::Degraded
            }
        };

        self.transition(BotState::Refreshing, BotState::Running);
        outcome
    }
}
