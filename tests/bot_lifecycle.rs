//! Bot lifecycle under paused time: startup backoff, degraded mode, work
//! budget and shutdown behaviour.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tether::bot::{
    Bot, BotOptions, BotState, CachedSnapshot, RefreshOutcome, WorkUnit, MAX_INTERVAL,
};
use tether::client::ConfigSource;
use tether::config::Configuration;
use tether::error::{Result, TetherError};
use tether::provider::ConfigStore;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Provider that fails a set number of times, or while `down` is set
#[derive(Default)]
struct FlakyProvider {
    store: ConfigStore,
    failures_left: AtomicU32,
    down: AtomicBool,
    hang_once: AtomicBool,
    attempts: AtomicU32,
}

impl FlakyProvider {
    fn failing(times: u32) -> Arc<Self> {
        let provider = Self::default();
        provider.failures_left.store(times, Ordering::SeqCst);
        Arc::new(provider)
    }

    fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for FlakyProvider {
    async fn fetch(&self) -> Result<Configuration> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.hang_once.swap(false, Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing || self.down.load(Ordering::SeqCst) {
            return Err(TetherError::Unavailable("connection refused".into()));
        }

        Ok(self.store.get_config().as_ref().clone())
    }

    fn describe(&self) -> String {
        "flaky".into()
    }
}

/// Counts units; optionally slow, optionally failing fatally
#[derive(Default)]
struct Recorder {
    started: AtomicU32,
    finished: AtomicU32,
    duration: Option<Duration>,
    fatal: bool,
}

#[async_trait]
impl WorkUnit for Recorder {
    async fn run(&self, _snapshot: &CachedSnapshot) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(duration) = self.duration {
            sleep(duration).await;
        }
        if self.fatal {
            return Err(TetherError::Fatal("output channel closed".into()));
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Harness {
    bot: Arc<Bot>,
    shutdown: CancellationToken,
    run: JoinHandle<Result<()>>,
}

fn launch(provider: Arc<FlakyProvider>, work: Arc<Recorder>, options: BotOptions) -> Harness {
    let bot = Arc::new(Bot::new(provider, work, options));
    let shutdown = CancellationToken::new();
    let run = tokio::spawn({
        let bot = bot.clone();
        let shutdown = shutdown.clone();
        async move { bot.run(shutdown).await }
    });
    Harness { bot, shutdown, run }
}

async fn wait_running(bot: &Bot) {
    bot.subscribe()
        .wait_for(|s| *s == BotState::Running)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn recovers_after_three_failed_fetches() {
    let provider = FlakyProvider::failing(3);
    provider.store.set_config(json!({"rate_limit": 10})).unwrap();
    let started = Instant::now();

    let harness = launch(provider.clone(), Arc::default(), BotOptions::default());
    wait_running(&harness.bot).await;

    // waits of 1s, 2s and 4s between the four attempts
    assert_eq!(started.elapsed().as_secs(), 7);
    assert_eq!(provider.attempts(), 4);
    assert_eq!(harness.bot.cache().configuration().unwrap().version, 1);

    harness.shutdown.cancel();
    assert!(harness.run.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn shutdown_while_waiting_for_provider_exits_cleanly() {
    let provider = Arc::new(FlakyProvider::default());
    provider.down.store(true, Ordering::SeqCst);

    let harness = launch(provider.clone(), Arc::default(), BotOptions::default());
    sleep(Duration::from_secs(20)).await;
    assert_eq!(harness.bot.state(), BotState::FetchingConfig);

    harness.shutdown.cancel();
    assert!(harness.run.await.unwrap().is_ok());
    assert_eq!(harness.bot.state(), BotState::ShuttingDown);
    assert!(harness.bot.cache().snapshot().is_none());
}

#[tokio::test(start_paused = true)]
async fn gives_up_when_startup_window_is_exhausted() {
    let provider = Arc::new(FlakyProvider::default());
    provider.down.store(true, Ordering::SeqCst);
    let options = BotOptions {
        max_startup: Some(Duration::from_secs(10)),
        ..BotOptions::default()
    };

    let harness = launch(provider.clone(), Arc::default(), options);
    let err = harness.run.await.unwrap().unwrap_err();

    // attempts at 0s, 1s, 3s and 7s; the next wait (8s) would overrun
    match err {
        TetherError::FatalStartup { attempts, waited } => {
            assert_eq!(attempts, 4);
            assert_eq!(waited.as_secs(), 7);
        }
        other => panic!("expected FatalStartup, got {other:?}"),
    }
    assert_eq!(harness.bot.state(), BotState::ShuttingDown);
}

#[tokio::test(start_paused = true)]
async fn hanging_fetch_is_cut_off_by_timeout() {
    let provider = Arc::new(FlakyProvider::default());
    provider.hang_once.store(true, Ordering::SeqCst);
    let options = BotOptions {
        fetch_timeout: Duration::from_secs(5),
        ..BotOptions::default()
    };
    let started = Instant::now();

    let harness = launch(provider.clone(), Arc::default(), options);
    wait_running(&harness.bot).await;

    assert_eq!(started.elapsed().as_secs(), 6);
    assert_eq!(provider.attempts(), 2);

    harness.shutdown.cancel();
    harness.run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn keeps_working_on_stale_config_while_provider_is_down() {
    let provider = Arc::new(FlakyProvider::default());
    provider
        .store
        .set_config(json!({"refresh_interval_secs": 5, "work_interval_secs": 1}))
        .unwrap();
    let work = Arc::new(Recorder::default());

    let harness = launch(provider.clone(), work.clone(), BotOptions::default());
    wait_running(&harness.bot).await;

    provider.down.store(true, Ordering::SeqCst);
    provider
        .store
        .set_config(json!({"refresh_interval_secs": 5, "work_interval_secs": 1, "rate_limit": 20}))
        .unwrap();

    // the refresh at 5s fails
    sleep(Duration::from_millis(6500)).await;
    let status = harness.bot.status();
    assert!(status.degraded);
    assert_eq!(status.version, Some(1));
    assert_eq!(status.state, BotState::Running);
    let units_while_degraded = work.finished.load(Ordering::SeqCst);
    assert!(units_while_degraded >= 6, "ran {units_while_degraded} units");

    // the refresh at 10s succeeds
    provider.down.store(false, Ordering::SeqCst);
    sleep(Duration::from_secs(5)).await;
    let status = harness.bot.status();
    assert!(!status.degraded);
    assert_eq!(status.version, Some(2));

    harness.shutdown.cancel();
    harness.run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn hanging_refresh_counts_as_failure() {
    let provider = Arc::new(FlakyProvider::default());
    provider.store.set_config(json!({"rate_limit": 10})).unwrap();
    let options = BotOptions {
        fetch_timeout: Duration::from_secs(2),
        ..BotOptions::default()
    };

    let harness = launch(provider.clone(), Arc::default(), options);
    wait_running(&harness.bot).await;

    provider.store.set_config(json!({"rate_limit": 20})).unwrap();
    provider.hang_once.store(true, Ordering::SeqCst);
    let before = harness.bot.cache().configuration().unwrap();
    let started = Instant::now();

    assert_eq!(harness.bot.refresh().await, RefreshOutcome::Degraded);
    assert_eq!(started.elapsed().as_secs(), 2);
    assert_eq!(harness.bot.cache().configuration().unwrap(), before);
    let status = harness.bot.status();
    assert!(status.degraded);
    assert_eq!(status.version, Some(1));
    assert_eq!(status.state, BotState::Running);

    assert_eq!(
        harness.bot.refresh().await,
        RefreshOutcome::Updated { from: 1, to: 2 }
    );
    assert!(!harness.bot.status().degraded);

    harness.shutdown.cancel();
    harness.run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn oversized_intervals_from_provider_are_capped() {
    let provider = Arc::new(FlakyProvider::default());
    provider
        .store
        .set_config(json!({"refresh_interval_secs": u64::MAX, "work_interval_secs": u64::MAX}))
        .unwrap();
    let work = Arc::new(Recorder::default());

    let harness = launch(provider.clone(), work.clone(), BotOptions::default());
    wait_running(&harness.bot).await;
    sleep(Duration::from_secs(3)).await;

    assert_eq!(harness.bot.refresh_interval(), MAX_INTERVAL);
    assert_eq!(harness.bot.work_interval(), MAX_INTERVAL);
    assert_eq!(work.finished.load(Ordering::SeqCst), 1);
    assert_eq!(harness.bot.state(), BotState::Running);

    harness.shutdown.cancel();
    assert!(harness.run.await.unwrap().is_ok());
}

#[tokio::test(start_paused = true)]
async fn hourly_budget_limits_units() {
    let provider = Arc::new(FlakyProvider::default());
    provider
        .store
        .set_config(json!({"max_units_per_hour": 2, "work_interval_secs": 1}))
        .unwrap();
    let work = Arc::new(Recorder::default());

    let harness = launch(provider.clone(), work.clone(), BotOptions::default());
    wait_running(&harness.bot).await;
    sleep(Duration::from_millis(10_500)).await;

    assert_eq!(work.finished.load(Ordering::SeqCst), 2);
    assert_eq!(harness.bot.status().units_this_window, 2);

    harness.shutdown.cancel();
    harness.run.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_in_flight_unit() {
    let provider = Arc::new(FlakyProvider::default());
    let work = Arc::new(Recorder {
        duration: Some(Duration::from_secs(3)),
        ..Recorder::default()
    });
    let started = Instant::now();

    let harness = launch(provider.clone(), work.clone(), BotOptions::default());
    wait_running(&harness.bot).await;
    sleep(Duration::from_secs(1)).await;
    assert_eq!(work.started.load(Ordering::SeqCst), 1);
    assert_eq!(work.finished.load(Ordering::SeqCst), 0);

    harness.shutdown.cancel();
    assert!(harness.run.await.unwrap().is_ok());

    assert_eq!(work.finished.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed().as_secs(), 3);
    assert_eq!(harness.bot.state(), BotState::ShuttingDown);
}

#[tokio::test(start_paused = true)]
async fn fatal_work_error_stops_the_bot() {
    let provider = Arc::new(FlakyProvider::default());
    let work = Arc::new(Recorder {
        fatal: true,
        ..Recorder::default()
    });

    let harness = launch(provider, work.clone(), BotOptions::default());
    let err = harness.run.await.unwrap().unwrap_err();

    assert!(matches!(err, TetherError::Fatal(_)));
    assert!(err.is_fatal());
    assert_eq!(work.started.load(Ordering::SeqCst), 1);
    assert_eq!(harness.bot.state(), BotState::ShuttingDown);
}
