//! tether-bot - long-running bot driven by the config server.
//!
//! Exits 0 after a requested shutdown, non-zero when startup gives up or a
//! work unit fails fatally.

use std::sync::Arc;
use std::time::Duration;
use tether::bot::{status, Bot, BotOptions, Heartbeat};
use tether::client::HttpConfigClient;
use tether::config::BotSettings;
use tether::shutdown::spawn_signal_listener;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tether::telemetry::init();

    let settings = BotSettings::from_env().map_err(|e| {
        error!(error = %e, "Invalid bot settings");
        e
    })?;

    let client = HttpConfigClient::from_settings(&settings)?;
    let bot = Arc::new(Bot::new(
        Arc::new(client),
        Arc::new(Heartbeat::new()),
        BotOptions::from(&settings),
    ));

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    let status_task = settings.status_addr.map(|addr| {
        let bot = bot.clone();
        let stop = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = status::serve(bot, addr, stop.cancelled_owned()).await {
                warn!(%addr, error = %e, "Status endpoint failed");
            }
        })
    });

    let result = bot.run(shutdown.clone()).await;

    shutdown.cancel();
    if let Some(task) = status_task {
        let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
    }

    result?;
    Ok(())
}
