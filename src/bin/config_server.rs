//! tether-config-server - serves the bot's configuration.

use std::sync::Arc;
use tether::config::{SchemaLoader, ServerSettings};
use tether::provider::{serve, AccessGuard, ConfigStore, ServerState};
use tether::shutdown::shutdown_signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tether::telemetry::init();

    let settings = ServerSettings::from_env().map_err(|e| {
        error!(error = %e, "Invalid server settings");
        e
    })?;

    if settings.uses_default_password() {
        warn!("Running with the default admin password; set CONFIG_PASSWORD");
    }

    let schema = SchemaLoader::new()?.into_schema();
    let store = ConfigStore::from_settings(schema, &settings).map_err(|e| {
        error!(error = %e, "Failed to open configuration store");
        e
    })?;

    info!(
        version = store.get_config().version,
        persisted = settings.store_path.is_some(),
        protect_reads = settings.protect_reads,
        "Starting config server"
    );

    let state = ServerState {
        store: Arc::new(store),
        guard: Arc::new(AccessGuard::new(settings.credentials.clone())),
        protect_reads: settings.protect_reads,
    };

    serve(state, settings.bind_addr, shutdown_signal()).await?;
    Ok(())
}
