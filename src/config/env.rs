//! Bootstrap Settings
//!
//! Process-level settings read from environment variables at startup. These
//! are the only inputs not served by the config provider itself.

use crate::error::{Result, TetherError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default provider address for the bot
pub const DEFAULT_PROVIDER_URL: &str = "http://127.0.0.1:8080";

/// Default bind address for the config server
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

/// Default admin username for the config server
pub const DEFAULT_USERNAME: &str = "admin";

/// Default admin password for the config server
pub const DEFAULT_PASSWORD: &str = "changeme";

/// Credential presented to (or expected by) the config provider
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// HTTP basic auth
    Basic { username: String, password: String },

    /// Bearer token
    Bearer(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credential::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// Settings for the bot process
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Base URL of the config provider
    pub provider_url: String,

    /// Credential sent with every fetch
    pub credential: Option<Credential>,

    /// Refresh interval used when the configuration does not set one
    pub refresh_interval: Option<Duration>,

    /// Work interval used when the configuration does not set one
    pub work_interval: Option<Duration>,

    /// Upper bound on a single fetch
    pub fetch_timeout: Duration,

    /// First startup retry delay
    pub backoff_base: Duration,

    /// Largest startup retry delay
    pub backoff_cap: Duration,

    /// Give up on startup after this long (None = retry forever)
    pub max_startup: Option<Duration>,

    /// Where to serve `GET /status`
    pub status_addr: Option<SocketAddr>,
}

impl BotSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_url = non_empty(&lookup, "CONFIG_PROVIDER_URL")
            .unwrap_or_else(|| DEFAULT_PROVIDER_URL.to_string());
        reqwest::Url::parse(&provider_url).map_err(|e| {
            TetherError::Config(format!("CONFIG_PROVIDER_URL '{}': {}", provider_url, e))
        })?;

        let credential = if let Some(token) = non_empty(&lookup, "CONFIG_TOKEN") {
            Some(Credential::Bearer(token))
        } else {
            match (
                non_empty(&lookup, "CONFIG_USERNAME"),
                non_empty(&lookup, "CONFIG_PASSWORD"),
            ) {
                (Some(username), Some(password)) => Some(Credential::Basic { username, password }),
                _ => None,
            }
        };

        Ok(Self {
            provider_url,
            credential,
            refresh_interval: parse_nonzero(&lookup, "BOT_REFRESH_SECS")?
                .map(Duration::from_secs),
            work_interval: parse_nonzero(&lookup, "BOT_WORK_INTERVAL_SECS")?
                .map(Duration::from_secs),
            fetch_timeout: Duration::from_secs(
                parse_nonzero(&lookup, "BOT_FETCH_TIMEOUT_SECS")?.unwrap_or(10),
            ),
            backoff_base: Duration::from_millis(
                parse_nonzero(&lookup, "BOT_BACKOFF_BASE_MS")?.unwrap_or(1000),
            ),
            backoff_cap: Duration::from_secs(
                parse_nonzero(&lookup, "BOT_BACKOFF_CAP_SECS")?.unwrap_or(60),
            ),
            max_startup: parse_nonzero(&lookup, "BOT_MAX_STARTUP_SECS")?
                .map(Duration::from_secs),
            status_addr: parse(&lookup, "BOT_STATUS_ADDR")?,
        })
    }
}

/// Settings for the config server process
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Listen address
    pub bind_addr: SocketAddr,

    /// Credentials accepted on the write endpoint
    pub credentials: Vec<Credential>,

    /// Require a credential for reads as well
    pub protect_reads: bool,

    /// Snapshot file; None keeps everything in memory
    pub store_path: Option<PathBuf>,

    /// Number of versions retained for lookup
    pub history_limit: usize,
}

impl ServerSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse(&lookup, "CONFIG_BIND_ADDR")?.unwrap_or_else(|| {
            DEFAULT_BIND_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)))
        });

        let mut credentials = vec![Credential::Basic {
            username: non_empty(&lookup, "CONFIG_USERNAME")
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            password: non_empty(&lookup, "CONFIG_PASSWORD")
                .unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
        }];
        if let Some(token) = non_empty(&lookup, "CONFIG_TOKEN") {
            credentials.push(Credential::Bearer(token));
        }

        let history_limit = parse(&lookup, "CONFIG_HISTORY_LIMIT")?.unwrap_or(32usize);
        if history_limit == 0 {
            return Err(TetherError::Config(
                "CONFIG_HISTORY_LIMIT must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            credentials,
            protect_reads: parse_flag(&lookup, "CONFIG_PROTECT_READS")?,
            store_path: non_empty(&lookup, "CONFIG_STORE_PATH").map(PathBuf::from),
            history_limit,
        })
    }

    /// Whether the server would accept the well-known default password
    pub fn uses_default_password(&self) -> bool {
        self.credentials.iter().any(|c| {
            matches!(c, Credential::Basic { password, .. } if password == DEFAULT_PASSWORD)
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    non_empty(lookup, key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| TetherError::Config(format!("{} '{}': {}", key, raw, e)))
        })
        .transpose()
}

/// Like [`parse`], but zero is a configuration error
fn parse_nonzero<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match parse::<u64, _>(lookup, key)? {
        Some(0) => Err(TetherError::Config(format!("{} must be greater than 0", key))),
        value => Ok(value),
    }
}

fn parse_flag<F>(lookup: &F, key: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup, key).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(TetherError::Config(format!(
                "{} '{}': expected a boolean",
                key, v
            ))),
        },
    }
}
