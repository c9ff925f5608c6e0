//! Tether Error Types
//!
//! Error handling shared by the config server, the config client and the bot.

use std::time::Duration;
use thiserror::Error;

/// Why a configuration payload was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Body was not JSON at all
    #[error("payload is not valid JSON: {0}")]
    Malformed(String),

    /// Payload was JSON but not an object
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Payload was an empty object
    #[error("payload must not be empty")]
    Empty,

    /// Key is not part of a closed schema
    #[error("unknown key '{0}'")]
    UnknownKey(String),

    /// A required key is absent
    #[error("missing required key '{0}'")]
    MissingKey(String),

    /// A key is present but its value breaks the rule for that key
    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    /// Rejected by a remote provider; only its message is known
    #[error("rejected by provider: {0}")]
    Remote(String),
}

/// Main error type for Tether operations
#[derive(Debug, Error)]
pub enum TetherError {
    /// Payload rejected at the provider boundary
    #[error("configuration rejected: {0}")]
    Validation(#[from] ValidationError),

    /// Config provider unreachable, failing, or too slow
    #[error("config provider unavailable: {0}")]
    Unavailable(String),

    /// Config provider never came up within the startup window
    #[error(
        "config provider unreachable after {attempts} attempts over {}s",
        waited.as_secs()
    )]
    FatalStartup { attempts: u32, waited: Duration },

    /// Credential rejected by the config provider
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Provider answered with something we could not understand
    #[error("response error: {0}")]
    Response(String),

    /// Bad bootstrap settings or schema file
    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot persistence failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unrecoverable failure raised by a work unit
    #[error("fatal: {0}")]
    Fatal(String),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl TetherError {
    /// Errors that end the bot's control loop instead of being logged and retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TetherError::FatalStartup { .. } | TetherError::Fatal(_))
    }

    /// Short, stable label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TetherError::Validation(_) => "validation",
            TetherError::Unavailable(_) => "unavailable",
            TetherError::FatalStartup { .. } => "fatal_startup",
            TetherError::Auth(_) => "auth",
            TetherError::Response(_) => "response",
            TetherError::Config(_) => "config",
            TetherError::Io(_) => "io",
            TetherError::Fatal(_) => "fatal",
            TetherError::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for TetherError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TetherError::Unavailable(format!("request timed out: {}", err))
        } else if err.is_connect() {
            TetherError::Unavailable(format!("connection failed: {}", err))
        } else if err.is_decode() {
            TetherError::Response(format!("failed to decode response: {}", err))
        } else {
            TetherError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TetherError {
    fn from(err: serde_json::Error) -> Self {
        TetherError::Response(format!("JSON parsing error: {}", err))
    }
}

/// Result type alias for Tether operations
pub type Result<T> = std::result::Result<T, TetherError>;
