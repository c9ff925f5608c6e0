//! Bot lifecycle states.

use serde::Serialize;
use std::fmt;

/// Where the bot is in its lifecycle.
///
/// `Starting → FetchingConfig → Running ⇄ Refreshing → ShuttingDown`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotState {
    Starting,
    /// Waiting for the first configuration; the only state that can block indefinitely
    FetchingConfig,
    Running,
    Refreshing,
    /// Terminal
    ShuttingDown,
}

impl BotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotState::Starting => "starting",
            BotState::FetchingConfig => "fetching_config",
            BotState::Running => "running",
            BotState::Refreshing => "refreshing",
            BotState::ShuttingDown => "shutting_down",
        }
    }

    /// Whether a configuration is cached and work is being done
    pub fn is_operational(&self) -> bool {
        matches!(self, BotState::Running | BotState::Refreshing)
    }
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
