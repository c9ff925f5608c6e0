//! Tether - a versioned config server and the bot that follows it
//!
//! The config provider owns a versioned configuration and serves it over
//! HTTP. The bot fetches it on startup (backing off while the provider is
//! unreachable), caches it, refreshes it on an interval and keeps running on
//! the last known-good version when refreshes fail.

pub mod bot;
pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod shutdown;
pub mod telemetry;

pub use bot::{Bot, BotOptions, BotState, BotStatus, Heartbeat, RefreshOutcome, WorkUnit};
pub use client::{ConfigSource, HttpConfigClient, RetryPolicy};
pub use config::{BotSettings, Configuration, Credential, Payload, Schema, ServerSettings};
pub use error::{Result, TetherError, ValidationError};
pub use provider::{AccessGuard, ConfigStore, ServerState};
