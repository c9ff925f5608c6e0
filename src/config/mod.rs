//! Configuration Module
//!
//! The versioned configuration record, its payload schema, and the
//! bootstrap settings both processes read from the environment.

pub mod env;
pub mod loader;
pub mod model;
pub mod schema;

pub use env::{BotSettings, Credential, ServerSettings};
pub use loader::SchemaLoader;
pub use model::{
    Configuration, Payload, MAX_UNITS_PER_HOUR_KEY, REFRESH_INTERVAL_KEY, WORK_INTERVAL_KEY,
};
pub use schema::{KeyRule, Schema};
