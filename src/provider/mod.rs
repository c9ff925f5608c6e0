//! Config Provider
//!
//! Owns the versioned configuration and serves it over HTTP.

pub mod auth;
pub mod server;
pub mod snapshot;
pub mod store;

pub use auth::AccessGuard;
pub use server::{router, serve, ServerState};
pub use snapshot::SnapshotFile;
pub use store::{ConfigStore, DEFAULT_HISTORY_LIMIT};
