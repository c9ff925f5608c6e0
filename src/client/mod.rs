//! Client Module
//!
//! Ways for the bot to obtain its configuration, and how it retries.

pub mod http;
pub mod retry;

pub use http::HttpConfigClient;
pub use retry::RetryPolicy;

use crate::config::Configuration;
use crate::error::Result;
use crate::provider::ConfigStore;
use async_trait::async_trait;
use std::sync::Arc;

/// Anything the bot can pull a configuration snapshot from
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Fetch the current configuration
    async fn fetch(&self) -> Result<Configuration>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

#[async_trait]
impl ConfigSource for HttpConfigClient {
    async fn fetch(&self) -> Result<Configuration> {
        self.get_config().await
    }

    fn describe(&self) -> String {
        self.config_url().to_string()
    }
}

/// An in-process store is a source too (single-binary deployments, tests)
#[async_trait]
impl ConfigSource for ConfigStore {
    async fn fetch(&self) -> Result<Configuration> {
        Ok(self.get_config().as_ref().clone())
    }

    fn describe(&self) -> String {
        "in-process store".to_string()
    }
}

#[async_trait]
impl<T: ConfigSource + ?Sized> ConfigSource for Arc<T> {
    async fn fetch(&self) -> Result<Configuration> {
        (**self).fetch().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
