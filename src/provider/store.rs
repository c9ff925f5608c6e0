//! Versioned configuration store.
//!
//! Readers clone an `Arc` under a short read lock and never wait on each
//! other. Writers are serialized by a separate mutex which also covers
//! history and persistence; the publish itself is a single pointer swap, so
//! no reader can observe a partially applied update.

use crate::config::{Configuration, Schema, ServerSettings};
use crate::error::{Result, ValidationError};
use crate::provider::snapshot::SnapshotFile;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Number of versions retained for lookup unless configured otherwise
pub const DEFAULT_HISTORY_LIMIT: usize = 32;

/// Owner of the current configuration
#[derive(Debug)]
pub struct ConfigStore {
    /// Rules every payload must satisfy
    schema: Schema,

    /// Currently published configuration
    current: RwLock<Arc<Configuration>>,

    /// Retained versions, oldest first
    history: RwLock<VecDeque<Arc<Configuration>>>,

    /// Serializes writers
    writer: Mutex<Writer>,
}

#[derive(Debug)]
struct Writer {
    history_limit: usize,
    snapshot: Option<SnapshotFile>,
}

impl ConfigStore {
    /// Create an in-memory store serving the empty default
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            current: RwLock::new(Arc::new(Configuration::empty())),
            history: RwLock::new(VecDeque::new()),
            writer: Mutex::new(Writer {
                history_limit: DEFAULT_HISTORY_LIMIT,
                snapshot: None,
            }),
        }
    }

    /// Create a store backed by a snapshot file, restoring whatever it holds
    pub fn open(schema: Schema, path: impl AsRef<Path>, history_limit: usize) -> Result<Self> {
        let snapshot = SnapshotFile::new(path.as_ref());
        let restored = snapshot.load()?;

        let store = Self::new(schema).with_history_limit(history_limit);
        {
            let mut history = store.history.write();
            for config in restored {
                history.push_back(Arc::new(config));
            }
            while history.len() > history_limit.max(1) {
                history.pop_front();
            }
            if let Some(latest) = history.back() {
                *store.current.write() = latest.clone();
            }
        }
        let current = store.get_config();
        info!(
            path = %snapshot.path().display(),
            version = current.version,
            "Restored configuration snapshot"
        );
        store.writer.lock().snapshot = Some(snapshot);

        // served anyway; the next valid update replaces it
        if let Err(e) = store.validate_current() {
            warn!(
                version = current.version,
                error = %e,
                "Restored configuration no longer satisfies the schema"
            );
        }
        Ok(store)
    }

    /// Create the store described by the server's bootstrap settings
    pub fn from_settings(schema: Schema, settings: &ServerSettings) -> Result<Self> {
        match &settings.store_path {
            Some(path) => Self::open(schema, path, settings.history_limit),
            None => Ok(Self::new(schema).with_history_limit(settings.history_limit)),
        }
    }

    /// Override the number of retained versions
    pub fn with_history_limit(self, history_limit: usize) -> Self {
        self.writer.lock().history_limit = history_limit.max(1);
        self
    }

    /// Schema used to validate payloads
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Check the published configuration against the store's schema.
    ///
    /// The empty default always passes.
    pub fn validate_current(&self) -> std::result::Result<(), ValidationError> {
        let current = self.get_config();
        if current.is_default() {
            return Ok(());
        }
        self.schema
            .validate(Value::Object(current.payload.clone()))
            .map(|_| ())
    }

    /// Current configuration; the empty default (version 0) if nothing was set
    pub fn get_config(&self) -> Arc<Configuration> {
        self.current.read().clone()
    }

    /// Validate and publish a new payload under the next version.
    ///
    /// On any failure the published configuration is left untouched.
    pub fn set_config(&self, value: Value) -> Result<Arc<Configuration>> {
        let payload = self.schema.validate(value)?;

        let writer = self.writer.lock();
        let next = Arc::new(self.get_config().next(payload));

        let mut retained: Vec<Arc<Configuration>> = self.history.read().iter().cloned().collect();
        retained.push(next.clone());
        let excess = retained.len().saturating_sub(writer.history_limit);
        retained.drain(..excess);

        if let Some(snapshot) = &writer.snapshot {
            snapshot.save(&retained)?;
        }

        *self.history.write() = retained.into();
        *self.current.write() = next.clone();

        debug!(
            version = next.version,
            keys = next.payload.len(),
            "Published configuration"
        );
        Ok(next)
    }

    /// A retained version, if still in history
    pub fn get_version(&self, version: u64) -> Option<Arc<Configuration>> {
        if version == 0 {
            return Some(Arc::new(Configuration::empty()));
        }
        self.history
            .read()
            .iter()
            .find(|c| c.version == version)
            .cloned()
    }

    /// Retained version numbers, oldest first
    pub fn versions(&self) -> Vec<u64> {
        self.history.read().iter().map(|c| c.version).collect()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Schema::default())
    }
}
