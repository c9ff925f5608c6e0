//! Schema Loader
//!
//! Handles loading and merging payload schemas from multiple sources.

use crate::config::schema::Schema;
use crate::error::{Result, TetherError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Schema loader with support for multiple sources
pub struct SchemaLoader {
    schema: Schema,
}

impl SchemaLoader {
    /// Create a new loader and load from default locations
    pub fn new() -> Result<Self> {
        let mut loader = Self::builtin()?;

        // Then load from file system (can override built-ins)
        loader.load_from_default_paths()?;

        Ok(loader)
    }

    /// Create a loader with a specific schema file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::builtin()?;
        loader.load_from_file(path)?;
        Ok(loader)
    }

    /// Loader holding only the compiled-in schema
    pub fn builtin() -> Result<Self> {
        let mut loader = Self {
            schema: Schema::default(),
        };
        loader.load_builtin_defaults()?;
        Ok(loader)
    }

    /// Load built-in schema defaults
    fn load_builtin_defaults(&mut self) -> Result<()> {
        let defaults = include_str!("../../schema.json");
        let schema: Schema = serde_json::from_str(defaults).map_err(|e| {
            TetherError::Config(format!("Failed to parse built-in schema.json: {}", e))
        })?;

        self.schema.merge(schema);
        Ok(())
    }

    /// Load schemas from default paths
    fn load_from_default_paths(&mut self) -> Result<()> {
        for path in Self::get_schema_paths() {
            if path.exists() {
                self.load_from_file(&path)?;
            }
        }

        Ok(())
    }

    /// Get list of schema paths to check
    fn get_schema_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // 1. Current directory
        paths.push(PathBuf::from("config_schema.json"));

        // 2. User config directory
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("tether").join("schema.json"));
        }

        // 3. Environment variable, last so it wins
        if let Ok(custom_path) = std::env::var("CONFIG_SCHEMA_PATH") {
            paths.push(PathBuf::from(custom_path));
        }

        paths
    }

    /// Load a schema from a specific file
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TetherError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let schema: Schema = serde_json::from_str(&content).map_err(|e| {
            TetherError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        debug!(path = %path.display(), keys = schema.keys.len(), "Loaded schema file");
        self.schema.merge(schema);
        Ok(())
    }

    /// Get the loaded schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Take ownership of the schema
    pub fn into_schema(self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::KeyRule;
    use crate::config::{MAX_UNITS_PER_HOUR_KEY, REFRESH_INTERVAL_KEY, WORK_INTERVAL_KEY};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_schema_declares_bot_keys() {
        let loader = SchemaLoader::builtin().unwrap();
        let schema = loader.schema();

        assert!(schema.allow_unknown_keys);
        assert!(schema.keys.contains_key(REFRESH_INTERVAL_KEY));
        assert!(schema.keys.contains_key(WORK_INTERVAL_KEY));
        assert_eq!(
            schema.keys[MAX_UNITS_PER_HOUR_KEY],
            KeyRule::Integer {
                min: Some(1),
                max: Some(60)
            }
        );
    }

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "allow_unknown_keys": false,
                "keys": {{
                    "endpoint": {{ "type": "url" }}
                }}
            }}"#
        )
        .unwrap();

        let schema = SchemaLoader::from_path(file.path()).unwrap().into_schema();
        assert!(!schema.allow_unknown_keys);
        assert_eq!(schema.keys["endpoint"], KeyRule::Url);
        // built-in rules survive the merge
        assert!(schema.keys.contains_key(REFRESH_INTERVAL_KEY));
    }

    #[test]
    fn test_unparseable_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let err = SchemaLoader::from_path(file.path()).err().unwrap();
        assert!(matches!(err, TetherError::Config(_)));
    }
}
