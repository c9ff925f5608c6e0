//! Snapshot persistence for the config store.
//!
//! Retained versions are written as one JSON document, replaced atomically
//! via a temp file and rename so a crash never leaves a half-written file.

use crate::config::Configuration;
use crate::error::{Result, TetherError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotDocument {
    versions: Vec<Configuration>,
}

#[derive(Serialize)]
struct SnapshotDocumentRef<'a> {
    versions: Vec<&'a Configuration>,
}

/// On-disk snapshot of retained configuration versions
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read retained versions, oldest first. A missing file is an empty history.
    pub fn load(&self) -> Result<Vec<Configuration>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        let document: SnapshotDocument = serde_json::from_str(&content).map_err(|e| {
            TetherError::Config(format!(
                "Failed to parse snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut versions = document.versions;
        versions.sort_by_key(|c| c.version);
        versions.dedup_by_key(|c| c.version);
        Ok(versions)
    }

    /// Replace the snapshot with `versions`
    pub fn save<'a, I>(&self, versions: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Arc<Configuration>>,
    {
        let document = SnapshotDocumentRef {
            versions: versions.into_iter().map(|c| c.as_ref()).collect(),
        };
        let body = serde_json::to_vec_pretty(&document)
            .map_err(|e| TetherError::Internal(format!("Failed to encode snapshot: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.tmp_path();
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn version(n: u64) -> Arc<Configuration> {
        let mut config = Configuration::empty();
        for _ in 0..n {
            config = config.next(json!({"n": n}).as_object().cloned().unwrap());
        }
        Arc::new(config)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = SnapshotFile::new(dir.path().join("absent.json"));
        assert!(snapshot.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let snapshot = SnapshotFile::new(&path);

        snapshot.save(&[version(1), version(2)]).unwrap();

        assert!(path.exists());
        assert!(!dir.path().join("nested").join("config.json.tmp").exists());

        let loaded = snapshot.load().unwrap();
        assert_eq!(
            loaded.iter().map(|c| c.version).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_corrupt_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ versions: oops").unwrap();

        let err = SnapshotFile::new(&path).load().unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
    }
}
