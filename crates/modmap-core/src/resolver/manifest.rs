//! Parsed `package.json` cache.
//!
//! Entries are validated against the file's mtime/size stamp on every
//! lookup, so an edited manifest is re-read on the next call.

use modmap_util::fs::FileStamp;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

#[derive(Debug)]
struct CachedManifest {
    value: Option<Arc<Value>>,
    stamp: FileStamp,
}

/// Thread-safe cache of parsed manifests keyed by path.
#[derive(Debug, Default)]
pub struct ManifestCache {
    entries: RwLock<FxHashMap<PathBuf, CachedManifest>>,
}

impl ManifestCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and parse the manifest at `path`.
    ///
    /// Returns `None` when the file is missing or not valid JSON. Invalid
    /// JSON is cached too until the file changes.
    pub fn read(&self, path: &Path) -> Option<Arc<Value>> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = entries.get(path) {
                if cached.stamp.matches(path) {
                    return cached.value.clone();
                }
            }
        }

        let stamp = FileStamp::from_path(path);
        if !stamp.exists() {
            self.entries
                .write()
                .unwrap_or_else(|e| e.into_inner())
                .remove(path);
            return None;
        }

        let value = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| match serde_json::from_str::<Value>(&content) {
                Ok(value) => Some(Arc::new(value)),
                Err(err) => {
                    tracing::debug!(path = %path.display(), error = %err, "invalid package manifest");
                    None
                }
            });

        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                path.to_path_buf(),
                CachedManifest {
                    value: value.clone(),
                    stamp,
                },
            );
        value
    }

    /// Number of cached manifests.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
