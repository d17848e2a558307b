use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AppResult;
use crate::models::PoolDocument;

const CACHE_FILE: &str = "pool_cache.json";

/// Best-effort local mirror of the pool. The remote document stays
/// authoritative, so an oversized snapshot is skipped rather than truncated.
pub struct LocalPoolCache {
    path: PathBuf,
    max_bytes: usize,
}

impl LocalPoolCache {
    pub fn new(data_dir: &Path, max_bytes: usize) -> Self {
        Self {
            path: data_dir.join(CACHE_FILE),
            max_bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AppResult<Option<PoolDocument>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<PoolDocument>(&content) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                tracing::warn!(
                    "Local pool cache at {:?} is unreadable ({}), ignoring it",
                    self.path,
                    e
                );
                Ok(None)
            }
        }
    }

    /// Returns `false` when the snapshot exceeds the byte cap and was not written.
    pub fn save(&self, doc: &PoolDocument) -> AppResult<bool> {
        let json = serde_json::to_string(doc)?;
        if json.len() > self.max_bytes {
            tracing::warn!(
                "Pool snapshot ({} bytes, {} credentials) exceeds local cache cap of {} bytes, skipping local mirror",
                json.len(),
                doc.count,
                self.max_bytes
            );
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(true)
    }
}
