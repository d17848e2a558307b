use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::AppResult;

const CONTENT_LOG_FILE: &str = "content_log.jsonl";

/// Audit record for one successful write action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentLogEntry {
    pub id: String,
    pub timestamp: i64,
    pub operation: String,
    pub destination: String,
    pub content: String,
    pub username: String,
}

impl ContentLogEntry {
    pub fn new(
        operation: &str,
        destination: &str,
        content: &str,
        username: &str,
        timestamp: i64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            operation: operation.to_string(),
            destination: destination.to_string(),
            content: content.to_string(),
            username: username.to_string(),
        }
    }
}

pub struct ContentLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ContentLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CONTENT_LOG_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn append(&self, entry: &ContentLogEntry) -> AppResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Malformed lines are skipped.
    pub async fn read_all(&self) -> AppResult<Vec<ContentLogEntry>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::debug!("Skipping malformed content log line: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn contains_destination(&self, destination: &str) -> AppResult<bool> {
        Ok(self
            .read_all()
            .await?
            .iter()
            .any(|entry| entry.destination == destination))
    }
}
