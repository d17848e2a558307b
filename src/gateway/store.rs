use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;

use crate::error::{AppError, AppResult, ExhaustionCause, GatewayError};
use crate::models::{Credential, CredentialStatus, NewCredential, PoolDocument, RangeConfig};
use crate::modules::persistence::local_cache::LocalPoolCache;
use crate::modules::persistence::remote_store::PoolDocumentStore;
use crate::utils::time::{format_ms, now_ms};

use super::import::{parse_bulk, RejectedLine};
use super::pacing::random_cooldown_ms;
use super::reconcile::{merge_remote, rebase_on_remote, MergeOutcome};
use super::refresh::refresh_statuses;
use super::selection::{select_and_commit, Selection, SelectionPolicy};

#[derive(Debug, Default, Clone, Serialize)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub duplicates: Vec<String>,
    pub rejected: Vec<RejectedLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    LocalCache,
    Remote,
    Empty,
}

struct LocalMirror {
    cache: LocalPoolCache,
    io: Mutex<()>,
}

impl LocalMirror {
    /// Snapshots under the io lock, so the last write carries the newest pool.
    fn write(&self, credentials: &Mutex<Vec<Credential>>) -> AppResult<bool> {
        let _io = self.io.lock();
        let doc = PoolDocument::new(credentials.lock().clone(), now_ms());
        self.cache.save(&doc)
    }
}

/// Ordered credential pool with a local mirror and a shared remote document.
///
/// The synchronous lock is never held across an await; selection and its
/// pre-commit happen under one acquisition.
pub struct CredentialPool {
    credentials: Arc<Mutex<Vec<Credential>>>,
    policy: SelectionPolicy,
    cooldown_secs: RangeConfig,
    mirror: Arc<LocalMirror>,
    /// Usernames removed here and not yet absent from the remote document.
    removed: Mutex<HashSet<String>>,
    remote: Arc<dyn PoolDocumentStore>,
    remote_io: tokio::sync::Mutex<()>,
    push_signal: Notify,
}

impl CredentialPool {
    pub fn new(
        policy: SelectionPolicy,
        cooldown_secs: RangeConfig,
        local: LocalPoolCache,
        remote: Arc<dyn PoolDocumentStore>,
    ) -> Self {
        Self {
            credentials: Arc::new(Mutex::new(Vec::new())),
            policy,
            cooldown_secs,
            mirror: Arc::new(LocalMirror {
                cache: local,
                io: Mutex::new(()),
            }),
            removed: Mutex::new(HashSet::new()),
            remote,
            remote_io: tokio::sync::Mutex::new(()),
            push_signal: Notify::new(),
        }
    }

    pub fn policy(&self) -> &SelectionPolicy {
        &self.policy
    }

    /// The remote document is the base when it has credentials; the local
    /// mirror contributes its usage and any credentials never pushed. An
    /// unreachable remote falls back to a non-empty mirror.
    pub async fn load(&self) -> AppResult<LoadSource> {
        let cached = self.mirror.cache.load()?.map(|doc| doc.pool).unwrap_or_default();
        let fetched = match self.remote.fetch().await {
            Ok(doc) => doc,
            Err(e) if !cached.is_empty() => {
                tracing::warn!("Remote fetch failed, continuing with local cache: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        match fetched {
            Some(doc) if !doc.pool.is_empty() => {
                let (pool, outcome) = rebase_on_remote(doc.pool, doc.updated_at, &cached);
                tracing::info!(
                    merged = outcome.updated.len(),
                    kept_local = outcome.adopted.len(),
                    dropped_local = outcome.skipped.len(),
                    "Loaded {} credential(s) from {}",
                    pool.len(),
                    self.remote.describe()
                );
                *self.credentials.lock() = pool;
                self.flush_local().await?;
                if !outcome.adopted.is_empty() {
                    self.request_push();
                }
                Ok(LoadSource::Remote)
            }
            _ if !cached.is_empty() => {
                tracing::info!("Loaded {} credential(s) from local cache", cached.len());
                *self.credentials.lock() = cached;
                self.request_push();
                Ok(LoadSource::LocalCache)
            }
            _ => {
                tracing::info!("Credential pool is empty");
                Ok(LoadSource::Empty)
            }
        }
    }

    /// Writes the local mirror on the blocking pool and waits for it.
    pub async fn flush_local(&self) -> AppResult<bool> {
        let credentials = self.credentials.clone();
        let mirror = self.mirror.clone();
        tokio::task::spawn_blocking(move || mirror.write(&credentials))
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))?
    }

    /// Mirrors locally and schedules a remote push. Local failures are logged.
    pub fn save(&self) {
        let credentials = self.credentials.clone();
        let mirror = self.mirror.clone();
        let write = move || {
            if let Err(e) = mirror.write(&credentials) {
                tracing::warn!("Failed to write local pool cache: {}", e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let _ = handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
        self.request_push();
    }

    pub fn request_push(&self) {
        self.push_signal.notify_one();
    }

    pub(crate) async fn push_requested(&self) {
        self.push_signal.notified().await;
    }

    pub fn add(&self, fields: NewCredential) -> AppResult<Credential> {
        let credential = self.add_at(fields, now_ms())?;
        self.save();
        Ok(credential)
    }

    pub(crate) fn add_at(&self, fields: NewCredential, now: i64) -> AppResult<Credential> {
        fields.validate().map_err(AppError::Credential)?;
        let mut pool = self.credentials.lock();
        let username = fields.username.trim();
        if pool.iter().any(|c| c.username == username) {
            return Err(AppError::Credential(format!(
                "username {} already exists",
                username
            )));
        }
        let credential = Credential::new(fields, now);
        self.removed.lock().remove(&credential.username);
        tracing::info!(
            username = %credential.username,
            client_id = %credential.masked_client_id(),
            "Credential added"
        );
        pool.push(credential.clone());
        Ok(credential)
    }

    pub fn bulk_import(&self, text: &str) -> ImportReport {
        let parsed = parse_bulk(text);
        let now = now_ms();
        let mut report = ImportReport {
            rejected: parsed.rejected,
            ..ImportReport::default()
        };
        {
            let mut pool = self.credentials.lock();
            for fields in parsed.entries {
                let username = fields.username.trim().to_string();
                if pool.iter().any(|c| c.username == username) {
                    report.duplicates.push(username);
                    continue;
                }
                pool.push(Credential::new(fields, now));
                self.removed.lock().remove(&username);
                report.added.push(username);
            }
        }
        tracing::info!(
            added = report.added.len(),
            duplicates = report.duplicates.len(),
            rejected = report.rejected.len(),
            "Bulk import finished"
        );
        if !report.added.is_empty() {
            self.save();
        }
        report
    }

    /// Removes by id or username.
    pub fn remove(&self, key: &str) -> AppResult<Credential> {
        let removed = {
            let mut pool = self.credentials.lock();
            let index = pool
                .iter()
                .position(|c| c.id == key || c.username == key)
                .ok_or_else(|| AppError::Credential(format!("credential {} not found", key)))?;
            pool.remove(index)
        };
        self.removed.lock().insert(removed.username.clone());
        tracing::info!(username = %removed.username, "Credential removed");
        self.save();
        Ok(removed)
    }

    /// Refreshed view of the pool.
    pub fn list(&self) -> Vec<Credential> {
        self.list_at(now_ms())
    }

    pub(crate) fn list_at(&self, now: i64) -> Vec<Credential> {
        let (view, changed) = {
            let mut pool = self.credentials.lock();
            let report = refresh_statuses(&mut pool, now, self.policy.day_ms);
            (pool.clone(), report.changed())
        };
        if changed {
            self.save();
        }
        view
    }

    /// Raw view without the refresh pass.
    pub fn snapshot(&self) -> Vec<Credential> {
        self.credentials.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<Credential> {
        self.credentials.lock().iter().find(|c| c.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.credentials.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn active_count(&self) -> usize {
        self.credentials
            .lock()
            .iter()
            .filter(|c| c.status == CredentialStatus::Ready)
            .count()
    }

    pub fn select(&self) -> Result<Selection, GatewayError> {
        let selection = self.select_at(now_ms())?;
        self.save();
        Ok(selection)
    }

    pub(crate) fn select_at(&self, now: i64) -> Result<Selection, GatewayError> {
        let mut pool = self.credentials.lock();
        select_and_commit(&mut pool, now, &self.policy)
    }

    /// Explicit choice bypasses the selection checks but still pays for the use.
    pub fn use_explicit(&self, id: &str) -> Result<Credential, GatewayError> {
        let credential = self.use_explicit_at(id, now_ms())?;
        self.save();
        Ok(credential)
    }

    pub(crate) fn use_explicit_at(&self, id: &str, now: i64) -> Result<Credential, GatewayError> {
        let mut pool = self.credentials.lock();
        let credential = pool
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| {
                GatewayError::exhausted(ExhaustionCause::UnknownCredential(id.to_string()))
            })?;
        credential.mark_used(now, self.policy.daily_limit);
        Ok(credential.clone())
    }

    /// Applies a randomized cooldown. Returns the deadline.
    pub fn penalize(&self, id: &str) -> Option<i64> {
        let until = self.penalize_at(id, now_ms())?;
        self.save();
        Some(until)
    }

    pub(crate) fn penalize_at(&self, id: &str, now: i64) -> Option<i64> {
        let mut pool = self.credentials.lock();
        let credential = pool.iter_mut().find(|c| c.id == id)?;
        let until = now + random_cooldown_ms(&self.cooldown_secs);
        credential.penalize(until);
        tracing::warn!(
            username = %credential.username,
            status = credential.status.as_str(),
            cooldown_until = %format_ms(until),
            "Credential penalized"
        );
        Some(until)
    }

    pub fn mark_success(&self, id: &str) {
        let restored = {
            let mut pool = self.credentials.lock();
            pool.iter_mut()
                .find(|c| c.id == id)
                .map(|c| c.clear_penalty())
                .unwrap_or(false)
        };
        if restored {
            tracing::info!(credential_id = id, "Credential restored to READY");
            self.save();
        }
    }

    /// Fetches the shared document and merges it into the local pool.
    pub async fn pull(&self) -> AppResult<MergeOutcome> {
        let _io = self.remote_io.lock().await;
        let outcome = self.pull_locked().await?;
        if outcome.changed() {
            if let Err(e) = self.flush_local().await {
                tracing::warn!("Failed to write local pool cache after merge: {}", e);
            }
        }
        Ok(outcome)
    }

    /// Credentials only the remote knows are adopted unless removed here.
    async fn pull_locked(&self) -> AppResult<MergeOutcome> {
        let Some(doc) = self.remote.fetch().await? else {
            return Ok(MergeOutcome::default());
        };
        let removed = self.removed.lock().clone();
        let outcome = {
            let mut pool = self.credentials.lock();
            merge_remote(&mut pool, &doc.pool, |c| !removed.contains(&c.username))
        };
        if outcome.changed() {
            tracing::info!(
                updated = outcome.updated.len(),
                adopted = outcome.adopted.len(),
                "Merged remote document into pool"
            );
        }
        if !outcome.skipped.is_empty() {
            tracing::debug!(
                "Ignored {} remote credential(s) removed locally",
                outcome.skipped.len()
            );
        }
        Ok(outcome)
    }

    /// Merge-before-overwrite, then store the full pool. The local mirror is
    /// flushed first so a final push leaves both copies current.
    pub async fn push_now(&self) -> AppResult<()> {
        let _io = self.remote_io.lock().await;
        if let Err(e) = self.pull_locked().await {
            tracing::warn!("Pre-push merge skipped: {}", e);
        }
        if let Err(e) = self.flush_local().await {
            tracing::warn!("Failed to write local pool cache before push: {}", e);
        }
        let doc = PoolDocument::new(self.snapshot(), now_ms());
        self.remote.store(&doc).await?;
        // A removal that raced this snapshot keeps its tombstone.
        self.removed
            .lock()
            .retain(|name| doc.pool.iter().any(|c| c.username == *name));
        tracing::debug!(
            "Pushed {} credential(s) to {}",
            doc.count,
            self.remote.describe()
        );
        Ok(())
    }
}
