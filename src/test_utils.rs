#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(test)]
fn global_env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

#[cfg(test)]
pub(crate) fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    global_env_lock()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
pub(crate) struct ScopedEnvVar {
    key: &'static str,
    original: Option<String>,
}

#[cfg(test)]
impl ScopedEnvVar {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        let original = std::env::var(key).ok();
        std::env::set_var(key, value);
        Self { key, original }
    }

    pub(crate) fn unset(key: &'static str) -> Self {
        let original = std::env::var(key).ok();
        std::env::remove_var(key);
        Self { key, original }
    }
}

#[cfg(test)]
impl Drop for ScopedEnvVar {
    fn drop(&mut self) {
        if let Some(value) = self.original.as_deref() {
            std::env::set_var(self.key, value);
        } else {
            std::env::remove_var(self.key);
        }
    }
}

/// Serves `router` on an ephemeral loopback port and returns its base URL.
#[cfg(test)]
pub(crate) async fn spawn_stub_server(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("stub server address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

#[cfg(test)]
pub(crate) fn temp_data_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("fleetgate-{}-{}", tag, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp data dir");
    dir
}

#[cfg(test)]
pub(crate) struct StaticTokens;

#[cfg(test)]
#[async_trait::async_trait]
impl crate::gateway::TokenProvider for StaticTokens {
    async fn get_token(
        &self,
        credential: &crate::models::Credential,
    ) -> Result<String, crate::error::GatewayError> {
        Ok(format!("token-{}", credential.username))
    }

    fn invalidate(&self, _credential_id: &str) {}
}

/// Gateway over an in-memory remote, zero pacing and one credential per name.
#[cfg(test)]
pub(crate) fn test_gateway(
    dir: &std::path::Path,
    usernames: &[&str],
) -> std::sync::Arc<crate::gateway::Gateway> {
    use crate::gateway::selection::SelectionPolicy;
    use crate::gateway::{CredentialPool, Gateway, HealthMonitor};
    use crate::models::{GatewayConfig, NewCredential, RangeConfig};
    use crate::modules::persistence::content_log::ContentLog;
    use crate::modules::persistence::local_cache::LocalPoolCache;
    use crate::modules::persistence::remote_store::MemoryDocumentStore;
    use std::sync::Arc;

    let pool = Arc::new(CredentialPool::new(
        SelectionPolicy::default(),
        RangeConfig::new(1800, 3600),
        LocalPoolCache::new(dir, 1024 * 1024),
        Arc::new(MemoryDocumentStore::new()),
    ));
    for name in usernames {
        pool.add(NewCredential {
            client_id: format!("{}-client", name),
            client_secret: "secret".to_string(),
            username: name.to_string(),
            password: "pw".to_string(),
        })
        .expect("seed credential");
    }
    let config = GatewayConfig {
        write_jitter_ms: RangeConfig::new(0, 0),
        read_jitter_ms: RangeConfig::new(0, 0),
        ..GatewayConfig::default()
    };
    Arc::new(
        Gateway::new(pool, Arc::new(StaticTokens), Arc::new(HealthMonitor::new()), &config)
            .with_content_log(Arc::new(ContentLog::new(dir))),
    )
}
