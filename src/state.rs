use reqwest::Client;
use std::path::Path;
use std::sync::Arc;

use crate::error::AppResult;
use crate::gateway::selection::SelectionPolicy;
use crate::gateway::{Authenticator, CredentialPool, Gateway, HealthMonitor};
use crate::models::AppConfig;
use crate::modules::persistence::content_log::ContentLog;
use crate::modules::persistence::local_cache::LocalPoolCache;
use crate::modules::persistence::remote_store::build_document_store;
use crate::utils::http::build_client;

/// Shared wiring for the interactive server and the headless job, so both
/// make the same scheduling decisions.
#[derive(Clone)]
pub struct CoreServices {
    pub gateway: Arc<Gateway>,
    pub content_log: Arc<ContentLog>,
    pub http: Client,
}

impl CoreServices {
    pub fn build(config: &AppConfig, data_dir: &Path) -> AppResult<Self> {
        let user_agent = config.gateway.effective_user_agent();
        let http = build_client(config.oauth.request_timeout_secs, &user_agent)?;

        let remote = build_document_store(&config.remote, http.clone());
        let pool = Arc::new(CredentialPool::new(
            SelectionPolicy::from(&config.gateway),
            config.gateway.rate_limit_cooldown_secs,
            LocalPoolCache::new(data_dir, config.cache.max_bytes),
            remote,
        ));
        let tokens = Arc::new(Authenticator::new(
            http.clone(),
            config.oauth.clone(),
            user_agent,
            config.gateway.token_safety_margin_secs,
        ));
        let content_log = Arc::new(ContentLog::new(data_dir));
        let gateway = Arc::new(
            Gateway::new(pool, tokens, Arc::new(HealthMonitor::new()), &config.gateway)
                .with_content_log(content_log.clone()),
        );

        Ok(Self {
            gateway,
            content_log,
            http,
        })
    }
}
