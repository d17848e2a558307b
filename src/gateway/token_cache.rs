use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::Client;

use crate::error::GatewayError;
use crate::models::{Credential, OAuthConfig};
use crate::modules::auth::oauth;
use crate::utils::time::now_ms;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at_ms: i64,
}

/// In-memory only. Tokens never reach disk or the shared document.
#[derive(Default)]
pub struct TokenCache {
    entries: DashMap<String, CachedToken>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_valid(&self, credential_id: &str, now_ms: i64) -> Option<String> {
        let entry = self.entries.get(credential_id)?;
        if now_ms < entry.expires_at_ms {
            Some(entry.token.clone())
        } else {
            None
        }
    }

    /// `expires_at = now + lifetime - margin`.
    pub fn insert(
        &self,
        credential_id: &str,
        token: String,
        lifetime_secs: i64,
        margin_secs: i64,
        now_ms: i64,
    ) {
        let expires_at_ms = now_ms + (lifetime_secs - margin_secs).max(0) * 1000;
        self.entries.insert(
            credential_id.to_string(),
            CachedToken {
                token,
                expires_at_ms,
            },
        );
    }

    pub fn invalidate(&self, credential_id: &str) -> bool {
        self.entries.remove(credential_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get_token(&self, credential: &Credential) -> Result<String, GatewayError>;
    fn invalidate(&self, credential_id: &str);
}

/// Password-grant authenticator backed by [`TokenCache`].
pub struct Authenticator {
    client: Client,
    config: OAuthConfig,
    user_agent: String,
    margin_secs: i64,
    cache: TokenCache,
}

impl Authenticator {
    pub fn new(client: Client, config: OAuthConfig, user_agent: String, margin_secs: i64) -> Self {
        Self {
            client,
            config,
            user_agent,
            margin_secs,
            cache: TokenCache::new(),
        }
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }
}

#[async_trait]
impl TokenProvider for Authenticator {
    async fn get_token(&self, credential: &Credential) -> Result<String, GatewayError> {
        if let Some(token) = self.cache.get_valid(&credential.id, now_ms()) {
            return Ok(token);
        }
        tracing::debug!(username = %credential.username, "No valid cached token, authenticating");
        let response =
            oauth::exchange_password_grant(&self.client, &self.config, credential, &self.user_agent)
                .await?;
        self.cache.insert(
            &credential.id,
            response.access_token.clone(),
            response.expires_in,
            self.margin_secs,
            now_ms(),
        );
        Ok(response.access_token)
    }

    fn invalidate(&self, credential_id: &str) {
        if self.cache.invalidate(credential_id) {
            tracing::debug!(credential_id, "Cached token invalidated");
        }
    }
}
