use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::constants::RATE_LIMIT_REMAINING_HEADER;
use crate::error::{AppResult, GatewayError};
use crate::models::{Credential, GatewayConfig, RangeConfig};
use crate::modules::persistence::content_log::{ContentLog, ContentLogEntry};
use crate::utils::time::now_ms;

use super::health::{HealthMonitor, SystemHealth};
use super::pacing::jitter_delay;
use super::reconcile::MergeOutcome;
use super::store::CredentialPool;
use super::token_cache::TokenProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAudit {
    pub content: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    Read,
    Write(WriteAudit),
}

impl ActionKind {
    pub fn is_write(&self) -> bool {
        matches!(self, ActionKind::Write(_))
    }
}

/// Transport-neutral view of one upstream response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub rate_limit_remaining: Option<String>,
    pub body: String,
}

impl HttpReply {
    pub async fn from_response(response: reqwest::Response) -> Result<Self, GatewayError> {
        let status = response.status().as_u16();
        let rate_limit_remaining = response
            .headers()
            .get(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        Ok(Self {
            status,
            rate_limit_remaining,
            body,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseClass {
    Success,
    RateLimited,
    AuthRejected,
    Failed,
}

fn classify(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        429 => ResponseClass::RateLimited,
        401 | 403 => ResponseClass::AuthRejected,
        _ => ResponseClass::Failed,
    }
}

/// Single choke point for every outbound call made with a pool credential.
pub struct Gateway {
    pool: Arc<CredentialPool>,
    tokens: Arc<dyn TokenProvider>,
    health: Arc<HealthMonitor>,
    content_log: Option<Arc<ContentLog>>,
    user_agent: String,
    write_jitter_ms: RangeConfig,
    read_jitter_ms: RangeConfig,
}

impl Gateway {
    pub fn new(
        pool: Arc<CredentialPool>,
        tokens: Arc<dyn TokenProvider>,
        health: Arc<HealthMonitor>,
        config: &GatewayConfig,
    ) -> Self {
        Self {
            pool,
            tokens,
            health,
            content_log: None,
            user_agent: config.effective_user_agent(),
            write_jitter_ms: config.write_jitter_ms,
            read_jitter_ms: config.read_jitter_ms,
        }
    }

    pub fn with_content_log(mut self, log: Arc<ContentLog>) -> Self {
        self.content_log = Some(log);
        self
    }

    pub fn pool(&self) -> &Arc<CredentialPool> {
        &self.pool
    }

    pub fn health(&self) -> SystemHealth {
        self.health.snapshot(self.pool.active_count())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn pull_remote(&self) -> AppResult<MergeOutcome> {
        let outcome = self.pool.pull().await?;
        self.health.mark_synced(now_ms());
        Ok(outcome)
    }

    pub async fn push_remote(&self) -> AppResult<()> {
        self.pool.push_now().await?;
        self.health.mark_synced(now_ms());
        Ok(())
    }

    fn resolve(&self, explicit: Option<&str>) -> Result<Credential, GatewayError> {
        match explicit {
            Some(id) => self.pool.use_explicit(id),
            None => self.pool.select().map(|s| s.credential),
        }
    }

    fn fail(&self, err: GatewayError) -> GatewayError {
        self.health.record_error();
        err
    }

    fn rate_limited(&self, credential: &Credential) -> GatewayError {
        let cooldown_until = self.pool.penalize(&credential.id).unwrap_or_default();
        self.fail(GatewayError::RateLimit {
            username: credential.username.clone(),
            cooldown_until,
        })
    }

    /// Resolves a credential, paces, authenticates and runs `call` with
    /// `(access_token, user_agent)`.
    pub async fn execute<F, Fut>(
        &self,
        operation: &str,
        call: F,
        explicit_credential: Option<&str>,
        action: ActionKind,
    ) -> Result<Value, GatewayError>
    where
        F: FnOnce(String, String) -> Fut,
        Fut: Future<Output = Result<HttpReply, GatewayError>>,
    {
        let credential = self.resolve(explicit_credential).map_err(|e| self.fail(e))?;
        let span_user = credential.username.clone();

        let range = if action.is_write() {
            &self.write_jitter_ms
        } else {
            &self.read_jitter_ms
        };
        let delay = jitter_delay(range);
        tracing::debug!(
            operation,
            username = %span_user,
            delay_ms = delay.as_millis() as u64,
            "Pacing before upstream call"
        );
        tokio::time::sleep(delay).await;

        let token = match self.tokens.get_token(&credential).await {
            Ok(token) => token,
            Err(GatewayError::RateLimit { .. }) => return Err(self.rate_limited(&credential)),
            Err(err @ GatewayError::AuthFail { .. }) => {
                self.pool.penalize(&credential.id);
                return Err(self.fail(err));
            }
            Err(err) => return Err(self.fail(err)),
        };

        let started = Instant::now();
        let result = call(token, self.user_agent.clone()).await;
        self.health
            .record_latency(started.elapsed().as_secs_f64() * 1000.0);

        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(operation, username = %span_user, "Upstream call failed: {}", err);
                return Err(self.fail(err));
            }
        };
        self.health
            .record_rate_limit_header(reply.rate_limit_remaining.as_deref());

        match classify(reply.status) {
            ResponseClass::RateLimited => {
                tracing::warn!(operation, username = %span_user, "Upstream rate limit hit");
                Err(self.rate_limited(&credential))
            }
            ResponseClass::AuthRejected => {
                tracing::warn!(
                    operation,
                    username = %span_user,
                    status = reply.status,
                    "Upstream rejected credentials"
                );
                self.tokens.invalidate(&credential.id);
                self.pool.penalize(&credential.id);
                Err(self.fail(GatewayError::AuthFail {
                    username: credential.username.clone(),
                    message: format!("upstream returned {}", reply.status),
                }))
            }
            ResponseClass::Failed => Err(self.fail(GatewayError::Api {
                status: reply.status,
                message: reply.body.chars().take(200).collect(),
            })),
            ResponseClass::Success => {
                let value = if reply.body.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&reply.body).map_err(|e| {
                        self.fail(GatewayError::Api {
                            status: reply.status,
                            message: format!("invalid JSON body: {}", e),
                        })
                    })?
                };
                if let Some(errors) = in_body_errors(&value) {
                    if errors.iter().any(is_rate_limit_entry) {
                        tracing::warn!(
                            operation,
                            username = %span_user,
                            "Upstream rate limit reported in body"
                        );
                        return Err(self.rate_limited(&credential));
                    }
                    return Err(self.fail(GatewayError::Api {
                        status: reply.status,
                        message: serde_json::to_string(errors).unwrap_or_default(),
                    }));
                }
                self.pool.mark_success(&credential.id);
                if let ActionKind::Write(audit) = &action {
                    self.record_write(operation, audit, &credential).await;
                }
                tracing::info!(operation, username = %span_user, "Upstream call succeeded");
                Ok(value)
            }
        }
    }

    async fn record_write(&self, operation: &str, audit: &WriteAudit, credential: &Credential) {
        let Some(log) = self.content_log.as_ref() else {
            return;
        };
        let entry = ContentLogEntry::new(
            operation,
            &audit.destination,
            &audit.content,
            &credential.username,
            now_ms(),
        );
        if let Err(e) = log.append(&entry).await {
            tracing::warn!("Failed to append content log entry: {}", e);
        }
    }
}

/// Validation failures arrive inside a 2xx body as `json.errors`.
fn in_body_errors(value: &Value) -> Option<&Vec<Value>> {
    value
        .get("json")
        .and_then(|j| j.get("errors"))
        .and_then(|e| e.as_array())
        .filter(|list| !list.is_empty())
}

/// Entries look like `["RATELIMIT", "message", "field"]`.
fn is_rate_limit_entry(entry: &Value) -> bool {
    entry.get(0).and_then(|code| code.as_str()) == Some("RATELIMIT")
}
