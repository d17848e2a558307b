use base64::Engine as _;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::GatewayError;
use crate::models::{Credential, OAuthConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

fn basic_auth_header(client_id: &str, client_secret: &str) -> String {
    let raw = format!("{}:{}", client_id, client_secret);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(raw)
    )
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Delay before attempt `attempt + 1`: `base * 2^(attempt - 1)`.
pub(crate) fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    Duration::from_millis(base_ms.saturating_mul(1u64 << exp))
}

enum AttemptOutcome {
    Done(Result<TokenResponse, GatewayError>),
    Retry(GatewayError),
}

async fn attempt_exchange(
    client: &Client,
    config: &OAuthConfig,
    credential: &Credential,
    user_agent: &str,
) -> AttemptOutcome {
    let params = [
        ("grant_type", "password"),
        ("username", credential.username.as_str()),
        ("password", credential.password.as_str()),
    ];
    let response = match client
        .post(&config.token_url)
        .header(
            reqwest::header::AUTHORIZATION,
            basic_auth_header(&credential.client_id, &credential.client_secret),
        )
        .header(reqwest::header::USER_AGENT, user_agent)
        .form(&params)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => return AttemptOutcome::Retry(GatewayError::from(e)),
    };

    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return AttemptOutcome::Done(Err(GatewayError::AuthFail {
            username: credential.username.clone(),
            message: "token endpoint rejected client credentials".to_string(),
        }));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return AttemptOutcome::Done(Err(GatewayError::RateLimit {
            username: credential.username.clone(),
            cooldown_until: 0,
        }));
    }
    if is_retryable_status(status) {
        return AttemptOutcome::Retry(GatewayError::Api {
            status: status.as_u16(),
            message: "token endpoint unavailable".to_string(),
        });
    }

    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => return AttemptOutcome::Retry(GatewayError::from(e)),
    };

    // The endpoint reports a bad login as a 200 or 400 carrying an `error` field.
    if let Ok(err) = serde_json::from_str::<TokenErrorBody>(&body) {
        let message = err
            .error_description
            .map(|d| format!("{}: {}", err.error, d))
            .unwrap_or(err.error);
        return AttemptOutcome::Done(Err(GatewayError::AuthFail {
            username: credential.username.clone(),
            message,
        }));
    }

    if !status.is_success() {
        return AttemptOutcome::Done(Err(GatewayError::Api {
            status: status.as_u16(),
            message: body.chars().take(200).collect(),
        }));
    }

    AttemptOutcome::Done(
        serde_json::from_str::<TokenResponse>(&body).map_err(|e| GatewayError::Api {
            status: status.as_u16(),
            message: format!("token response parsing failed: {}", e),
        }),
    )
}

/// Resource-owner password exchange. Only gateway-class 5xx and transport
/// failures are retried.
pub async fn exchange_password_grant(
    client: &Client,
    config: &OAuthConfig,
    credential: &Credential,
    user_agent: &str,
) -> Result<TokenResponse, GatewayError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_exchange(client, config, credential, user_agent).await {
            AttemptOutcome::Done(result) => {
                if let Ok(token) = &result {
                    tracing::info!(
                        username = %credential.username,
                        client_id = %credential.masked_client_id(),
                        expires_in = token.expires_in,
                        "Access token obtained"
                    );
                }
                return result;
            }
            AttemptOutcome::Retry(err) if attempt < max_attempts => {
                let delay = backoff_delay(config.backoff_base_ms, attempt);
                tracing::warn!(
                    username = %credential.username,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Token exchange failed ({}), retrying",
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            AttemptOutcome::Retry(err) => {
                tracing::error!(
                    username = %credential.username,
                    attempts = attempt,
                    "Token exchange gave up: {}",
                    err
                );
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCredential;
    use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn credential() -> Credential {
        Credential::new(
            NewCredential {
                client_id: "cid".to_string(),
                client_secret: "csecret".to_string(),
                username: "alice".to_string(),
                password: "pw".to_string(),
            },
            0,
        )
    }

    fn config(base: &str) -> OAuthConfig {
        OAuthConfig {
            token_url: format!("{}/token", base),
            backoff_base_ms: 1,
            ..OAuthConfig::default()
        }
    }

    #[derive(Clone)]
    struct Stub {
        calls: Arc<AtomicU32>,
        failures_before_success: u32,
        failure_status: u16,
    }

    async fn token_endpoint(
        State(stub): State<Stub>,
        headers: HeaderMap,
        body: String,
    ) -> (axum::http::StatusCode, Json<serde_json::Value>) {
        let n = stub.calls.fetch_add(1, Ordering::SeqCst);
        if n < stub.failures_before_success {
            return (
                axum::http::StatusCode::from_u16(stub.failure_status).unwrap(),
                Json(serde_json::json!({})),
            );
        }
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert_eq!(auth, basic_auth_header("cid", "csecret"));
        assert!(body.contains("grant_type=password"));
        assert!(body.contains("username=alice"));
        (
            axum::http::StatusCode::OK,
            Json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in": 3600,
                "token_type": "bearer",
                "scope": "*"
            })),
        )
    }

    async fn serve(stub: Stub) -> String {
        let router = Router::new()
            .route("/token", post(token_endpoint))
            .with_state(stub);
        crate::test_utils::spawn_stub_server(router).await
    }

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 3), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_retries_gateway_errors_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let base = serve(Stub {
            calls: calls.clone(),
            failures_before_success: 2,
            failure_status: 503,
        })
        .await;
        let token = exchange_password_grant(&Client::new(), &config(&base), &credential(), "ua")
            .await
            .unwrap();
        assert_eq!(token.access_token, "tok-1");
        assert_eq!(token.expires_in, 3600);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let base = serve(Stub {
            calls: calls.clone(),
            failures_before_success: 10,
            failure_status: 502,
        })
        .await;
        let err = exchange_password_grant(&Client::new(), &config(&base), &credential(), "ua")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Api {
                status: 502,
                message: "token endpoint unavailable".to_string()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let base = serve(Stub {
            calls: calls.clone(),
            failures_before_success: 10,
            failure_status: 401,
        })
        .await;
        let err = exchange_password_grant(&Client::new(), &config(&base), &credential(), "ua")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::AuthFail);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_grant_body_is_auth_failure() {
        async fn invalid_grant() -> Json<serde_json::Value> {
            Json(serde_json::json!({"error": "invalid_grant"}))
        }
        let router = Router::new().route("/token", post(invalid_grant));
        let base = crate::test_utils::spawn_stub_server(router).await;
        let err = exchange_password_grant(&Client::new(), &config(&base), &credential(), "ua")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::AuthFail { ref message, .. } if message == "invalid_grant"
        ));
    }
}
