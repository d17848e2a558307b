use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::error::{AppError, ErrorKind};
use crate::gateway::ImportReport;
use crate::models::{Credential, CredentialStatus, NewCredential};

use super::AdminState;

#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    error: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: impl ToString) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

pub(crate) fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::AuthFail => StatusCode::UNAUTHORIZED,
        ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::NetworkError | ErrorKind::ApiError => StatusCode::BAD_GATEWAY,
    }
}

fn status_for_app_error(err: &AppError) -> StatusCode {
    match err {
        AppError::Gateway(e) => status_for_kind(e.kind()),
        AppError::Network(_) | AppError::Remote(_) | AppError::Generator(_) => {
            StatusCode::BAD_GATEWAY
        }
        AppError::Credential(_) | AppError::Config(_) => StatusCode::BAD_REQUEST,
        AppError::Io(_) | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Operator-facing view; secrets never leave the process.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CredentialView {
    id: String,
    username: String,
    client_id: String,
    status: CredentialStatus,
    usage_count: u64,
    daily_usage: u32,
    day_start_timestamp: i64,
    last_used: i64,
    cooldown_until: i64,
    created_at: i64,
}

impl From<&Credential> for CredentialView {
    fn from(c: &Credential) -> Self {
        Self {
            id: c.id.clone(),
            username: c.username.clone(),
            client_id: c.masked_client_id(),
            status: c.status,
            usage_count: c.usage_count,
            daily_usage: c.daily_usage,
            day_start_timestamp: c.day_start_timestamp,
            last_used: c.last_used,
            cooldown_until: c.cooldown_until,
            created_at: c.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CredentialListResponse {
    credentials: Vec<CredentialView>,
    total: usize,
    ready: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncResponse {
    updated: Vec<String>,
    adopted: Vec<String>,
    skipped: Vec<String>,
}

pub(crate) async fn admin_health(State(state): State<AdminState>) -> impl IntoResponse {
    Json(state.gateway.health())
}

pub(crate) async fn admin_list_credentials(
    State(state): State<AdminState>,
) -> impl IntoResponse {
    let credentials = state.gateway.pool().list();
    let ready = credentials
        .iter()
        .filter(|c| c.status == CredentialStatus::Ready)
        .count();
    Json(CredentialListResponse {
        total: credentials.len(),
        ready,
        credentials: credentials.iter().map(CredentialView::from).collect(),
    })
}

pub(crate) async fn admin_add_credential(
    State(state): State<AdminState>,
    Json(fields): Json<NewCredential>,
) -> Result<impl IntoResponse, HandlerError> {
    match state.gateway.pool().add(fields) {
        Ok(credential) => Ok((StatusCode::CREATED, Json(CredentialView::from(&credential)))),
        Err(AppError::Credential(msg)) if msg.contains("already exists") => {
            Err(error_response(StatusCode::CONFLICT, msg))
        }
        Err(e) => Err(error_response(status_for_app_error(&e), e)),
    }
}

pub(crate) async fn admin_import_credentials(
    State(state): State<AdminState>,
    body: String,
) -> Result<Json<ImportReport>, HandlerError> {
    if body.trim().is_empty() {
        return Err(error_response(StatusCode::BAD_REQUEST, "import body is empty"));
    }
    Ok(Json(state.gateway.pool().bulk_import(&body)))
}

pub(crate) async fn admin_delete_credential(
    State(state): State<AdminState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, HandlerError> {
    state
        .gateway
        .pool()
        .remove(&key)
        .map(|removed| Json(CredentialView::from(&removed)))
        .map_err(|e| error_response(StatusCode::NOT_FOUND, e))
}

pub(crate) async fn admin_sync_pool(
    State(state): State<AdminState>,
) -> Result<Json<SyncResponse>, HandlerError> {
    match state.gateway.pull_remote().await {
        Ok(outcome) => Ok(Json(SyncResponse {
            updated: outcome.updated,
            adopted: outcome.adopted,
            skipped: outcome.skipped,
        })),
        Err(e) => {
            tracing::error!("Manual pool sync failed: {}", e);
            Err(error_response(status_for_app_error(&e), e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExhaustionCause, GatewayError};

    #[test]
    fn test_classification_maps_to_http_status() {
        let err = AppError::Gateway(GatewayError::exhausted(ExhaustionCause::DailyCaps));
        assert_eq!(status_for_app_error(&err), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for_kind(ErrorKind::RateLimit), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status_for_app_error(&AppError::Remote("down".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }
}
