mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{AppError, AppResult};
use crate::gateway::Gateway;
use crate::models::AdminConfig;

const ADMIN_PATH_HEALTH: &str = "/health";
const ADMIN_PATH_CREDENTIALS: &str = "/credentials";
const ADMIN_PATH_CREDENTIALS_IMPORT: &str = "/credentials/import";
const ADMIN_PATH_CREDENTIAL: &str = "/credentials/:key";
const ADMIN_PATH_POOL_SYNC: &str = "/pool/sync";

#[derive(Clone)]
pub struct AdminState {
    pub gateway: Arc<Gateway>,
}

pub fn build_admin_router(state: AdminState) -> Router {
    let api = Router::new()
        .route(ADMIN_PATH_HEALTH, get(handlers::admin_health))
        .route(
            ADMIN_PATH_CREDENTIALS,
            get(handlers::admin_list_credentials).post(handlers::admin_add_credential),
        )
        .route(
            ADMIN_PATH_CREDENTIALS_IMPORT,
            post(handlers::admin_import_credentials),
        )
        .route(
            ADMIN_PATH_CREDENTIAL,
            delete(handlers::admin_delete_credential),
        )
        .route(ADMIN_PATH_POOL_SYNC, post(handlers::admin_sync_pool));

    Router::new()
        .nest("/api", api)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serves the admin API until `cancel` fires.
pub async fn serve_admin(
    state: AdminState,
    config: &AdminConfig,
    cancel: CancellationToken,
) -> AppResult<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid admin bind address: {}", e)))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Admin API listening on http://{}", addr);
    axum::serve(listener, build_admin_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    tracing::info!("Admin API stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct Fixture {
        app: Router,
        state: AdminState,
        dir: std::path::PathBuf,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn fixture(usernames: &[&str]) -> Fixture {
        let dir = crate::test_utils::temp_data_dir("admin");
        let state = AdminState {
            gateway: crate::test_utils::test_gateway(&dir, usernames),
        };
        Fixture {
            app: build_admin_router(state.clone()),
            state,
            dir,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_active_nodes() {
        let f = fixture(&["alice", "bob"]);
        let response = f
            .app
            .clone()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["activeNodes"], 2);
        assert_eq!(body["errorRate"], 0.0);
    }

    #[tokio::test]
    async fn test_list_masks_secrets() {
        let f = fixture(&["alice"]);
        let response = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/credentials")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["credentials"][0]["clientId"], "alic***");
        assert!(body["credentials"][0].get("password").is_none());
        assert!(body["credentials"][0].get("clientSecret").is_none());
    }

    #[tokio::test]
    async fn test_add_then_duplicate_conflicts() {
        let f = fixture(&[]);
        let payload = r#"{"clientId":"cid-1","clientSecret":"s","username":"carol","password":"p"}"#;
        let request = || {
            Request::builder()
                .method("POST")
                .uri("/api/credentials")
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap()
        };
        let created = f.app.clone().oneshot(request()).await.unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        let conflict = f.app.clone().oneshot(request()).await.unwrap();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        let body = body_json(conflict).await;
        assert!(body["error"].as_str().unwrap().contains("carol"));
    }

    #[tokio::test]
    async fn test_import_and_delete() {
        let f = fixture(&[]);
        let response = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/credentials/import")
                    .body(Body::from("c1:s1:dave:p\nbad\n"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["added"], serde_json::json!(["dave"]));
        assert_eq!(body["rejected"][0]["line"], 2);

        let deleted = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/credentials/dave")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(deleted.status(), StatusCode::OK);
        assert!(f.state.gateway.pool().is_empty());

        let missing = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/api/credentials/dave")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sync_against_memory_store() {
        let f = fixture(&["alice"]);
        let response = f
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/pool/sync")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(f.state.gateway.health().last_sync.is_some());
    }
}
