use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{PoolDocument, RemoteConfig};

/// The single shared record both the interactive process and the headless
/// job read and fully overwrite.
#[async_trait]
pub trait PoolDocumentStore: Send + Sync {
    async fn fetch(&self) -> AppResult<Option<PoolDocument>>;
    async fn store(&self, doc: &PoolDocument) -> AppResult<()>;
    fn describe(&self) -> String;
}

/// JSON document addressed by URL: GET to read, PUT to overwrite.
pub struct HttpDocumentStore {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(client: Client, url: String, api_key: Option<String>) -> Self {
        Self {
            client,
            url,
            api_key,
        }
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => builder.bearer_auth(key),
            _ => builder,
        }
    }
}

#[async_trait]
impl PoolDocumentStore for HttpDocumentStore {
    async fn fetch(&self) -> AppResult<Option<PoolDocument>> {
        let response = self.authorize(self.client.get(&self.url)).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote(format!(
                "fetch returned {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }
        let value: serde_json::Value = response.json().await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    async fn store(&self, doc: &PoolDocument) -> AppResult<()> {
        let response = self
            .authorize(self.client.put(&self.url))
            .json(doc)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AppError::Remote(format!(
                "store returned {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )))
        }
    }

    fn describe(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(u) => format!("{}://{}{}", u.scheme(), u.host_str().unwrap_or(""), u.path()),
            Err(_) => "remote document".to_string(),
        }
    }
}

/// Process-local stand-in used when no shared document is configured.
#[derive(Default)]
pub struct MemoryDocumentStore {
    doc: Mutex<Option<PoolDocument>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: PoolDocument) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
        }
    }

    pub fn current(&self) -> Option<PoolDocument> {
        self.doc.lock().clone()
    }
}

#[async_trait]
impl PoolDocumentStore for MemoryDocumentStore {
    async fn fetch(&self) -> AppResult<Option<PoolDocument>> {
        Ok(self.doc.lock().clone())
    }

    async fn store(&self, doc: &PoolDocument) -> AppResult<()> {
        *self.doc.lock() = Some(doc.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory document".to_string()
    }
}

pub fn build_document_store(config: &RemoteConfig, client: Client) -> Arc<dyn PoolDocumentStore> {
    match config.document_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Arc::new(HttpDocumentStore::new(
            client,
            url.to_string(),
            config.api_key.clone(),
        )),
        _ => {
            tracing::warn!("No shared pool document configured; pool state stays process-local");
            Arc::new(MemoryDocumentStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, routing::get, Json, Router};
    use std::sync::Arc;

    type Shared = Arc<Mutex<Option<serde_json::Value>>>;

    async fn read_doc(State(doc): State<Shared>) -> Json<serde_json::Value> {
        Json(doc.lock().clone().unwrap_or(serde_json::Value::Null))
    }

    async fn write_doc(
        State(doc): State<Shared>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> axum::http::StatusCode {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer k1") {
            return axum::http::StatusCode::UNAUTHORIZED;
        }
        *doc.lock() = Some(body);
        axum::http::StatusCode::NO_CONTENT
    }

    #[tokio::test]
    async fn test_http_store_reads_back_what_it_wrote() {
        let shared: Shared = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route("/pool", get(read_doc).put(write_doc))
            .with_state(shared.clone());
        let base = crate::test_utils::spawn_stub_server(router).await;

        let store = HttpDocumentStore::new(
            Client::new(),
            format!("{}/pool", base),
            Some("k1".to_string()),
        );
        assert!(store.fetch().await.unwrap().is_none());

        let doc = PoolDocument::new(Vec::new(), 99);
        store.store(&doc).await.unwrap();
        assert_eq!(store.fetch().await.unwrap(), Some(doc));
        assert!(store.describe().ends_with("/pool"));
    }

    #[tokio::test]
    async fn test_http_store_surfaces_rejected_writes() {
        let shared: Shared = Arc::new(Mutex::new(None));
        let router = Router::new()
            .route("/pool", get(read_doc).put(write_doc))
            .with_state(shared);
        let base = crate::test_utils::spawn_stub_server(router).await;

        let store = HttpDocumentStore::new(Client::new(), format!("{}/pool", base), None);
        let err = store.store(&PoolDocument::new(Vec::new(), 1)).await.unwrap_err();
        assert!(matches!(err, AppError::Remote(ref m) if m.contains("401")));
    }

    #[tokio::test]
    async fn test_unconfigured_remote_falls_back_to_memory() {
        let store = build_document_store(&RemoteConfig::default(), Client::new());
        assert_eq!(store.describe(), "in-memory document");
        store.store(&PoolDocument::new(Vec::new(), 5)).await.unwrap();
        assert_eq!(store.fetch().await.unwrap().unwrap().updated_at, 5);
    }
}
