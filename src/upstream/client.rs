use reqwest::{header, Client, RequestBuilder};
use serde_json::Value;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::gateway::{ActionKind, Gateway, HttpReply, WriteAudit};
use crate::models::item::parse_listing;
use crate::models::WorkItem;

/// Typed calls against the resource API, each routed through the gateway.
pub struct ResourceClient {
    gateway: Arc<Gateway>,
    http: Client,
    base_url: String,
}

async fn send(request: RequestBuilder) -> Result<HttpReply, GatewayError> {
    HttpReply::from_response(request.send().await?).await
}

fn authorized(request: RequestBuilder, token: &str, user_agent: &str) -> RequestBuilder {
    request
        .bearer_auth(token)
        .header(header::USER_AGENT, user_agent)
}

impl ResourceClient {
    pub fn new(gateway: Arc<Gateway>, http: Client, base_url: &str) -> Self {
        Self {
            gateway,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    async fn get_listing(
        &self,
        operation: &str,
        path: String,
        query: Vec<(&'static str, String)>,
        credential: Option<&str>,
    ) -> Result<Vec<WorkItem>, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        let http = self.http.clone();
        let payload = self
            .gateway
            .execute(
                operation,
                move |token, ua| send(authorized(http.get(url).query(&query), &token, &ua)),
                credential,
                ActionKind::Read,
            )
            .await?;
        Ok(parse_listing(&payload))
    }

    pub async fn search(
        &self,
        query: &str,
        community: Option<&str>,
        limit: u32,
    ) -> Result<Vec<WorkItem>, GatewayError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("sort", "new".to_string()),
            ("limit", limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        let path = match community.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => {
                params.push(("restrict_sr", "1".to_string()));
                format!("/r/{}/search", c)
            }
            None => "/search".to_string(),
        };
        self.get_listing("search", path, params, None).await
    }

    pub async fn list_community(
        &self,
        community: &str,
        limit: u32,
    ) -> Result<Vec<WorkItem>, GatewayError> {
        self.get_listing(
            "list_community",
            format!("/r/{}/new", community.trim()),
            vec![("limit", limit.to_string()), ("raw_json", "1".to_string())],
            None,
        )
        .await
    }

    /// Unread mail belongs to one identity, so callers may pin the credential.
    pub async fn inbox(
        &self,
        credential: Option<&str>,
        limit: u32,
    ) -> Result<Vec<WorkItem>, GatewayError> {
        self.get_listing(
            "inbox",
            "/message/unread".to_string(),
            vec![("limit", limit.to_string()), ("raw_json", "1".to_string())],
            credential,
        )
        .await
    }

    /// Posts `text` under `parent` (a `t3_`/`t1_`/`t4_` fullname).
    pub async fn reply(
        &self,
        parent: &str,
        text: &str,
        credential: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let url = format!("{}/api/comment", self.base_url);
        let http = self.http.clone();
        let form = vec![
            ("api_type", "json".to_string()),
            ("thing_id", parent.to_string()),
            ("text", text.to_string()),
        ];
        self.gateway
            .execute(
                "reply",
                move |token, ua| send(authorized(http.post(url).form(&form), &token, &ua)),
                credential,
                ActionKind::Write(WriteAudit {
                    content: text.to_string(),
                    destination: parent.to_string(),
                }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::Query,
        http::HeaderMap,
        routing::{get, post},
        Form, Json, Router,
    };
    use std::collections::HashMap;

    fn listing() -> Value {
        serde_json::json!({
            "kind": "Listing",
            "data": {"children": [
                {"kind": "t3", "data": {"id": "abc", "name": "t3_abc", "title": "Need a tool",
                    "selftext": "any ideas?", "author": "op", "subreddit": "rust",
                    "permalink": "/r/rust/abc", "created_utc": 1700000000.0}},
                {"kind": "more", "data": {}}
            ]}
        })
    }

    async fn search_handler(
        headers: HeaderMap,
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Value> {
        assert_eq!(
            headers.get("authorization").and_then(|v| v.to_str().ok()),
            Some("Bearer token-alice")
        );
        assert_eq!(params.get("q").map(String::as_str), Some("cli tools"));
        assert_eq!(params.get("restrict_sr").map(String::as_str), Some("1"));
        Json(listing())
    }

    async fn comment_handler(Form(form): Form<HashMap<String, String>>) -> Json<Value> {
        if form.get("text").map(String::as_str) == Some("spam") {
            let errors = serde_json::json!([["RATELIMIT", "slow down", "ratelimit"]]);
            return Json(serde_json::json!({"json": {"errors": errors}}));
        }
        Json(serde_json::json!({"json": {"errors": [], "data": {"things": []}}}))
    }

    async fn client(dir: &std::path::Path) -> ResourceClient {
        let router = Router::new()
            .route("/r/rust/search", get(search_handler))
            .route("/api/comment", post(comment_handler));
        let base = crate::test_utils::spawn_stub_server(router).await;
        let gateway = crate::test_utils::test_gateway(dir, &["alice"]);
        ResourceClient::new(gateway, Client::new(), &format!("{}/", base))
    }

    #[tokio::test]
    async fn test_search_parses_leads() {
        let dir = crate::test_utils::temp_data_dir("client-search");
        let client = client(&dir).await;
        let items = client.search("cli tools", Some("rust"), 10).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), "t3_abc");
        assert!(matches!(items[0], WorkItem::Lead(ref l) if l.community == "rust"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_reply_in_body_rate_limit_is_rate_limit() {
        let dir = crate::test_utils::temp_data_dir("client-reply");
        let client = client(&dir).await;
        client.reply("t3_abc", "thanks!", None).await.unwrap();
        let err = client.reply("t3_abc", "spam", None).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::RateLimit);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
