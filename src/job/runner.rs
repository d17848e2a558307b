use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, ErrorKind};
use crate::gateway::LoadSource;
use crate::models::{AppConfig, CampaignConfig, WorkItem};
use crate::modules::generator::{build_prompt, ContentGenerator};
use crate::modules::persistence::content_log::ContentLog;
use crate::state::CoreServices;
use crate::upstream::ResourceClient;
use crate::utils::http::build_client;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("missing required setting {0}")]
    MissingSecret(&'static str),

    #[error("credential pool is empty, nothing to run with")]
    EmptyPool,

    #[error("setup failed: {0}")]
    Setup(#[from] AppError),
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub processed: usize,
    pub posted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub inbox_items: usize,
    pub cancelled: bool,
    pub pool_exhausted: bool,
}

struct JobContext<'a> {
    client: ResourceClient,
    generator: ContentGenerator,
    content_log: &'a ContentLog,
    config: &'a AppConfig,
}

/// Unattended run over every configured campaign. Item-level failures are
/// counted and skipped; only setup problems return an error.
pub async fn run_job(
    config: &AppConfig,
    data_dir: &Path,
    cancel: CancellationToken,
) -> Result<JobSummary, JobError> {
    if config.remote.document_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
        return Err(JobError::MissingSecret("FLEETGATE_REMOTE_URL"));
    }
    let services = CoreServices::build(config, data_dir)?;
    let generator_http = build_client(
        config.generator.timeout_secs,
        &config.gateway.effective_user_agent(),
    )?;
    let generator = ContentGenerator::from_config(&config.generator, generator_http)
        .ok_or(JobError::MissingSecret("FLEETGATE_GENERATOR_URL"))?;

    let source = services.gateway.pool().load().await?;
    if source == LoadSource::Empty || services.gateway.pool().is_empty() {
        return Err(JobError::EmptyPool);
    }
    tracing::info!(
        credentials = services.gateway.pool().len(),
        campaigns = config.job.campaigns.len(),
        "Headless job starting"
    );

    let ctx = JobContext {
        client: ResourceClient::new(
            services.gateway.clone(),
            services.http.clone(),
            &config.oauth.api_base_url,
        ),
        generator,
        content_log: &services.content_log,
        config,
    };

    let mut summary = JobSummary::default();
    for campaign in &config.job.campaigns {
        if cancel.is_cancelled() || summary.pool_exhausted {
            break;
        }
        run_campaign(&ctx, campaign, &cancel, &mut summary).await;
    }
    if config.job.check_inbox && !cancel.is_cancelled() && !summary.pool_exhausted {
        check_inbox(&ctx, &mut summary).await;
    }
    summary.cancelled = cancel.is_cancelled();

    if let Err(e) = services.gateway.push_remote().await {
        tracing::error!("Failed to push pool state at job end: {}", e);
    }
    tracing::info!(
        processed = summary.processed,
        posted = summary.posted,
        skipped = summary.skipped,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "Headless job finished"
    );
    Ok(summary)
}

fn note_failure(summary: &mut JobSummary, context: &str, err: &crate::error::GatewayError) {
    summary.failed += 1;
    if err.kind() == ErrorKind::PoolExhausted {
        summary.pool_exhausted = true;
        tracing::warn!("{}: {}, stopping run", context, err);
    } else {
        tracing::warn!("{} failed [{}]: {}", context, err.kind(), err);
    }
}

async fn run_campaign(
    ctx: &JobContext<'_>,
    campaign: &CampaignConfig,
    cancel: &CancellationToken,
    summary: &mut JobSummary,
) {
    tracing::info!(campaign = %campaign.name, "Searching leads");
    let leads = match ctx
        .client
        .search(
            &campaign.query,
            campaign.community.as_deref(),
            ctx.config.job.search_limit,
        )
        .await
    {
        Ok(items) => items,
        Err(e) => {
            note_failure(summary, &format!("search for {}", campaign.name), &e);
            return;
        }
    };

    let mut posted_here = 0u32;
    for item in leads.iter().filter(|i| matches!(i, WorkItem::Lead(_))) {
        if cancel.is_cancelled() {
            tracing::info!(campaign = %campaign.name, "Cancelled, returning partial results");
            return;
        }
        if posted_here >= campaign.max_replies || summary.pool_exhausted {
            break;
        }
        summary.processed += 1;

        match ctx.content_log.contains_destination(item.id()).await {
            Ok(true) => {
                summary.skipped += 1;
                tracing::debug!(target_id = item.id(), "Already replied, skipping");
                continue;
            }
            Ok(false) => {}
            Err(e) => tracing::warn!("Content log lookup failed, continuing: {}", e),
        }

        let prompt = build_prompt(item, &campaign.name);
        let text = match ctx
            .generator
            .generate(&prompt, campaign.tone.as_deref())
            .await
        {
            Ok(text) => text,
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(target_id = item.id(), "Generation failed: {}", e);
                continue;
            }
        };

        match ctx.client.reply(item.id(), &text, None).await {
            Ok(_) => {
                summary.posted += 1;
                posted_here += 1;
                tracing::info!(campaign = %campaign.name, target_id = item.id(), "Reply posted");
            }
            Err(e) => note_failure(summary, &format!("reply to {}", item.id()), &e),
        }
    }
}

async fn check_inbox(ctx: &JobContext<'_>, summary: &mut JobSummary) {
    match ctx.client.inbox(None, ctx.config.job.search_limit).await {
        Ok(items) => {
            summary.inbox_items = items.len();
            for item in &items {
                tracing::info!(from = item.author(), item_id = item.id(), "Unread inbox item");
            }
        }
        Err(e) => note_failure(summary, "inbox check", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Credential, NewCredential, PoolDocument, RangeConfig};
    use axum::{
        extract::State,
        routing::{get, post},
        Form, Json, Router,
    };
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Upstream {
        doc: Arc<Mutex<Option<Value>>>,
        comments: Arc<Mutex<Vec<HashMap<String, String>>>>,
    }

    async fn get_doc(State(s): State<Upstream>) -> Json<Value> {
        Json(s.doc.lock().clone().unwrap_or(Value::Null))
    }

    async fn put_doc(State(s): State<Upstream>, Json(body): Json<Value>) -> Json<Value> {
        *s.doc.lock() = Some(body);
        Json(json!({"ok": true}))
    }

    async fn token() -> Json<Value> {
        Json(json!({"access_token": "tok", "expires_in": 3600, "token_type": "bearer"}))
    }

    async fn search() -> Json<Value> {
        let lead = |id: &str| {
            json!({"kind": "t3", "data": {"name": id, "title": "looking for a tool",
                "selftext": "", "author": "op", "subreddit": "rust"}})
        };
        Json(json!({"data": {"children": [lead("t3_a"), lead("t3_b"), lead("t3_c")]}}))
    }

    async fn comment(
        State(s): State<Upstream>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Json<Value> {
        s.comments.lock().push(form);
        Json(json!({"json": {"errors": []}}))
    }

    async fn generate() -> Json<Value> {
        Json(json!({"text": "Have you tried fleetgate?"}))
    }

    async fn inbox() -> Json<Value> {
        Json(json!({"data": {"children": [
            {"kind": "t4", "data": {"name": "t4_m", "author": "friend", "body": "hi"}}
        ]}}))
    }

    fn seed_pool(upstream: &Upstream, names: &[&str]) {
        let pool: Vec<Credential> = names
            .iter()
            .map(|n| {
                Credential::new(
                    NewCredential {
                        client_id: format!("{}-cid", n),
                        client_secret: "s".to_string(),
                        username: n.to_string(),
                        password: "p".to_string(),
                    },
                    crate::utils::time::now_ms(),
                )
            })
            .collect();
        let doc = PoolDocument::new(pool, 0);
        *upstream.doc.lock() = Some(serde_json::to_value(doc).unwrap());
    }

    async fn setup(names: &[&str]) -> (AppConfig, Upstream, std::path::PathBuf) {
        let upstream = Upstream::default();
        seed_pool(&upstream, names);
        let router = Router::new()
            .route("/doc", get(get_doc).put(put_doc))
            .route("/token", post(token))
            .route("/r/rust/search", get(search))
            .route("/message/unread", get(inbox))
            .route("/api/comment", post(comment))
            .route("/generate", post(generate))
            .with_state(upstream.clone());
        let base = crate::test_utils::spawn_stub_server(router).await;

        let mut config = AppConfig::default();
        config.remote.document_url = Some(format!("{}/doc", base));
        config.oauth.token_url = format!("{}/token", base);
        config.oauth.api_base_url = base.clone();
        config.generator.endpoint = Some(format!("{}/generate", base));
        config.gateway.write_jitter_ms = RangeConfig::new(0, 0);
        config.gateway.read_jitter_ms = RangeConfig::new(0, 0);
        config.job.check_inbox = true;
        config.job.campaigns.push(CampaignConfig {
            name: "tools".to_string(),
            query: "tool".to_string(),
            community: Some("rust".to_string()),
            tone: None,
            max_replies: 2,
        });
        (config, upstream, crate::test_utils::temp_data_dir("job"))
    }

    #[tokio::test]
    async fn test_job_posts_up_to_cap_and_pushes_usage() {
        let (config, upstream, dir) = setup(&["alice", "bob"]).await;
        let summary = run_job(&config, &dir, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(summary.posted, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.inbox_items, 1);
        assert!(!summary.cancelled);
        assert_eq!(upstream.comments.lock().len(), 2);
        assert_eq!(upstream.comments.lock()[0]["thing_id"], "t3_a");

        let doc: PoolDocument =
            serde_json::from_value(upstream.doc.lock().clone().unwrap()).unwrap();
        let total: u32 = doc.pool.iter().map(|c| c.daily_usage).sum();
        // One search, two replies, one inbox read.
        assert_eq!(total, 4);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_second_run_skips_already_answered_leads() {
        let (config, upstream, dir) = setup(&["alice"]).await;
        run_job(&config, &dir, CancellationToken::new()).await.unwrap();
        let second = run_job(&config, &dir, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.posted, 1);
        assert_eq!(upstream.comments.lock().len(), 3);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_cancelled_job_returns_partial_summary() {
        let (config, upstream, dir) = setup(&["alice"]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = run_job(&config, &dir, cancel).await.unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.posted, 0);
        assert!(upstream.comments.lock().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_setup_failures() {
        let (mut config, _upstream, dir) = setup(&[]).await;
        let err = run_job(&config, &dir, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::EmptyPool));

        config.remote.document_url = None;
        let err = run_job(&config, &dir, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::MissingSecret("FLEETGATE_REMOTE_URL")));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
