use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{GeneratorConfig, WorkItem};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
    tone: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    text: String,
}

/// Client for the external text-generation service.
pub struct ContentGenerator {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    default_tone: String,
}

impl ContentGenerator {
    /// Returns `None` when no endpoint is configured.
    pub fn from_config(config: &GeneratorConfig, client: Client) -> Option<Self> {
        let endpoint = config.endpoint.as_deref()?.trim();
        if endpoint.is_empty() {
            return None;
        }
        Some(Self {
            client,
            endpoint: endpoint.to_string(),
            api_key: config.api_key.clone(),
            default_tone: config.default_tone.clone(),
        })
    }

    pub async fn generate(&self, prompt: &str, tone: Option<&str>) -> AppResult<String> {
        let tone = tone.unwrap_or(&self.default_tone);
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { prompt, tone });
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generator(format!(
                "service returned {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }
        let body: GenerateResponse = response.json().await?;
        let text = body.text.trim();
        if text.is_empty() {
            return Err(AppError::Generator("service returned empty text".to_string()));
        }
        // The service signals failures in-band.
        if text.starts_with("Error") {
            return Err(AppError::Generator(text.to_string()));
        }
        Ok(text.to_string())
    }
}

pub fn build_prompt(item: &WorkItem, campaign_name: &str) -> String {
    match item {
        WorkItem::Lead(lead) => format!(
            "Campaign: {}\nWrite a reply to this post in r/{}.\nTitle: {}\nBody: {}",
            campaign_name, lead.community, lead.title, lead.body
        ),
        WorkItem::InboxMessage(msg) => format!(
            "Campaign: {}\nWrite a reply to this message from u/{}.\nMessage: {}",
            campaign_name, msg.author, msg.body
        ),
    }
}
