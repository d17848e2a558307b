use crate::models::{AppConfig, RangeConfig};
use std::fmt;

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
    pub actual_value: Option<String>,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual_value {
            Some(val) => write!(f, "  • {}: {} (got: {})", self.field, self.message, val),
            None => write!(f, "  • {}: {}", self.field, self.message),
        }
    }
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: None,
        }
    }

    fn with_value(
        field: impl Into<String>,
        message: impl Into<String>,
        value: impl ToString,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            actual_value: Some(value.to_string()),
        }
    }
}

fn validate_range(field: &str, range: &RangeConfig, errors: &mut Vec<ConfigError>) {
    if range.min > range.max {
        errors.push(ConfigError::with_value(
            field,
            "min must not exceed max",
            format!("{}..{}", range.min, range.max),
        ));
    }
}

fn validate_url(field: &str, value: &str, errors: &mut Vec<ConfigError>) {
    match url::Url::parse(value) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
        Ok(parsed) => errors.push(ConfigError::with_value(
            field,
            "scheme must be http or https",
            parsed.scheme(),
        )),
        Err(e) => errors.push(ConfigError::with_value(field, e.to_string(), value)),
    }
}

pub fn validate_app_config(config: &AppConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let gateway = &config.gateway;
    if gateway.daily_limit == 0 {
        errors.push(ConfigError::new(
            "gateway.daily_limit",
            "must be greater than 0",
        ));
    }
    validate_range("gateway.write_jitter_ms", &gateway.write_jitter_ms, &mut errors);
    validate_range("gateway.read_jitter_ms", &gateway.read_jitter_ms, &mut errors);
    validate_range(
        "gateway.rate_limit_cooldown_secs",
        &gateway.rate_limit_cooldown_secs,
        &mut errors,
    );
    if gateway.token_safety_margin_secs < 0 {
        errors.push(ConfigError::with_value(
            "gateway.token_safety_margin_secs",
            "must not be negative",
            gateway.token_safety_margin_secs,
        ));
    }

    if config.oauth.max_attempts == 0 {
        errors.push(ConfigError::new(
            "oauth.max_attempts",
            "must be at least 1",
        ));
    }
    validate_url("oauth.token_url", &config.oauth.token_url, &mut errors);
    validate_url("oauth.api_base_url", &config.oauth.api_base_url, &mut errors);

    if let Some(url) = config.remote.document_url.as_deref() {
        validate_url("remote.document_url", url, &mut errors);
    }
    if let Some(url) = config.generator.endpoint.as_deref() {
        validate_url("generator.endpoint", url, &mut errors);
    }
    if config.admin.port == 0 {
        errors.push(ConfigError::new("admin.port", "must not be 0"));
    }
    for (i, campaign) in config.job.campaigns.iter().enumerate() {
        if campaign.query.trim().is_empty() {
            errors.push(ConfigError::with_value(
                format!("job.campaigns[{}].query", i),
                "must not be empty",
                &campaign.name,
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
