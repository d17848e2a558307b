use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
    #[default]
    Ready,
    RateLimited,
    DailyCapReached,
    // Reserved. Nothing assigns it; a credential carrying it is never selected.
    Exhausted,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialStatus::Ready => "READY",
            CredentialStatus::RateLimited => "RATE_LIMITED",
            CredentialStatus::DailyCapReached => "DAILY_CAP_REACHED",
            CredentialStatus::Exhausted => "EXHAUSTED",
        }
    }
}

/// One OAuth-capable identity: an application key pair plus an account login.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub usage_count: u64,
    #[serde(default)]
    pub daily_usage: u32,
    #[serde(default)]
    pub day_start_timestamp: i64,
    #[serde(default)]
    pub last_used: i64,
    #[serde(default)]
    pub cooldown_until: i64,
    #[serde(default)]
    pub status: CredentialStatus,
    #[serde(default)]
    pub created_at: i64,
}

impl Credential {
    pub fn new(fields: NewCredential, now_ms: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            client_id: fields.client_id.trim().to_string(),
            client_secret: fields.client_secret.trim().to_string(),
            username: fields.username.trim().to_string(),
            password: fields.password,
            usage_count: 0,
            daily_usage: 0,
            day_start_timestamp: now_ms,
            last_used: 0,
            cooldown_until: 0,
            status: CredentialStatus::Ready,
            created_at: now_ms,
        }
    }

    /// Pre-commit one unit of budget. Reaching `daily_limit` moves the
    /// credential into `DAILY_CAP_REACHED`.
    pub fn mark_used(&mut self, now_ms: i64, daily_limit: u32) {
        self.last_used = now_ms;
        self.usage_count += 1;
        self.daily_usage = self.daily_usage.saturating_add(1);
        if self.daily_usage >= daily_limit {
            self.status = CredentialStatus::DailyCapReached;
        }
    }

    /// Daily cap is the stronger state and survives a penalty.
    pub fn penalize(&mut self, cooldown_until: i64) {
        if self.status == CredentialStatus::DailyCapReached {
            self.cooldown_until = self.cooldown_until.max(cooldown_until);
            return;
        }
        self.status = CredentialStatus::RateLimited;
        self.cooldown_until = cooldown_until;
    }

    /// Returns true when the credential left a penalty state.
    pub fn clear_penalty(&mut self) -> bool {
        if self.status == CredentialStatus::RateLimited {
            self.status = CredentialStatus::Ready;
            self.cooldown_until = 0;
            return true;
        }
        false
    }

    pub fn masked_client_id(&self) -> String {
        mask_secret(&self.client_id)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("client_id", &mask_secret(&self.client_id))
            .field("client_secret", &"***")
            .field("password", &"***")
            .field("usage_count", &self.usage_count)
            .field("daily_usage", &self.daily_usage)
            .field("day_start_timestamp", &self.day_start_timestamp)
            .field("last_used", &self.last_used)
            .field("cooldown_until", &self.cooldown_until)
            .field("status", &self.status)
            .finish()
    }
}

/// Operator-supplied fields for a new credential.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCredential {
    #[serde(alias = "client_id")]
    pub client_id: String,
    #[serde(alias = "client_secret")]
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl NewCredential {
    pub fn validate(&self) -> Result<(), String> {
        let missing: Vec<&str> = [
            ("clientId", self.client_id.trim()),
            ("clientSecret", self.client_secret.trim()),
            ("username", self.username.trim()),
            ("password", self.password.as_str()),
        ]
        .iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| *k)
        .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!("missing fields: {}", missing.join(", ")))
        }
    }
}

impl fmt::Debug for NewCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewCredential")
            .field("username", &self.username)
            .field("client_id", &mask_secret(&self.client_id))
            .finish_non_exhaustive()
    }
}

/// Shared durable record that every process reads and fully overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolDocument {
    pub updated_at: i64,
    pub count: usize,
    pub pool: Vec<Credential>,
}

impl PoolDocument {
    pub fn new(pool: Vec<Credential>, now_ms: i64) -> Self {
        Self {
            updated_at: now_ms,
            count: pool.len(),
            pool,
        }
    }
}

pub fn mask_secret(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    if value.chars().count() <= 4 {
        "***".to_string()
    } else {
        format!("{}***", visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(username: &str) -> NewCredential {
        NewCredential {
            client_id: "client-abcdef".to_string(),
            client_secret: "secret-value".to_string(),
            username: username.to_string(),
            password: "hunter2".to_string(),
        }
    }

    #[test]
    fn test_mark_used_reaches_cap_on_limit() {
        let mut c = Credential::new(fields("alice"), 1_000);
        for _ in 0..99 {
            c.mark_used(2_000, 100);
        }
        assert_eq!(c.status, CredentialStatus::Ready);
        c.mark_used(3_000, 100);
        assert_eq!(c.daily_usage, 100);
        assert_eq!(c.usage_count, 100);
        assert_eq!(c.last_used, 3_000);
        assert_eq!(c.status, CredentialStatus::DailyCapReached);
    }

    #[test]
    fn test_penalty_does_not_downgrade_daily_cap() {
        let mut c = Credential::new(fields("alice"), 0);
        c.status = CredentialStatus::DailyCapReached;
        c.penalize(5_000);
        assert_eq!(c.status, CredentialStatus::DailyCapReached);
        assert!(!c.clear_penalty());
        assert_eq!(c.status, CredentialStatus::DailyCapReached);
    }

    #[test]
    fn test_debug_output_hides_secrets() {
        let c = Credential::new(fields("alice"), 0);
        let rendered = format!("{:?}", c);
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("secret-value"));
        assert!(rendered.contains("clie***"));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let mut c = Credential::new(fields("alice"), 42);
        c.status = CredentialStatus::DailyCapReached;
        let value = serde_json::to_value(&c).unwrap();
        assert_eq!(value["dailyUsage"], 0);
        assert_eq!(value["dayStartTimestamp"], 42);
        assert_eq!(value["status"], "DAILY_CAP_REACHED");
        assert!(value.get("daily_usage").is_none());
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let mut f = fields(" ");
        f.password.clear();
        let err = f.validate().unwrap_err();
        assert!(err.contains("username"));
        assert!(err.contains("password"));
        assert!(fields("bob").validate().is_ok());
    }

    #[test]
    fn test_mask_secret_short_values() {
        assert_eq!(mask_secret("abc"), "***");
        assert_eq!(mask_secret("abcdefgh"), "abcd***");
    }
}
