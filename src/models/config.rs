use crate::constants;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub job: JobConfig,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Inclusive-exclusive bounds used for randomized delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub min: u64,
    pub max: u64,
}

impl RangeConfig {
    pub const fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_safety_cooldown_secs")]
    pub safety_cooldown_secs: u64,
    #[serde(default = "default_write_jitter")]
    pub write_jitter_ms: RangeConfig,
    #[serde(default = "default_read_jitter")]
    pub read_jitter_ms: RangeConfig,
    #[serde(default = "default_rate_limit_cooldown")]
    pub rate_limit_cooldown_secs: RangeConfig,
    #[serde(default = "default_token_safety_margin")]
    pub token_safety_margin_secs: i64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_daily_limit() -> u32 {
    constants::DAILY_LIMIT
}

fn default_safety_cooldown_secs() -> u64 {
    (constants::SAFETY_COOLDOWN_MS / 1000) as u64
}

fn default_write_jitter() -> RangeConfig {
    RangeConfig::new(constants::WRITE_JITTER_MIN_MS, constants::WRITE_JITTER_MAX_MS)
}

fn default_read_jitter() -> RangeConfig {
    RangeConfig::new(constants::READ_JITTER_MIN_MS, constants::READ_JITTER_MAX_MS)
}

fn default_rate_limit_cooldown() -> RangeConfig {
    RangeConfig::new(
        constants::RATE_LIMIT_COOLDOWN_MIN_SECS,
        constants::RATE_LIMIT_COOLDOWN_MAX_SECS,
    )
}

fn default_token_safety_margin() -> i64 {
    constants::TOKEN_SAFETY_MARGIN_SECS
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            safety_cooldown_secs: default_safety_cooldown_secs(),
            write_jitter_ms: default_write_jitter(),
            read_jitter_ms: default_read_jitter(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown(),
            token_safety_margin_secs: default_token_safety_margin(),
            user_agent: None,
        }
    }
}

impl GatewayConfig {
    pub fn effective_user_agent(&self) -> String {
        self.user_agent
            .as_deref()
            .map(str::trim)
            .filter(|ua| !ua.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| constants::USER_AGENT.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_token_url() -> String {
    constants::DEFAULT_TOKEN_URL.to_string()
}

fn default_api_base_url() -> String {
    constants::DEFAULT_API_BASE_URL.to_string()
}

fn default_max_attempts() -> u32 {
    constants::TOKEN_MAX_ATTEMPTS
}

fn default_backoff_base_ms() -> u64 {
    constants::TOKEN_BACKOFF_BASE_MS
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Address of the shared pool document. Unset keeps the pool process-local.
    #[serde(default)]
    pub document_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_push_debounce_ms")]
    pub push_debounce_ms: u64,
    #[serde(default = "default_pull_interval_secs")]
    pub pull_interval_secs: u64,
}

fn default_push_debounce_ms() -> u64 {
    1500
}

fn default_pull_interval_secs() -> u64 {
    60
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            document_url: None,
            api_key: None,
            push_debounce_ms: default_push_debounce_ms(),
            pull_interval_secs: default_pull_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_max_bytes")]
    pub max_bytes: usize,
}

fn default_cache_max_bytes() -> usize {
    2 * 1024 * 1024
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_cache_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_host")]
    pub host: String,
    #[serde(default = "default_admin_port")]
    pub port: u16,
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    8740
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            host: default_admin_host(),
            port: default_admin_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_tone")]
    pub default_tone: String,
    #[serde(default = "default_generator_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_tone() -> String {
    "helpful".to_string()
}

fn default_generator_timeout_secs() -> u64 {
    60
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            default_tone: default_tone(),
            timeout_secs: default_generator_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub name: String,
    pub query: String,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default = "default_max_replies")]
    pub max_replies: u32,
}

fn default_max_replies() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub campaigns: Vec<CampaignConfig>,
    #[serde(default)]
    pub check_inbox: bool,
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

fn default_search_limit() -> u32 {
    25
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            campaigns: Vec::new(),
            check_inbox: false,
            search_limit: default_search_limit(),
        }
    }
}
