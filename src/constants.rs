use std::sync::LazyLock;

/// Successful selections allowed per credential inside one 24h window.
pub const DAILY_LIMIT: u32 = 100;
/// Minimum spacing between two uses of the same credential.
pub const SAFETY_COOLDOWN_MS: i64 = 15 * 60 * 1000;
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub const RATE_LIMIT_COOLDOWN_MIN_SECS: u64 = 30 * 60;
pub const RATE_LIMIT_COOLDOWN_MAX_SECS: u64 = 60 * 60;

pub const WRITE_JITTER_MIN_MS: u64 = 2000;
pub const WRITE_JITTER_MAX_MS: u64 = 4000;
pub const READ_JITTER_MIN_MS: u64 = 200;
pub const READ_JITTER_MAX_MS: u64 = 800;

pub const TOKEN_SAFETY_MARGIN_SECS: i64 = 60;
pub const TOKEN_MAX_ATTEMPTS: u32 = 3;
pub const TOKEN_BACKOFF_BASE_MS: u64 = 1000;

pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

pub const DEFAULT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_API_BASE_URL: &str = "https://oauth.reddit.com";

pub static USER_AGENT: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}:fleetgate:v{} ({})",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    )
});
