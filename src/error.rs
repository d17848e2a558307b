use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Generator error: {0}")]
    Generator(String),
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Classification attached to every failure surfaced by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    PoolExhausted,
    AuthFail,
    RateLimit,
    NetworkError,
    ApiError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::PoolExhausted => "POOL_EXHAUSTED",
            ErrorKind::AuthFail => "AUTH_FAIL",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::ApiError => "API_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why no credential could be handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cause", content = "detail", rename_all = "snake_case")]
pub enum ExhaustionCause {
    EmptyPool,
    /// Every credential used up its daily budget.
    DailyCaps,
    /// Every credential is cooling down after a penalty.
    Cooldowns,
    /// A mix of capped and cooling credentials.
    Mixed,
    UnknownCredential(String),
}

impl fmt::Display for ExhaustionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExhaustionCause::EmptyPool => write!(f, "credential pool is empty, add accounts"),
            ExhaustionCause::DailyCaps => {
                write!(f, "all credentials reached their daily cap, add more accounts")
            }
            ExhaustionCause::Cooldowns => {
                write!(f, "all credentials are cooling down after rate limits")
            }
            ExhaustionCause::Mixed => write!(
                f,
                "credentials are either capped for the day or cooling down"
            ),
            ExhaustionCause::UnknownCredential(id) => write!(f, "credential {} not found", id),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("no usable credential: {cause}")]
    PoolExhausted { cause: ExhaustionCause },

    #[error("authentication rejected for {username}: {message}")]
    AuthFail { username: String, message: String },

    #[error("rate limited on {username}, cooling down until {cooldown_until}")]
    RateLimit {
        username: String,
        cooldown_until: i64,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::PoolExhausted { .. } => ErrorKind::PoolExhausted,
            GatewayError::AuthFail { .. } => ErrorKind::AuthFail,
            GatewayError::RateLimit { .. } => ErrorKind::RateLimit,
            GatewayError::Network(_) => ErrorKind::NetworkError,
            GatewayError::Api { .. } => ErrorKind::ApiError,
        }
    }

    pub fn exhausted(cause: ExhaustionCause) -> Self {
        GatewayError::PoolExhausted { cause }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Network(format!("request timed out: {}", e))
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}
