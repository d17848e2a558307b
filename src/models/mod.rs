pub mod config;
pub mod credential;
pub mod item;

pub use config::{
    AdminConfig, AppConfig, CacheConfig, CampaignConfig, GatewayConfig, GeneratorConfig,
    JobConfig, OAuthConfig, RangeConfig, RemoteConfig,
};
pub use credential::{Credential, CredentialStatus, NewCredential, PoolDocument};
pub use item::{InboxMessage, Lead, WorkItem};
