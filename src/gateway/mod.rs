pub mod executor;
pub mod health;
pub mod import;
pub mod pacing;
pub mod reconcile;
pub mod refresh;
pub mod selection;
pub mod store;
pub mod sync;
pub mod token_cache;

pub use executor::{ActionKind, Gateway, HttpReply, WriteAudit};
pub use health::{HealthMonitor, SystemHealth};
pub use store::{CredentialPool, ImportReport, LoadSource};
pub use token_cache::{Authenticator, TokenProvider};
