pub mod content_log;
pub mod local_cache;
pub mod remote_store;
