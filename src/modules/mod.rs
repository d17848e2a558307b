pub mod auth;
pub mod generator;
pub mod persistence;
pub mod system;
