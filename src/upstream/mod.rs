pub mod client;

pub use client::ResourceClient;
