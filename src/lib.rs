// src/lib.rs
pub mod api_version;
pub mod checks;
pub mod config;
pub mod health;
pub mod log_level;
pub mod metrics;
pub mod server;
