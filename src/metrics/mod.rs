// src/metrics/mod.rs
mod collector;

pub use collector::{HealthMetrics, HttpMetrics, MetricsRegistry, DEFAULT_REQUEST_TIME_BUCKETS};
