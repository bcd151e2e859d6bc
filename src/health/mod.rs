// src/health/mod.rs
mod check;
mod error;
mod order;
mod registry;
mod resolver;
mod result;
mod service;
mod status;

pub use check::{check_fn, with_timeout, FnCheck, HealthCheck, TimeoutCheck};
pub use error::HealthError;
pub use order::{StatusMapping, StatusOrder, FALLBACK_STATUS_CODE};
pub use registry::{CheckRegistry, Checks, SharedCheck};
pub use resolver::{DefaultResolver, StatusResolver};
pub use result::{HealthResult, STATUS_KEY};
pub use service::{
    HealthConfiguration, HealthMode, HealthService, HealthServiceBuilder, MAX_REFRESH_INTERVAL,
};
pub use status::{HealthStatus, Status};
