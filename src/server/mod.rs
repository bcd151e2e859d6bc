pub mod builder;
pub mod handler;
pub mod listener;

pub use builder::{ServerBuilder, ServerError};
pub use handler::{HealthHandler, API_VERSION_PATH, HEALTH_PATH, LOG_LEVELS_PATH};
pub use listener::bind_tcp;
