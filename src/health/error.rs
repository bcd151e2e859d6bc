// src/health/error.rs

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HealthError {
    #[error("At most one health configuration is accepted, got {0}")]
    TooManyConfigurations(usize),

    #[error("Health service is already started")]
    AlreadyStarted,
}
