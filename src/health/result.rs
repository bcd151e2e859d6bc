// src/health/result.rs
use super::order::FALLBACK_STATUS_CODE;
use super::status::HealthStatus;
use serde_json::{Map, Value};

/// Key holding a status name, both per check and for the aggregate.
pub const STATUS_KEY: &str = "status";

/// Aggregated snapshot served to callers.
///
/// `health_map` holds one entry per check plus the aggregate under
/// [`STATUS_KEY`]; `status_code` is the response code for the aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthResult {
    health_map: Map<String, Value>,
    status_code: u16,
}

impl HealthResult {
    pub fn new(health_map: Map<String, Value>, status_code: u16) -> Self {
        Self {
            health_map,
            status_code,
        }
    }

    /// Placeholder cached until the first evaluation completes.
    pub fn not_ready() -> Self {
        let mut health_map = Map::new();
        health_map.insert("async-checks".to_string(), Value::from("not-ready-yet"));
        Self::new(health_map, FALLBACK_STATUS_CODE)
    }

    pub fn health_map(&self) -> &Map<String, Value> {
        &self.health_map
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// The aggregated status, if the map carries one.
    pub fn status(&self) -> Option<HealthStatus> {
        self.health_map
            .get(STATUS_KEY)
            .and_then(Value::as_str)
            .map(|name| HealthStatus::new(name.to_string()))
    }

    pub fn into_parts(self) -> (Map<String, Value>, u16) {
        (self.health_map, self.status_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_placeholder() {
        let result = HealthResult::not_ready();
        assert_eq!(result.status_code(), 503);
        assert_eq!(result.health_map()["async-checks"], "not-ready-yet");
        assert_eq!(result.status(), None);
    }
}
