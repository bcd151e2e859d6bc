// src/health/resolver.rs
use super::order::{StatusMapping, StatusOrder};
use super::registry::Checks;
use super::result::{HealthResult, STATUS_KEY};
use super::status::{HealthStatus, Status};
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Strategy reducing every check's status into one [`HealthResult`].
#[async_trait]
pub trait StatusResolver: Send + Sync {
    async fn resolve(
        &self,
        checks: &Checks,
        mapping: &StatusMapping,
        order: &StatusOrder,
    ) -> HealthResult;
}

/// Worst-status-wins reduction.
///
/// Checks run one after another in name order. The aggregate starts at `UP`
/// and is replaced only by a strictly worse status, so among equally ranked
/// statuses the first name wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultResolver;

#[async_trait]
impl StatusResolver for DefaultResolver {
    async fn resolve(
        &self,
        checks: &Checks,
        mapping: &StatusMapping,
        order: &StatusOrder,
    ) -> HealthResult {
        let mut health_map = Map::new();
        let mut worst = HealthStatus::UP;

        for (name, check) in checks {
            let Status { name: status, details } = check.check().await;

            // the check's own status always owns the reserved key
            let mut entry = details;
            entry.insert(STATUS_KEY.to_string(), Value::from(status.clone()));
            health_map.insert(name.clone(), Value::Object(entry));

            if order.priority(&status) < order.priority(&worst) {
                worst = status;
            }
        }

        let status_code = mapping.code_for(&worst);
        health_map.insert(STATUS_KEY.to_string(), Value::from(worst));

        HealthResult::new(health_map, status_code)
    }
}
