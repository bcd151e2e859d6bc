// src/health/registry.rs
use super::check::HealthCheck;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SharedCheck = Arc<dyn HealthCheck>;

/// Point-in-time view of the registry, ordered by check name.
pub type Checks = BTreeMap<String, SharedCheck>;

/// Named collection of checks, safe to mutate while evaluations run.
///
/// Evaluations work on a [`snapshot`](CheckRegistry::snapshot), so a change
/// lands on the next evaluation and never mid-way through one.
#[derive(Clone, Default)]
pub struct CheckRegistry {
    checks: Arc<DashMap<String, SharedCheck>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `check` under `name`, returning the check it replaced.
    pub fn add<C>(&self, name: impl Into<String>, check: C) -> Option<SharedCheck>
    where
        C: HealthCheck + 'static,
    {
        self.add_shared(name, Arc::new(check))
    }

    pub fn add_shared(&self, name: impl Into<String>, check: SharedCheck) -> Option<SharedCheck> {
        self.checks.insert(name.into(), check)
    }

    /// Removes the check under `name`; returns whether one was present.
    pub fn remove(&self, name: &str) -> bool {
        self.checks.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.checks.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.checks.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> Checks {
        self.checks
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{check_fn, Status};

    #[test]
    fn test_add_overwrites_by_name() {
        let registry = CheckRegistry::new();
        assert!(registry.add("db", check_fn(Status::up)).is_none());
        assert!(registry.add("db", check_fn(Status::problem)).is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let registry = CheckRegistry::new();
        registry.add("db", check_fn(Status::up));
        assert!(!registry.remove("cache"));
        assert!(registry.remove("db"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached_from_later_changes() {
        let registry = CheckRegistry::new();
        registry.add("b", check_fn(Status::up));
        registry.add("a", check_fn(Status::up));

        let snapshot = registry.snapshot();
        registry.remove("a");
        registry.add("c", check_fn(Status::up));

        let names: Vec<&str> = snapshot.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(registry.names(), vec!["b".to_string(), "c".to_string()]);
    }
}
