// src/health/status.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::fmt;

/// Severity reported by a check or by the aggregate.
///
/// This is an open set: `UP`, `WARNING` and `PROBLEM` are the well-known
/// values, but any other name is accepted and ranked through [`StatusOrder`].
///
/// [`StatusOrder`]: crate::health::StatusOrder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HealthStatus(Cow<'static, str>);

impl HealthStatus {
    pub const UP: HealthStatus = HealthStatus(Cow::Borrowed("UP"));
    pub const WARNING: HealthStatus = HealthStatus(Cow::Borrowed("WARNING"));
    pub const PROBLEM: HealthStatus = HealthStatus(Cow::Borrowed("PROBLEM"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for HealthStatus {
    fn from(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }
}

impl From<String> for HealthStatus {
    fn from(name: String) -> Self {
        Self(Cow::Owned(name))
    }
}

impl From<HealthStatus> for Value {
    fn from(status: HealthStatus) -> Self {
        Value::String(status.0.into_owned())
    }
}

/// Outcome of a single check invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub name: HealthStatus,
    #[serde(default)]
    pub details: Map<String, Value>,
}

impl Status {
    pub fn new(name: impl Into<HealthStatus>) -> Self {
        Self {
            name: name.into(),
            details: Map::new(),
        }
    }

    pub fn up() -> Self {
        Self::new(HealthStatus::UP)
    }

    pub fn warning() -> Self {
        Self::new(HealthStatus::WARNING)
    }

    pub fn problem() -> Self {
        Self::new(HealthStatus::PROBLEM)
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &HealthStatus {
        &self.name
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }
}
