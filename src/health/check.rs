// src/health/check.rs
use super::status::Status;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// A probe reporting the health of one dependency or subsystem.
///
/// Implementations own their failure handling: a probe that cannot reach its
/// target should return a `PROBLEM` status with details instead of panicking.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check(&self) -> Status;
}

#[async_trait]
impl<C> HealthCheck for Arc<C>
where
    C: HealthCheck + ?Sized,
{
    async fn check(&self) -> Status {
        (**self).check().await
    }
}

/// Adapter returned by [`check_fn`].
pub struct FnCheck<F> {
    f: F,
}

/// Wraps a plain closure as a [`HealthCheck`].
pub fn check_fn<F>(f: F) -> FnCheck<F>
where
    F: Fn() -> Status + Send + Sync,
{
    FnCheck { f }
}

#[async_trait]
impl<F> HealthCheck for FnCheck<F>
where
    F: Fn() -> Status + Send + Sync,
{
    async fn check(&self) -> Status {
        (self.f)()
    }
}

/// Adapter returned by [`with_timeout`].
pub struct TimeoutCheck<C> {
    inner: C,
    timeout: Duration,
}

/// Bounds a check's run time; an overrun reports `PROBLEM`.
///
/// The engine never applies a timeout itself, so wrapping is opt-in per check.
pub fn with_timeout<C>(check: C, timeout: Duration) -> TimeoutCheck<C>
where
    C: HealthCheck,
{
    TimeoutCheck {
        inner: check,
        timeout,
    }
}

#[async_trait]
impl<C> HealthCheck for TimeoutCheck<C>
where
    C: HealthCheck,
{
    async fn check(&self) -> Status {
        match timeout(self.timeout, self.inner.check()).await {
            Ok(status) => status,
            Err(_) => Status::problem().with_detail(
                "error",
                format!("check timed out after {:?}", self.timeout),
            ),
        }
    }
}
