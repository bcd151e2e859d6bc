// src/metrics/collector.rs
use crate::health::{HealthResult, STATUS_KEY};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Histogram, Opts, Registry, TextEncoder,
};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use anyhow::{Context, Result};

/// Request-time buckets used when none are configured.
pub const DEFAULT_REQUEST_TIME_BUCKETS: [f64; 3] = [0.2, 0.8, 1.0];

pub struct MetricsRegistry {
    registry: Registry,
    http: Arc<HttpMetrics>,
    health: Arc<HealthMetrics>,
}

impl MetricsRegistry {
    pub fn new(request_time_buckets: Vec<f64>) -> Result<Self> {
        let registry = Registry::new();
        let http = Arc::new(
            HttpMetrics::new(&registry, request_time_buckets)
                .context("Failed to register HTTP metrics")?,
        );
        let health = Arc::new(
            HealthMetrics::new(&registry).context("Failed to register health metrics")?,
        );

        Ok(Self {
            registry,
            http,
            health,
        })
    }

    pub fn http(&self) -> Arc<HttpMetrics> {
        self.http.clone()
    }

    pub fn health(&self) -> Arc<HealthMetrics> {
        self.health.clone()
    }

    /// Renders every registered metric in the text exposition format.
    pub fn gather(&self) -> Result<Vec<u8>> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;
        Ok(buffer)
    }
}

/// Per-request counters for the HTTP surface.
pub struct HttpMetrics {
    pub request_status: IntCounterVec,
    pub request_time: HistogramVec,
}

impl HttpMetrics {
    pub fn new(registry: &Registry, buckets: Vec<f64>) -> prometheus::Result<Self> {
        let request_status = IntCounterVec::new(
            Opts::new(
                "http_request_status",
                "How many HTTP requests processed, partitioned by status code, method and HTTP path.",
            ),
            &["status", "method", "path"],
        )?;
        registry.register(Box::new(request_status.clone()))?;

        let buckets = if buckets.is_empty() {
            DEFAULT_REQUEST_TIME_BUCKETS.to_vec()
        } else {
            buckets
        };
        let request_time = HistogramVec::new(
            HistogramOpts::new(
                "http_request_time",
                "How long it took to process a request, partitioned by status code, method and HTTP path.",
            )
            .buckets(buckets),
            &["status", "method", "path"],
        )?;
        registry.register(Box::new(request_time.clone()))?;

        Ok(Self {
            request_status,
            request_time,
        })
    }

    pub fn record_request(&self, status_code: u16, method: &str, path: &str, duration: Duration) {
        let status = status_code.to_string();
        self.request_status
            .with_label_values(&[status.as_str(), method, path])
            .inc();

        self.request_time
            .with_label_values(&[status.as_str(), method, path])
            .observe(duration.as_secs_f64());
    }
}

/// Gauges mirroring the latest aggregated result.
pub struct HealthMetrics {
    pub check_status: IntGaugeVec,
    pub status_code: IntGauge,
    pub evaluations_total: IntCounter,
    pub evaluation_duration_seconds: Histogram,
    // (check, status) label pairs written by the previous evaluation
    published: Mutex<HashSet<(String, String)>>,
}

impl HealthMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let check_status = IntGaugeVec::new(
            Opts::new(
                "health_check_status",
                "Latest status per check (1=UP, 0=anything else)",
            ),
            &["check", "status"],
        )?;
        registry.register(Box::new(check_status.clone()))?;

        let status_code = IntGauge::new(
            "health_status_code",
            "Response code of the latest aggregated result",
        )?;
        registry.register(Box::new(status_code.clone()))?;

        let evaluations_total =
            IntCounter::new("health_evaluations_total", "Total number of health evaluations")?;
        registry.register(Box::new(evaluations_total.clone()))?;

        let evaluation_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "health_evaluation_duration_seconds",
            "Time spent running every check once",
        ))?;
        registry.register(Box::new(evaluation_duration_seconds.clone()))?;

        Ok(Self {
            check_status,
            status_code,
            evaluations_total,
            evaluation_duration_seconds,
            published: Mutex::new(HashSet::new()),
        })
    }

    pub fn record_evaluation(&self, result: &HealthResult, duration: Duration) {
        self.evaluations_total.inc();
        self.evaluation_duration_seconds
            .observe(duration.as_secs_f64());
        self.status_code.set(i64::from(result.status_code()));

        let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        let mut current = HashSet::new();
        for (name, entry) in result.health_map() {
            let status = match entry.get(STATUS_KEY).and_then(Value::as_str) {
                Some(status) if name != STATUS_KEY => status,
                _ => continue,
            };
            let value = if status == "UP" { 1 } else { 0 };
            self.check_status
                .with_label_values(&[name.as_str(), status])
                .set(value);
            current.insert((name.clone(), status.to_string()));
        }

        // stale series are removed only after the new ones are set
        for (name, status) in published.difference(&current) {
            let _ = self
                .check_status
                .remove_label_values(&[name.as_str(), status.as_str()]);
        }
        *published = current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn result(value: serde_json::Value, code: u16) -> HealthResult {
        let map: Map<String, serde_json::Value> = serde_json::from_value(value).unwrap();
        HealthResult::new(map, code)
    }

    #[test]
    fn test_health_metrics_follow_latest_result() {
        let registry = MetricsRegistry::new(Vec::new()).unwrap();
        let health = registry.health();

        health.record_evaluation(
            &result(
                json!({"db": {"status": "UP"}, "cache": {"status": "PROBLEM"}, "status": "PROBLEM"}),
                503,
            ),
            Duration::from_millis(5),
        );
        assert_eq!(health.status_code.get(), 503);
        assert_eq!(health.check_status.with_label_values(&["db", "UP"]).get(), 1);
        assert_eq!(
            health.check_status.with_label_values(&["cache", "PROBLEM"]).get(),
            0
        );

        health.record_evaluation(
            &result(json!({"db": {"status": "UP"}, "status": "UP"}), 200),
            Duration::from_millis(5),
        );
        assert_eq!(health.evaluations_total.get(), 2);
        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("health_check_status{check=\"db\",status=\"UP\"} 1"));
        assert!(!text.contains("check=\"cache\""));
    }

    #[test]
    fn test_status_change_replaces_series_for_check() {
        let registry = MetricsRegistry::new(Vec::new()).unwrap();
        let health = registry.health();

        health.record_evaluation(
            &result(json!({"db": {"status": "WARNING"}, "status": "WARNING"}), 200),
            Duration::from_millis(1),
        );
        health.record_evaluation(
            &result(json!({"db": {"status": "UP"}, "status": "UP"}), 200),
            Duration::from_millis(1),
        );

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("health_check_status{check=\"db\",status=\"UP\"} 1"));
        assert!(!text.contains("status=\"WARNING\""));
    }

    #[test]
    fn test_http_metrics_are_exposed() {
        let registry = MetricsRegistry::new(vec![0.1, 0.5]).unwrap();
        registry
            .http()
            .record_request(200, "GET", "/health", Duration::from_millis(30));

        let text = String::from_utf8(registry.gather().unwrap()).unwrap();
        assert!(text.contains("http_request_status{method=\"GET\",path=\"/health\",status=\"200\"} 1"));
        assert!(text.contains("http_request_time_bucket"));
    }
}
