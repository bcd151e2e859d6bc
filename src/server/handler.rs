// src/server/handler.rs
use crate::api_version::ApiVersionService;
use crate::health::HealthService;
use crate::log_level::LogLevelService;
use crate::metrics::HttpMetrics;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Method, Request, Response, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tower::Service;
use tracing::Instrument;
use uuid::Uuid;

pub const HEALTH_PATH: &str = "/health";
pub const API_VERSION_PATH: &str = "/api-version";
pub const LOG_LEVELS_PATH: &str = "/log-levels";

/// Renders the aggregated health, API versions and log levels over HTTP.
#[derive(Clone)]
pub struct HealthHandler {
    health: Arc<HealthService>,
    api_version: Option<Arc<ApiVersionService>>,
    log_levels: Option<Arc<LogLevelService>>,
    metrics: Option<Arc<HttpMetrics>>,
}

impl HealthHandler {
    pub fn new(health: Arc<HealthService>) -> Self {
        Self {
            health,
            api_version: None,
            log_levels: None,
            metrics: None,
        }
    }

    pub fn with_api_version(mut self, api_version: Arc<ApiVersionService>) -> Self {
        self.api_version = Some(api_version);
        self
    }

    pub fn with_log_levels(mut self, log_levels: Arc<LogLevelService>) -> Self {
        self.log_levels = Some(log_levels);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<HttpMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn handle(&self, method: &Method, path: &str) -> Response<Body> {
        match (method, path) {
            (&Method::GET, HEALTH_PATH) => {
                let result = self.health.get_health().await;
                let status = StatusCode::from_u16(result.status_code())
                    .unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
                json_response(status, result.health_map())
            }
            (&Method::GET, API_VERSION_PATH) => match &self.api_version {
                Some(api_version) => match api_version.get_api_version().await {
                    Ok(response) => json_response(StatusCode::OK, &*response),
                    Err(e) => json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &serde_json::json!({ "error": e.to_string() }),
                    ),
                },
                None => not_found(),
            },
            (&Method::GET, LOG_LEVELS_PATH) => match &self.log_levels {
                Some(log_levels) => match log_levels.get_log_levels() {
                    Ok(levels) => json_response(StatusCode::OK, &levels),
                    Err(e) => json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &serde_json::json!({ "error": e.to_string() }),
                    ),
                },
                None => not_found(),
            },
            _ => not_found(),
        }
    }
}

impl Service<Request<Body>> for HealthHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let handler = self.clone();
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "request",
            %request_id,
            method = %req.method(),
            path = %req.uri().path()
        );

        let method = req.method().clone();
        let path = req.uri().path().to_string();

        Box::pin(
            async move {
                let start = Instant::now();
                let response = handler.handle(&method, &path).await;

                tracing::debug!(status = %response.status(), "request handled");
                if let Some(metrics) = &handler.metrics {
                    metrics.record_request(
                        response.status().as_u16(),
                        method.as_str(),
                        route_label(&path),
                        start.elapsed(),
                    );
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

// keeps label cardinality bounded
fn route_label(path: &str) -> &'static str {
    match path {
        HEALTH_PATH => HEALTH_PATH,
        API_VERSION_PATH => API_VERSION_PATH,
        LOG_LEVELS_PATH => LOG_LEVELS_PATH,
        _ => "other",
    }
}

fn json_response<T: Serialize + ?Sized>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            tracing::error!(%e, "failed to serialize response body");
            let mut response = Response::new(Body::from("Internal Server Error"));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}

fn not_found() -> Response<Body> {
    let mut response = Response::new(Body::from("Not Found"));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{check_fn, HealthConfiguration, HealthServiceBuilder, Status};
    use crate::metrics::MetricsRegistry;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(path: &str) -> Request<Body> {
        Request::get(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_renders_map_and_code() {
        let health = HealthServiceBuilder::default()
            .check("svc-a", check_fn(Status::up))
            .check("svc-b", check_fn(|| Status::problem().with_detail("error", "timeout")))
            .start()
            .await
            .unwrap();

        let response = HealthHandler::new(health).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            HeaderValue::from_static("application/json")
        );
        assert_eq!(
            body_json(response).await,
            json!({
                "svc-a": {"status": "UP"},
                "svc-b": {"status": "PROBLEM", "error": "timeout"},
                "status": "PROBLEM"
            })
        );
    }

    #[tokio::test]
    async fn test_placeholder_is_served_before_first_refresh() {
        let health = HealthServiceBuilder::new([HealthConfiguration::every(Duration::from_secs(3600))])
            .unwrap()
            .check("svc-a", check_fn(Status::up))
            .start()
            .await
            .unwrap();

        let response = HealthHandler::new(health.clone())
            .oneshot(get("/health"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await, json!({"async-checks": "not-ready-yet"}));
        health.shutdown_and_wait().await;
    }

    #[tokio::test]
    async fn test_unknown_route_and_missing_api_version_are_404() {
        let health = HealthServiceBuilder::default().start().await.unwrap();
        let handler = HealthHandler::new(health);

        let response = handler.clone().oneshot(get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = handler.oneshot(get(API_VERSION_PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_api_version_error_is_500() {
        let health = HealthServiceBuilder::default().start().await.unwrap();
        let missing = std::env::temp_dir().join(format!("missing-{}.json", Uuid::new_v4()));
        let handler =
            HealthHandler::new(health).with_api_version(Arc::new(ApiVersionService::new(missing)));

        let response = handler.oneshot(get(API_VERSION_PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("Failed to read api version file"));
    }

    #[tokio::test]
    async fn test_log_levels_route() {
        use tracing_subscriber::{reload, EnvFilter, Registry};

        let (_layer, handle) =
            reload::Layer::<EnvFilter, Registry>::new(EnvFilter::new("warn,health_aggregator=debug"));
        let health = HealthServiceBuilder::default().start().await.unwrap();
        let handler = HealthHandler::new(health)
            .with_log_levels(Arc::new(LogLevelService::from_reload_handle(handle)));

        let response = handler.oneshot(get(LOG_LEVELS_PATH)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({"default": "WARN", "health_aggregator": "DEBUG"})
        );

        let response = HealthHandler::new(HealthServiceBuilder::default().start().await.unwrap())
            .oneshot(get(LOG_LEVELS_PATH))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_requests_are_counted() {
        let registry = MetricsRegistry::new(Vec::new()).unwrap();
        let health = HealthServiceBuilder::default().start().await.unwrap();
        let handler = HealthHandler::new(health).with_metrics(registry.http());

        handler.clone().oneshot(get("/health")).await.unwrap();
        handler.oneshot(get("/whatever")).await.unwrap();

        let http = registry.http();
        assert_eq!(
            http.request_status
                .with_label_values(&["200", "GET", "/health"])
                .get(),
            1
        );
        assert_eq!(
            http.request_status
                .with_label_values(&["404", "GET", "other"])
                .get(),
            1
        );
    }
}
