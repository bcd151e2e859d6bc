// src/checks/http.rs
use crate::config::HttpCheckConfig;
use crate::health::{HealthCheck, Status};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use url::Url;

/// Reachability probe for an HTTP dependency.
///
/// A 2xx answer is `UP`, a configured warning code is `WARNING`, anything else
/// (including transport errors and timeouts) is `PROBLEM`.
pub struct HttpCheck {
    url: Url,
    timeout: Duration,
    warning_status_codes: Vec<u16>,
    client: Client,
}

impl HttpCheck {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            url,
            timeout,
            warning_status_codes: Vec::new(),
            client,
        })
    }

    pub fn from_config(config: &HttpCheckConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(config.url.clone(), config.timeout())?
            .with_warning_status_codes(config.warning_status_codes.clone()))
    }

    pub fn with_warning_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.warning_status_codes = codes;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl HealthCheck for HttpCheck {
    async fn check(&self) -> Status {
        let start = Instant::now();

        let result = timeout(self.timeout, self.client.get(self.url.clone()).send()).await;

        let response_time_ms = start.elapsed().as_millis() as u64;

        let status = match result {
            Ok(Ok(response)) => {
                let code = response.status();
                if code.is_success() {
                    Status::up()
                } else if self.warning_status_codes.contains(&code.as_u16()) {
                    Status::warning().with_detail("http_status", code.as_u16())
                } else {
                    Status::problem()
                        .with_detail("http_status", code.as_u16())
                        .with_detail("error", format!("HTTP {}", code))
                }
            }
            Ok(Err(e)) if e.is_timeout() => Status::problem().with_detail("error", "Request timeout"),
            Ok(Err(e)) => Status::problem().with_detail("error", e.to_string()),
            Err(_) => Status::problem().with_detail("error", "Request timeout"),
        };

        tracing::debug!(
            url = %self.url,
            status = %status.name,
            response_time_ms,
            "HTTP check finished"
        );

        status
            .with_detail("url", self.url.as_str())
            .with_detail("response_time_ms", response_time_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;

    fn check_for(server: &mockito::Server, path: &str) -> HttpCheck {
        let url = Url::parse(&server.url()).unwrap().join(path).unwrap();
        HttpCheck::new(url, Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_success_is_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ready")
            .with_status(204)
            .create_async()
            .await;

        let status = check_for(&server, "/ready").check().await;
        mock.assert_async().await;
        assert_eq!(status.name, HealthStatus::UP);
        assert!(status.details["url"].as_str().unwrap().ends_with("/ready"));
        assert!(status.details.contains_key("response_time_ms"));
    }

    #[tokio::test]
    async fn test_warning_code_is_warning() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ready")
            .with_status(429)
            .create_async()
            .await;

        let status = check_for(&server, "/ready")
            .with_warning_status_codes(vec![429])
            .check()
            .await;
        assert_eq!(status.name, HealthStatus::WARNING);
        assert_eq!(status.details["http_status"], 429);
    }

    #[tokio::test]
    async fn test_server_error_is_problem() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/ready")
            .with_status(500)
            .create_async()
            .await;

        let status = check_for(&server, "/ready").check().await;
        assert_eq!(status.name, HealthStatus::PROBLEM);
        assert_eq!(status.details["error"], "HTTP 500 Internal Server Error");
    }

    #[tokio::test]
    async fn test_unreachable_target_is_problem() {
        // nothing listens on the discard port
        let url = Url::parse("http://127.0.0.1:9/ready").unwrap();
        let status = HttpCheck::new(url, Duration::from_secs(2))
            .unwrap()
            .check()
            .await;
        assert_eq!(status.name, HealthStatus::PROBLEM);
        assert!(status.details.contains_key("error"));
    }
}
