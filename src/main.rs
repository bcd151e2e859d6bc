// src/main.rs
use anyhow::{Context, Result};
use health_aggregator::{
    api_version::ApiVersionService,
    checks::HttpCheck,
    config::{self, AppConfig},
    health::HealthServiceBuilder,
    log_level::LogLevelService,
    metrics::MetricsRegistry,
    server::{HealthHandler, ServerBuilder},
};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, reload, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; the filter stays reloadable so /log-levels can read it
    let filter = EnvFilter::from_default_env()
        .add_directive("health_aggregator=debug".parse()?)
        .add_directive("healthd=debug".parse()?)
        .add_directive("hyper=info".parse()?);
    let (filter, filter_handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = Arc::new(MetricsRegistry::new(
        config.metrics.request_time_buckets.clone(),
    )?);

    // Build and start the health engine
    let health = build_health_service(&config, &metrics_registry)?
        .start()
        .await
        .context("Failed to start health service")?;

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, metrics_registry.clone(), config.metrics.path.clone())
            .await?;
    }

    let api_version = Arc::new(ApiVersionService::new(config.api_version.path.clone()));
    let handler = HealthHandler::new(health.clone())
        .with_api_version(api_version)
        .with_log_levels(Arc::new(LogLevelService::from_reload_handle(filter_handle)))
        .with_metrics(metrics_registry.http());

    // Start main server
    let addr = config.server.addr()?;
    info!("Starting health endpoint on {}", addr);

    ServerBuilder::new(addr)
        .with_handler(handler)
        .with_max_buf_size(config.server.max_header_size_bytes)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    health.shutdown_and_wait().await;
    info!("Health service stopped");

    Ok(())
}

fn build_health_service(
    config: &AppConfig,
    metrics: &MetricsRegistry,
) -> Result<HealthServiceBuilder> {
    let mut builder = HealthServiceBuilder::new([config.health.configuration()])?
        .run_checks_on_startup(config.health.run_checks_on_startup)
        .metrics(metrics.health());

    if let Some(order) = config.health.order() {
        builder = builder.status_order(order);
    }
    if let Some(mapping) = config.health.mapping() {
        builder = builder.status_mapping(mapping);
    }

    for check in &config.checks {
        let http_check = HttpCheck::from_config(check)
            .with_context(|| format!("Failed to build check {}", check.name))?;
        info!("Registering HTTP check {} -> {}", check.name, check.url);
        builder = builder.check(check.name.clone(), http_check);
    }

    if config.checks.is_empty() {
        info!("No checks configured, health will always report UP");
    }

    Ok(builder)
}

async fn start_metrics_server(
    addr: SocketAddr,
    registry: Arc<MetricsRegistry>,
    path: String,
) -> Result<()> {
    let metrics_path = Arc::new(path); // keep this for logging
    let service_path = metrics_path.clone(); // clone for the service closure

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    let response = if req.uri().path() == path.as_str() {
                        match registry.gather() {
                            Ok(metrics) => {
                                let mut response = Response::new(Body::from(metrics));
                                response.headers_mut().insert(
                                    hyper::header::CONTENT_TYPE,
                                    hyper::header::HeaderValue::from_static(
                                        "text/plain; version=0.0.4",
                                    ),
                                );
                                response
                            }
                            Err(e) => {
                                error!("Failed to gather metrics: {:#}", e);
                                let mut response = Response::new(Body::from("Internal Server Error"));
                                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                                response
                            }
                        }
                    } else {
                        let mut response = Response::new(Body::from("Not Found"));
                        *response.status_mut() = StatusCode::NOT_FOUND;
                        response
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics server on {}", addr))?
        .serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
