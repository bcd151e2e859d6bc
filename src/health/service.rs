// src/health/service.rs
use super::check::HealthCheck;
use super::error::HealthError;
use super::order::{StatusMapping, StatusOrder};
use super::registry::CheckRegistry;
use super::resolver::{DefaultResolver, StatusResolver};
use super::result::HealthResult;
use super::status::HealthStatus;
use crate::metrics::HealthMetrics;
use arc_swap::{ArcSwap, ArcSwapOption};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn, Instrument, Span};

/// Longest refresh period the background task runs with. Longer intervals
/// are clamped so tick deadlines stay representable.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Engine configuration. A positive interval selects asynchronous mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HealthConfiguration {
    pub health_check_interval: Duration,
}

impl HealthConfiguration {
    pub fn every(health_check_interval: Duration) -> Self {
        Self {
            health_check_interval,
        }
    }

    pub fn mode(&self) -> HealthMode {
        if self.health_check_interval.is_zero() {
            HealthMode::Sync
        } else {
            HealthMode::Async(self.health_check_interval)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthMode {
    /// Every `get_health` runs the checks.
    Sync,
    /// A background task refreshes the cached result on this period.
    Async(Duration),
}

#[derive(Clone, Default)]
struct Tables {
    mapping: Option<Arc<StatusMapping>>,
    order: Option<Arc<StatusOrder>>,
    resolver: Option<Arc<dyn StatusResolver>>,
}

impl Tables {
    fn resolved(&self) -> (Arc<StatusMapping>, Arc<StatusOrder>, Arc<dyn StatusResolver>) {
        (
            self.mapping.clone().unwrap_or_default(),
            self.order.clone().unwrap_or_default(),
            self.resolver
                .clone()
                .unwrap_or_else(|| Arc::new(DefaultResolver) as Arc<dyn StatusResolver>),
        )
    }
}

/// Assembles a [`HealthService`] before it goes live.
pub struct HealthServiceBuilder {
    config: HealthConfiguration,
    registry: CheckRegistry,
    tables: Tables,
    run_checks_on_startup: bool,
    metrics: Option<Arc<HealthMetrics>>,
    span: Option<Span>,
}

impl HealthServiceBuilder {
    /// Accepts zero or one configuration; more than one is rejected.
    pub fn new<I>(configs: I) -> Result<Self, HealthError>
    where
        I: IntoIterator<Item = HealthConfiguration>,
    {
        let configs: Vec<HealthConfiguration> = configs.into_iter().collect();
        if configs.len() > 1 {
            return Err(HealthError::TooManyConfigurations(configs.len()));
        }

        let mut builder = Self::default();
        if let Some(config) = configs.into_iter().next() {
            builder.config = config;
        }
        Ok(builder)
    }

    pub fn check<C>(self, name: impl Into<String>, check: C) -> Self
    where
        C: HealthCheck + 'static,
    {
        self.registry.add(name, check);
        self
    }

    /// Worst status first.
    pub fn status_order<I>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        self.tables.order = Some(Arc::new(StatusOrder::from_worst_first(order)));
        self
    }

    pub fn status_mapping(mut self, mapping: StatusMapping) -> Self {
        self.tables.mapping = Some(Arc::new(mapping));
        self
    }

    pub fn resolver<R>(mut self, resolver: R) -> Self
    where
        R: StatusResolver + 'static,
    {
        self.tables.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn run_checks_on_startup(mut self, run: bool) -> Self {
        self.run_checks_on_startup = run;
        self
    }

    pub fn metrics(mut self, metrics: Arc<HealthMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Span every engine log is recorded in.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Builds the service without starting it.
    pub fn build(self) -> Arc<HealthService> {
        let (shutdown_tx, _) = watch::channel(false);

        Arc::new(HealthService {
            mode: self.config.mode(),
            registry: self.registry,
            tables: ArcSwap::from_pointee(self.tables),
            cache: RwLock::new(Arc::new(HealthResult::not_ready())),
            run_checks_on_startup: self.run_checks_on_startup,
            started: AtomicBool::new(false),
            last_evaluated_at: ArcSwapOption::empty(),
            metrics: self.metrics,
            span: self
                .span
                .unwrap_or_else(|| tracing::info_span!("health")),
            shutdown_tx,
            refresh_task: Mutex::new(None),
        })
    }

    pub async fn start(self) -> Result<Arc<HealthService>, HealthError> {
        let service = self.build();
        service.start().await?;
        Ok(service)
    }
}

impl Default for HealthServiceBuilder {
    fn default() -> Self {
        Self {
            config: HealthConfiguration::default(),
            registry: CheckRegistry::new(),
            tables: Tables::default(),
            run_checks_on_startup: false,
            metrics: None,
            span: None,
        }
    }
}

/// Aggregates every registered check into one [`HealthResult`].
///
/// In sync mode each [`get_health`](HealthService::get_health) runs the checks.
/// In async mode a background task refreshes a cached result every interval
/// and `get_health` only reads it. Checks, tables and the resolver may be
/// replaced at any time; changes apply to the next evaluation.
pub struct HealthService {
    mode: HealthMode,
    registry: CheckRegistry,
    tables: ArcSwap<Tables>,
    cache: RwLock<Arc<HealthResult>>,
    run_checks_on_startup: bool,
    started: AtomicBool,
    last_evaluated_at: ArcSwapOption<DateTime<Utc>>,
    metrics: Option<Arc<HealthMetrics>>,
    span: Span,
    shutdown_tx: watch::Sender<bool>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl HealthService {
    /// Sync-mode builder with no configuration.
    pub fn builder() -> HealthServiceBuilder {
        HealthServiceBuilder::default()
    }

    pub fn mode(&self) -> HealthMode {
        self.mode
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn registry(&self) -> &CheckRegistry {
        &self.registry
    }

    pub fn last_evaluated_at(&self) -> Option<DateTime<Utc>> {
        self.last_evaluated_at.load_full().map(|at| *at)
    }

    pub fn add_check<C>(&self, name: impl Into<String>, check: C) -> &Self
    where
        C: HealthCheck + 'static,
    {
        let name = name.into();
        self.span
            .in_scope(|| debug!("Add health indicator with name {}", name));
        self.registry.add(name, check);
        self
    }

    pub fn remove_check(&self, name: &str) -> &Self {
        self.span
            .in_scope(|| debug!("Remove health indicator with name {}", name));
        self.registry.remove(name);
        self
    }

    pub fn set_status_mapping(&self, mapping: StatusMapping) -> &Self {
        let mapping = Arc::new(mapping);
        self.tables.rcu(|tables| Tables {
            mapping: Some(mapping.clone()),
            ..Tables::clone(tables)
        });
        self
    }

    /// Worst status first.
    pub fn set_status_order<I>(&self, order: I) -> &Self
    where
        I: IntoIterator<Item = HealthStatus>,
    {
        let order = Arc::new(StatusOrder::from_worst_first(order));
        self.tables.rcu(|tables| Tables {
            order: Some(order.clone()),
            ..Tables::clone(tables)
        });
        self
    }

    pub fn set_resolver<R>(&self, resolver: R) -> &Self
    where
        R: StatusResolver + 'static,
    {
        let resolver: Arc<dyn StatusResolver> = Arc::new(resolver);
        self.tables.rcu(|tables| Tables {
            resolver: Some(resolver.clone()),
            ..Tables::clone(tables)
        });
        self
    }

    /// Fills unset tables with defaults, primes the cache and, in async mode,
    /// spawns the refresh task. Only the first call succeeds.
    pub async fn start(self: &Arc<Self>) -> Result<(), HealthError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(HealthError::AlreadyStarted);
        }

        self.fill_defaults();

        if self.run_checks_on_startup {
            self.span.in_scope(|| debug!("Start health calculation"));
            self.evaluate().await;
        } else {
            // unavailable until the first refresh lands
            *self.cache.write().await = Arc::new(HealthResult::not_ready());
        }

        match self.mode {
            HealthMode::Async(period) => {
                let handle = self.spawn_refresh(period);
                *self
                    .refresh_task
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
                self.span.in_scope(|| {
                    info!("Started health checks in background task with interval: {:?}", period)
                });
            }
            HealthMode::Sync => {
                self.span
                    .in_scope(|| info!("Health checks will be calculated by request"));
            }
        }

        Ok(())
    }

    /// Latest result. Runs the checks in sync mode; never does in async mode.
    ///
    /// Before `start` this is the not-ready placeholder.
    pub async fn get_health(&self) -> Arc<HealthResult> {
        if self.mode == HealthMode::Sync && self.is_started() {
            return self.evaluate().await;
        }
        self.cache.read().await.clone()
    }

    /// Signals the refresh task to stop after its current evaluation.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Stops the refresh task and waits for it to exit.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        let handle = self
            .refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                self.span
                    .in_scope(|| warn!("Health refresh task ended abnormally: {}", e));
            }
        }
    }

    fn fill_defaults(&self) {
        let current = self.tables.load();
        self.span.in_scope(|| {
            if current.mapping.is_none() {
                debug!("No status mapping provided, using default one: {:?}", StatusMapping::default());
            }
            if current.order.is_none() {
                debug!("No status order provided, using default one: {:?}", StatusOrder::default());
            }
            if current.resolver.is_none() {
                debug!("No status resolver provided, using default one");
            }
        });

        self.tables.rcu(|tables| {
            let (mapping, order, resolver) = tables.resolved();
            Tables {
                mapping: Some(mapping),
                order: Some(order),
                resolver: Some(resolver),
            }
        });
    }

    async fn evaluate(&self) -> Arc<HealthResult> {
        let (mapping, order, resolver) = self.tables.load().resolved();
        let checks = self.registry.snapshot();

        let started = std::time::Instant::now();
        let result = resolver
            .resolve(&checks, &mapping, &order)
            .instrument(self.span.clone())
            .await;
        let elapsed = started.elapsed();

        if let Some(metrics) = &self.metrics {
            metrics.record_evaluation(&result, elapsed);
        }

        self.span.in_scope(|| match result.status() {
            Some(status) if status == HealthStatus::UP => {
                debug!("Health evaluated in {:?}: {}", elapsed, status)
            }
            Some(status) => warn!(
                "Health evaluated in {:?}: {} (code {})",
                elapsed,
                status,
                result.status_code()
            ),
            None => debug!("Health evaluated in {:?}, code {}", elapsed, result.status_code()),
        });

        let result = Arc::new(result);
        *self.cache.write().await = result.clone();
        self.last_evaluated_at.store(Some(Arc::new(Utc::now())));
        result
    }

    fn spawn_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        if period > MAX_REFRESH_INTERVAL {
            self.span.in_scope(|| {
                warn!(
                    "Health check interval {:?} exceeds {:?}, refreshing every {:?} instead",
                    period, MAX_REFRESH_INTERVAL, MAX_REFRESH_INTERVAL
                )
            });
        }
        let period = period.min(MAX_REFRESH_INTERVAL);
        let weak: Weak<Self> = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(
            async move {
                // first refresh one full period after start
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                if *shutdown_rx.borrow() {
                    return;
                }

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let Some(service) = weak.upgrade() else {
                                debug!("Health service dropped, stopping refresh");
                                break;
                            };
                            service.evaluate().await;
                        }
                        changed = shutdown_rx.changed() => {
                            if changed.is_err() || *shutdown_rx.borrow() {
                                info!("Health refresh task shutting down");
                                break;
                            }
                        }
                    }
                }
            }
            .instrument(self.span.clone()),
        )
    }
}
