//! Application state shared across handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tm_core::db::{create_dashboard_repository, DbPool};
use tm_core::{DashboardConfig, DashboardService, StorageService};
use tm_observability::MetricsCollector;

use crate::rate_limit::LoginRateLimiter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DbPool>,
    /// Photo storage.
    pub storage: Arc<StorageService>,
    /// Role dashboards.
    pub dashboard: Arc<DashboardService>,
    /// Domain and security metrics.
    pub metrics: Arc<MetricsCollector>,
    /// Login brute-force protection.
    pub login_rate_limiter: LoginRateLimiter,
    /// Prometheus metrics handle for rendering metrics.
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(db: DbPool, storage: StorageService) -> Self {
        let dashboard = DashboardService::new(
            create_dashboard_repository(&db),
            DashboardConfig::default(),
        );

        Self {
            db: Arc::new(db),
            storage: Arc::new(storage),
            dashboard: Arc::new(dashboard),
            metrics: Arc::new(MetricsCollector::new()),
            login_rate_limiter: LoginRateLimiter::new(),
            prometheus_handle: None,
        }
    }

    /// Replaces the dashboard configuration.
    pub fn with_dashboard_config(mut self, config: DashboardConfig) -> Self {
        self.dashboard = Arc::new(DashboardService::new(
            create_dashboard_repository(&self.db),
            config,
        ));
        self
    }

    /// Replaces the login rate limiter.
    pub fn with_login_rate_limiter(mut self, limiter: LoginRateLimiter) -> Self {
        self.login_rate_limiter = limiter;
        self
    }

    /// Sets the Prometheus handle used by `/metrics`.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }
}
