//! Serve command - starts the API server.

use anyhow::{Context, Result};
use colored::Colorize;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

use tm_api::rate_limit::{spawn_cleanup_task, trusted_proxies_from_env, LoginRateLimiter};
use tm_api::{ApiServer, ApiServerConfig, AppState};
use tm_core::db::{ensure_admin_user, seed_categories};
use tm_core::StorageService;

use super::database::{connect, report_admin_seed};
use crate::config::AppConfig;

/// How often stale rate-limit entries are dropped.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Server settings after CLI flags are applied over the config file.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    pub host: String,
    pub database_url: String,
    pub enable_swagger: bool,
    pub timeout_secs: u64,
}

impl ServeConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            port: config.server.port,
            host: config.server.host.clone(),
            database_url: config.database.url.clone(),
            enable_swagger: config.server.enable_swagger,
            timeout_secs: config.server.request_timeout_secs,
        }
    }

    fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }
}

/// Runs the API server until Ctrl+C or SIGTERM.
pub async fn run_server(config: ServeConfig, app_config: AppConfig) -> Result<()> {
    println!("{} Starting Temuan API Server...", "[server]".cyan());
    let bind_address = config.bind_address()?;

    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Failed to install Prometheus recorder, /metrics disabled");
            None
        }
    };

    println!("  {} Database: {}", "→".green(), redacted(&app_config, &config));
    let db_pool = connect(&config.database_url).await?;
    println!("  {} Migrations complete", "✓".green());

    let admin = ensure_admin_user(&db_pool)
        .await
        .context("Failed to seed administrator")?;
    report_admin_seed(&admin);
    seed_categories(&db_pool)
        .await
        .context("Failed to seed categories")?;

    let storage = StorageService::new(app_config.storage_config());
    storage.init().await.with_context(|| {
        format!(
            "Failed to create upload directory {}",
            app_config.storage.upload_dir.display()
        )
    })?;
    println!(
        "  {} Uploads: {}",
        "→".green(),
        app_config.storage.upload_dir.display()
    );

    let trusted_proxies = if app_config.server.trusted_proxies.is_empty() {
        trusted_proxies_from_env()
    } else {
        app_config.server.trusted_proxies.clone()
    };
    if !trusted_proxies.is_empty() {
        info!(proxies = ?trusted_proxies, "Trusting forwarding headers from proxies");
    }
    let limiter = LoginRateLimiter::new().with_trusted_proxies(trusted_proxies);
    let _cleanup = spawn_cleanup_task(limiter.clone(), RATE_LIMIT_CLEANUP_INTERVAL);

    let mut state = AppState::new(db_pool, storage)
        .with_dashboard_config(app_config.dashboard_config())
        .with_login_rate_limiter(limiter);
    if let Some(handle) = prometheus {
        state = state.with_prometheus_handle(handle);
    }

    let server_config = ApiServerConfig {
        bind_address,
        request_timeout: Duration::from_secs(config.timeout_secs),
        enable_swagger: config.enable_swagger,
        shutdown_timeout: Duration::from_secs(30),
        cors_origins: app_config.server.cors_origins.clone(),
        session: app_config.session_config(),
    };

    println!();
    println!("{}", "Temuan API Server".bold());
    println!("{}", "═".repeat(40));
    println!("  {} http://{}", "Address:".cyan(), bind_address);
    if config.enable_swagger {
        println!(
            "  {} http://{}/swagger-ui",
            "Swagger UI:".cyan(),
            bind_address
        );
    }

    println!();
    println!("{}", "Endpoints:".bold());
    println!("  GET  /health                    - Health check");
    println!("  POST /api/auth/login            - Start a session");
    println!("  GET  /api/items                 - List found items");
    println!("  POST /api/items/:id/handover    - Hand an item over");
    println!("  POST /api/claims                - File a claim");
    println!("  POST /api/claims/:id/approve    - Approve a claim");
    println!("  GET  /api/dashboard/{{role}}      - Dashboards");
    println!("  POST /api/uploads               - Upload a photo");
    println!("  GET  /metrics                   - Prometheus metrics");
    println!();
    println!("Press {} to stop", "Ctrl+C".yellow());
    println!();

    info!(%bind_address, "Serving Temuan API");
    let server = ApiServer::new(state, server_config);
    server.run().await.context("Server error")?;

    println!();
    println!("{} Server stopped", "[server]".cyan());

    Ok(())
}

fn redacted(app_config: &AppConfig, config: &ServeConfig) -> String {
    let mut copy = app_config.clone();
    copy.database.url = config.database_url.clone();
    copy.redact_secrets().database.url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_config_from_app_config() {
        let mut app = AppConfig::default();
        app.server.port = 9090;
        app.server.host = "127.0.0.1".to_string();

        let config = ServeConfig::from_app_config(&app);
        assert_eq!(config.bind_address().unwrap().to_string(), "127.0.0.1:9090");
        assert_eq!(config.database_url, app.database.url);
    }

    #[test]
    fn test_invalid_bind_address() {
        let config = ServeConfig {
            host: "not a host".to_string(),
            ..ServeConfig::from_app_config(&AppConfig::default())
        };
        assert!(config.bind_address().is_err());
    }

    #[test]
    fn test_database_url_is_redacted() {
        let app = AppConfig::default();
        let config = ServeConfig {
            database_url: "postgres://temuan:rahasia@db/temuan".to_string(),
            ..ServeConfig::from_app_config(&app)
        };
        assert!(!redacted(&app, &config).contains("rahasia"));
    }
}
