//! Startup validation of the Temuan configuration.
//!
//! Errors stop `temuan serve`; warnings are printed and startup continues.

use crate::config::AppConfig;
use colored::Colorize;
use tm_api::middleware::is_production_environment;
use tm_core::db::seed::ADMIN_PASSWORD_ENV;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Critical errors that prevent startup.
    pub errors: Vec<String>,
    /// Warnings that should be addressed but don't prevent startup.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Prints the validation result to the console.
    pub fn print(&self) {
        if !self.warnings.is_empty() {
            println!();
            println!("{}", "Configuration Warnings:".yellow().bold());
            for warning in &self.warnings {
                println!("  {} {}", "⚠".yellow(), warning);
            }
        }

        if !self.errors.is_empty() {
            println!();
            println!("{}", "Configuration Errors:".red().bold());
            for error in &self.errors {
                println!("  {} {}", "✗".red(), error);
            }
        }

        if self.errors.is_empty() && self.warnings.is_empty() {
            println!("  {} Configuration OK", "✓".green());
        }
    }
}

/// Validates application configuration before startup.
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        Self::validate_server(config, &mut result);
        Self::validate_database_url(config, &mut result);
        Self::validate_storage(config, &mut result);
        Self::validate_session(config, &mut result);
        Self::validate_dashboard(config, &mut result);

        result
    }

    fn validate_server(config: &AppConfig, result: &mut ValidationResult) {
        if config.server.port == 0 {
            result.add_error("server.port must be between 1 and 65535");
        }
        if config.server.request_timeout_secs == 0 {
            result.add_error("server.request_timeout_secs must be greater than 0");
        }
        for origin in &config.server.cors_origins {
            if !origin.starts_with("http://") && !origin.starts_with("https://") {
                result.add_error(format!(
                    "CORS origin '{}' must start with http:// or https://",
                    origin
                ));
            }
        }
    }

    fn validate_database_url(config: &AppConfig, result: &mut ValidationResult) {
        let url = &config.database.url;

        if url.is_empty() {
            result.add_error("database.url is empty");
            return;
        }

        let is_sqlite = url.starts_with("sqlite:");
        let is_postgres = url.starts_with("postgres://") || url.starts_with("postgresql://");
        if !is_sqlite && !is_postgres {
            result.add_error(format!(
                "Unsupported database URL '{}'. Use sqlite: or postgres://",
                url
            ));
            return;
        }

        if is_sqlite && url.contains(":memory:") {
            result.add_warning("Using an in-memory SQLite database. Data is lost on restart.");
        }
    }

    fn validate_storage(config: &AppConfig, result: &mut ValidationResult) {
        let storage = &config.storage;

        if storage.max_upload_bytes == 0 {
            result.add_error("storage.max_upload_bytes must be greater than 0");
        }
        if storage.allowed_extensions.is_empty() {
            result.add_error("storage.allowed_extensions is empty, no photo can be uploaded");
        }
        for ext in &storage.allowed_extensions {
            let ext = ext.trim_start_matches('.');
            if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                result.add_error(format!("Invalid upload extension '{}'", ext));
            }
        }

        if storage.upload_dir.exists() && !storage.upload_dir.is_dir() {
            result.add_error(format!(
                "storage.upload_dir '{}' exists and is not a directory",
                storage.upload_dir.display()
            ));
        }
    }

    fn validate_session(config: &AppConfig, result: &mut ValidationResult) {
        let session = &config.session;

        if session.cookie_name.is_empty()
            || !session
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            result.add_error(format!(
                "session.cookie_name '{}' must be non-empty and use only letters, digits, '_' or '-'",
                session.cookie_name
            ));
        }
        if session.inactivity_minutes == 0 {
            result.add_error("session.inactivity_minutes must be greater than 0");
        }

        if is_production_environment() {
            if !session.secure {
                result.add_warning(
                    "Session cookies are not marked Secure in production. \
                     Set session.secure: true when serving over HTTPS.",
                );
            }
            if std::env::var(ADMIN_PASSWORD_ENV).map_or(true, |v| v.is_empty()) {
                result.add_warning(format!(
                    "{} is not set. A random admin password is generated on first start.",
                    ADMIN_PASSWORD_ENV
                ));
            }
        }
    }

    fn validate_dashboard(config: &AppConfig, result: &mut ValidationResult) {
        let dashboard = &config.dashboard;

        if !(-12..=14).contains(&dashboard.utc_offset_hours) {
            result.add_error(format!(
                "dashboard.utc_offset_hours {} is outside -12..=14",
                dashboard.utc_offset_hours
            ));
        }
        if dashboard.recent_limit == 0 || dashboard.recent_limit > 100 {
            result.add_error("dashboard.recent_limit must be between 1 and 100");
        }
        if dashboard.popular_limit == 0 || dashboard.popular_limit > 50 {
            result.add_error("dashboard.popular_limit must be between 1 and 50");
        }
    }
}
