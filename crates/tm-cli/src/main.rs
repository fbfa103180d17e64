//! Temuan CLI
//!
//! Runs and administers the Temuan campus lost-and-found server.

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod config;
mod validator;

use commands::{run_migrate, run_seed, run_server, ServeConfig};
use config::AppConfig;
use tm_observability::logging::{init_logging_with_config, LoggingConfig};
use validator::ConfigValidator;

#[derive(Parser)]
#[command(name = "temuan")]
#[command(version)]
#[command(about = "Campus lost-and-found server", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: {}", s)),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Database URL (sqlite: or postgres://)
        #[arg(short, long)]
        database: Option<String>,

        /// Disable Swagger UI
        #[arg(long)]
        no_swagger: bool,

        /// Validate configuration and exit without starting the server
        #[arg(long)]
        validate_only: bool,
    },

    /// Apply database migrations
    Migrate {
        /// Database URL (sqlite: or postgres://)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Create the administrator account and default categories
    Seed {
        /// Also add demo accounts, items and a claim to an empty database
        #[arg(long)]
        demo: bool,

        /// Database URL (sqlite: or postgres://)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Validate configuration
    Validate,

    /// Show the effective configuration
    Config {
        /// Show secrets (redacted by default)
        #[arg(long)]
        show_secrets: bool,

        /// Write the effective configuration to the config file path
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config = AppConfig::load_or_default(&config_path)?;

    let logging = LoggingConfig {
        json_format: config.logging.json_format,
        ..Default::default()
    }
    .with_level_name(if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    });
    init_logging_with_config(logging);

    match cli.command {
        Commands::Serve {
            port,
            host,
            database,
            no_swagger,
            validate_only,
        } => {
            let mut serve = ServeConfig::from_app_config(&config);
            if let Some(port) = port {
                serve.port = port;
            }
            if let Some(host) = host {
                serve.host = host;
            }
            if let Some(database) = database {
                serve.database_url = database;
            }
            if no_swagger {
                serve.enable_swagger = false;
            }
            cmd_serve(serve, config, validate_only).await
        }
        Commands::Migrate { database } => {
            run_migrate(&database.unwrap_or_else(|| config.database.url.clone())).await
        }
        Commands::Seed { demo, database } => {
            run_seed(
                &database.unwrap_or_else(|| config.database.url.clone()),
                demo,
                cli.format == OutputFormat::Json,
            )
            .await
        }
        Commands::Validate => cmd_validate(&config, &config_path),
        Commands::Config { show_secrets, init } => {
            cmd_config(&config, &config_path, show_secrets, init, cli.format)
        }
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("id", "temuan", "temuan") {
        dirs.config_dir().join("config.yaml")
    } else {
        PathBuf::from("config/temuan.yaml")
    }
}

async fn cmd_serve(serve_config: ServeConfig, app_config: AppConfig, validate_only: bool) -> Result<()> {
    println!("{}", "Validating configuration...".cyan());

    let mut checked = app_config.clone();
    checked.database.url = serve_config.database_url.clone();
    let validation_result = ConfigValidator::validate(&checked);
    validation_result.print();

    if validation_result.has_errors() {
        println!();
        println!(
            "{}",
            "Server startup aborted due to configuration errors. Fix the errors above and try again."
                .red()
                .bold()
        );
        std::process::exit(1);
    }

    if validate_only {
        println!();
        println!(
            "{}",
            "Configuration is valid. Server can be started.".green().bold()
        );
        return Ok(());
    }

    println!();
    run_server(serve_config, app_config).await
}

fn cmd_validate(config: &AppConfig, config_path: &std::path::Path) -> Result<()> {
    println!(
        "{} {}",
        "Validating".cyan(),
        if config_path.exists() {
            config_path.display().to_string()
        } else {
            "built-in defaults".to_string()
        }
    );

    let result = ConfigValidator::validate(config);
    result.print();
    if result.has_errors() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_config(
    config: &AppConfig,
    config_path: &std::path::Path,
    show_secrets: bool,
    init: bool,
    format: OutputFormat,
) -> Result<()> {
    if init {
        config.save(config_path)?;
        println!(
            "{} Wrote configuration to {}",
            "✓".green(),
            config_path.display()
        );
        return Ok(());
    }

    let shown = if show_secrets {
        config.clone()
    } else {
        config.redact_secrets()
    };

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
    } else {
        println!("{} {}", "# Source:".dimmed(), config_path.display());
        print!("{}", serde_yaml::to_string(&shown)?);
    }
    Ok(())
}
