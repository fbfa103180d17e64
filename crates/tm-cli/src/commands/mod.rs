//! Subcommand implementations.

mod database;
mod serve;

pub use database::{connect, run_migrate, run_seed};
pub use serve::{run_server, ServeConfig};
