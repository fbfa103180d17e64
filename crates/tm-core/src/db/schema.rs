//! Database schema migrations.
//!
//! Migrations are embedded at compile time from `migrations/sqlite` and
//! `migrations/postgres`; both trees describe the same tables.

use super::{DbError, DbPool};
use tracing::info;

/// Runs all pending migrations for the pool's backend.
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    match pool {
        DbPool::Sqlite(pool) => {
            info!("Running SQLite migrations");
            sqlx::migrate!("src/db/migrations/sqlite").run(pool).await?;
        }
        DbPool::Postgres(pool) => {
            info!("Running PostgreSQL migrations");
            sqlx::migrate!("src/db/migrations/postgres")
                .run(pool)
                .await?;
        }
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Tables created by the migrations, in dependency order.
pub const TABLES: &[&str] = &["users", "categories", "found_items", "claims"];
