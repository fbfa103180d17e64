//! Database maintenance commands: `migrate` and `seed`.

use anyhow::{Context, Result};
use colored::Colorize;

use tm_core::db::{
    create_pool, ensure_admin_user, run_migrations, seed_categories, seed_demo_data, AdminSeed,
    DbPool,
};

/// Opens the database and applies migrations.
pub async fn connect(database_url: &str) -> Result<DbPool> {
    let pool = create_pool(database_url)
        .await
        .context("Failed to create database connection pool")?;
    run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(pool)
}

/// Prints the outcome of the bootstrap admin seed.
pub fn report_admin_seed(seed: &AdminSeed) {
    match seed {
        AdminSeed::Existing => {}
        AdminSeed::Created {
            generated_password: Some(password),
        } => {
            println!();
            println!("{}", "Created administrator account".yellow().bold());
            println!("  {} admin", "Username:".cyan());
            println!("  {} {}", "Password:".cyan(), password.bold());
            println!(
                "  {}",
                "This password is shown once. Change it after logging in.".yellow()
            );
            println!();
        }
        AdminSeed::Created {
            generated_password: None,
        } => {
            println!(
                "  {} Created administrator 'admin' with TM_ADMIN_PASSWORD",
                "✓".green()
            );
        }
    }
}

pub async fn run_migrate(database_url: &str) -> Result<()> {
    println!("{} Running migrations on {}", "[db]".cyan(), database_url);
    connect(database_url).await?;
    println!("  {} Migrations complete", "✓".green());
    Ok(())
}

/// Seeds the admin account and categories, plus demo data when `demo` is set.
pub async fn run_seed(database_url: &str, demo: bool, json: bool) -> Result<()> {
    let pool = connect(database_url).await?;

    let admin = ensure_admin_user(&pool)
        .await
        .context("Failed to seed administrator")?;

    let report = if demo {
        seed_demo_data(&pool)
            .await
            .context("Failed to seed demo data")?
    } else {
        tm_core::db::SeedReport {
            categories_created: seed_categories(&pool)
                .await
                .context("Failed to seed categories")?,
            ..Default::default()
        }
    };
    let report = tm_core::db::SeedReport {
        admin_created: matches!(admin, AdminSeed::Created { .. }),
        ..report
    };

    if json {
        let generated_password = match &admin {
            AdminSeed::Created { generated_password } => generated_password.clone(),
            AdminSeed::Existing => None,
        };
        let output = serde_json::json!({
            "report": report,
            "generated_admin_password": generated_password,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    report_admin_seed(&admin);
    println!("{}", "Seed complete".green().bold());
    println!("  Categories created: {}", report.categories_created);
    if demo {
        println!("  Users created:      {}", report.users_created);
        println!("  Items created:      {}", report.items_created);
        println!("  Claims created:     {}", report.claims_created);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_core::db::create_user_repository;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("temuan.db").display());

        run_seed(&url, true, true).await.unwrap();
        run_seed(&url, true, true).await.unwrap();

        let pool = connect(&url).await.unwrap();
        let users = create_user_repository(&pool);
        assert!(users.get_by_username("admin").await.unwrap().is_some());
        assert!(users.get_by_username("petugas").await.unwrap().is_some());
    }
}
