//! Shared fixtures for the database integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::time::Duration as StdDuration;
use tm_core::db::{
    create_category_repository, create_item_repository, create_pool_with_options,
    create_user_repository, run_migrations, DbPool, PoolOptions,
};
use tm_core::{Category, FoundItem, NewItem, Role, User};
use uuid::Uuid;

/// Creates an isolated, migrated in-memory SQLite database.
pub async fn test_pool() -> DbPool {
    let db_url = format!(
        "sqlite:file:test_{}?mode=memory&cache=shared",
        Uuid::new_v4().simple()
    );
    let options = PoolOptions {
        max_connections: 1,
        min_connections: 1,
        acquire_timeout: StdDuration::from_secs(5),
        max_lifetime: None,
        idle_timeout: None,
    };

    let pool = create_pool_with_options(&db_url, options)
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

pub async fn create_user(pool: &DbPool, username: &str, role: Role) -> User {
    let user = User::new(
        format!("{}@kampus.ac.id", username),
        username,
        "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2hoYXNo",
        role,
        format!("Pengguna {}", username),
    );
    create_user_repository(pool)
        .create(&user)
        .await
        .expect("Failed to create user")
}

pub async fn create_category(pool: &DbPool, name: &str) -> Category {
    create_category_repository(pool)
        .create(&Category::new(name, None))
        .await
        .expect("Failed to create category")
}

pub async fn record_item(
    pool: &DbPool,
    name: &str,
    category: &Category,
    officer: &User,
    hours_ago: i64,
) -> FoundItem {
    let item = FoundItem::new(
        NewItem {
            name: name.to_string(),
            description: None,
            category_id: category.id,
            found_location: "Gedung Rektorat".to_string(),
            found_at: Utc::now() - Duration::hours(hours_ago),
            photo: None,
        },
        officer.id,
    );
    create_item_repository(pool)
        .create(&item)
        .await
        .expect("Failed to create item")
}
