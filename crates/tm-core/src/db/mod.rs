//! Database layer for Temuan.
//!
//! Persistence for users, categories, found items and claims using SQLx,
//! with SQLite for single-server installs and tests and PostgreSQL for
//! larger deployments. Every repository is a trait with one implementation
//! per backend, chosen by the `create_*_repository` factories.

mod error;
pub mod pagination;
mod pool;
mod schema;

pub mod category_repo;
pub mod claim_repo;
pub mod dashboard_repo;
pub mod item_repo;
pub mod seed;
pub mod user_repo;

pub use error::DbError;
pub use pagination::{PaginatedResult, Pagination, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use pool::{
    create_pool, create_pool_with_options, escape_like_pattern, make_like_pattern,
    parse_db_timestamp, parse_db_uuid, to_db_timestamp, DbPool, PoolOptions,
};
pub use schema::{run_migrations, TABLES};

// Re-export repository traits
pub use category_repo::CategoryRepository;
pub use claim_repo::ClaimRepository;
pub use dashboard_repo::DashboardRepository;
pub use item_repo::ItemRepository;
pub use user_repo::UserRepository;

// Re-export factory functions
pub use category_repo::create_category_repository;
pub use claim_repo::create_claim_repository;
pub use dashboard_repo::create_dashboard_repository;
pub use item_repo::create_item_repository;
pub use user_repo::create_user_repository;

pub use seed::{ensure_admin_user, seed_categories, seed_demo_data, AdminSeed, SeedError, SeedReport};
