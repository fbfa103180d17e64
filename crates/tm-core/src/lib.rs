//! # tm-core
//!
//! Domain models and persistence for Temuan, a campus lost-and-found
//! service.
//!
//! Officers record found items (barang temuan), users file claims for
//! them, and items are handed back either directly or by approving a claim.
//! This crate holds those models, the repositories that store them, the
//! dashboard aggregation, the seeders and the photo storage service.

pub mod auth;
pub mod category;
pub mod claim;
pub mod dashboard;
pub mod item;
pub mod storage;

#[cfg(feature = "database")]
pub mod db;

pub use category::{Category, CategoryUpdate, CategoryWithCount};
pub use claim::{Claim, ClaimDetail, ClaimFilter, ClaimStatus};
pub use dashboard::{AdminDashboard, DashboardConfig, OfficerDashboard, UserDashboard};
pub use item::{FoundItem, HandOver, ItemDetail, ItemFilter, ItemStatus, ItemUpdate, NewItem};
pub use storage::{StorageConfig, StorageError, StorageService, StoredFile};

#[cfg(feature = "database")]
pub use dashboard::DashboardService;

// Auth exports
pub use auth::password::{
    hash_password, validate_password_strength, verify_password, PasswordError,
};
pub use auth::{Role, SessionData, User, UserFilter, UserUpdate};
