//! Database seeders.
//!
//! Every seeder checks for existing data first, so running them on each
//! start is safe.

use super::{
    create_category_repository, create_claim_repository, create_item_repository,
    create_user_repository, DbError, DbPool,
};
use crate::auth::password::{hash_password, PasswordError};
use crate::auth::{Role, User, UserFilter};
use crate::category::{Category, DEFAULT_CATEGORIES};
use crate::claim::Claim;
use crate::item::{FoundItem, HandOver, ItemFilter, NewItem};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

/// Username of the bootstrap administrator.
pub const ADMIN_USERNAME: &str = "admin";
/// Email of the bootstrap administrator.
pub const ADMIN_EMAIL: &str = "admin@temuan.local";
/// Environment variable holding the bootstrap administrator's password.
pub const ADMIN_PASSWORD_ENV: &str = "TM_ADMIN_PASSWORD";

/// Demo accounts: (username, email, password, role, full name).
const DEMO_USERS: &[(&str, &str, &str, Role, &str)] = &[
    ("petugas", "petugas@temuan.local", "Petugas123", Role::Officer, "Budi Santoso"),
    ("mahasiswa", "mahasiswa@temuan.local", "Mahasiswa123", Role::User, "Citra Lestari"),
];

/// Demo items: (name, category, location, hours ago, description).
const DEMO_ITEMS: &[(&str, &str, &str, i64, &str)] = &[
    ("Dompet kulit coklat", "Dompet & Tas", "Kantin Pusat", 2, "Berisi KTM dan beberapa kartu"),
    ("Kunci motor Honda", "Kunci", "Parkiran Gedung B", 5, "Gantungan boneka kucing"),
    ("Charger laptop", "Elektronik", "Perpustakaan lt. 3", 26, "Merk Lenovo 65W"),
    ("Jas almamater", "Pakaian", "Aula Rektorat", 50, "Ukuran L"),
    ("Botol minum biru", "Botol & Wadah", "Masjid Kampus", 75, "Stiker fakultas teknik"),
    ("Kalkulator scientific", "Alat Tulis", "Ruang Kuliah C201", 120, "Casio fx-991"),
    ("Kacamata minus", "Aksesoris", "Lab Komputer 2", 200, "Frame hitam"),
];

/// Errors raised while seeding.
#[derive(Error, Debug)]
pub enum SeedError {
    #[error(transparent)]
    Database(#[from] DbError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Seed data references missing category '{0}'")]
    MissingCategory(String),
}

/// Outcome of [`ensure_admin_user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminSeed {
    /// An administrator already existed.
    Existing,
    /// The bootstrap admin was created. Holds the password when it was
    /// generated rather than taken from the environment.
    Created { generated_password: Option<String> },
}

/// Summary of what a seeding run created.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub admin_created: bool,
    pub categories_created: usize,
    pub users_created: usize,
    pub items_created: usize,
    pub claims_created: usize,
}

/// Creates the bootstrap administrator when no ADMIN account exists.
///
/// The password comes from `TM_ADMIN_PASSWORD`, or is generated and
/// returned so it can be shown once.
pub async fn ensure_admin_user(pool: &DbPool) -> Result<AdminSeed, SeedError> {
    let user_repo = create_user_repository(pool);

    let admins = user_repo
        .count(&UserFilter {
            role: Some(Role::Admin),
            ..Default::default()
        })
        .await?;
    if admins > 0 {
        info!("Admin account exists, skipping admin seed");
        return Ok(AdminSeed::Existing);
    }

    let (password, generated) = match std::env::var(ADMIN_PASSWORD_ENV) {
        Ok(password) if !password.is_empty() => (password, false),
        _ => {
            warn!("No {} set, generated random password", ADMIN_PASSWORD_ENV);
            (generate_secure_password(), true)
        }
    };

    let admin = User::new(
        ADMIN_EMAIL,
        ADMIN_USERNAME,
        hash_password(&password)?,
        Role::Admin,
        "Administrator",
    );
    user_repo.create(&admin).await?;

    info!(username = ADMIN_USERNAME, "Created default admin user");

    Ok(AdminSeed::Created {
        generated_password: generated.then_some(password),
    })
}

/// Inserts each default category whose name is not taken yet.
pub async fn seed_categories(pool: &DbPool) -> Result<usize, SeedError> {
    let repo = create_category_repository(pool);
    let mut created = 0;

    for (name, description) in DEFAULT_CATEGORIES {
        if repo.get_by_name(name).await?.is_some() {
            continue;
        }
        repo.create(&Category::new(*name, Some(description.to_string())))
            .await?;
        created += 1;
    }

    if created > 0 {
        info!(created, "Seeded default categories");
    }
    Ok(created)
}

/// Adds demo accounts and sample items to an empty installation.
///
/// Does nothing when any item exists.
pub async fn seed_demo_data(pool: &DbPool) -> Result<SeedReport, SeedError> {
    let mut report = SeedReport {
        categories_created: seed_categories(pool).await?,
        ..Default::default()
    };

    let items = create_item_repository(pool);
    if items.count(&ItemFilter::default()).await? > 0 {
        info!("Items already exist, skipping demo data");
        return Ok(report);
    }

    let users = create_user_repository(pool);
    let mut accounts = Vec::with_capacity(DEMO_USERS.len());
    for (username, email, password, role, full_name) in DEMO_USERS {
        let user = match users.get_by_username(username).await? {
            Some(user) => user,
            None => {
                let mut user = User::new(
                    *email,
                    *username,
                    hash_password(password)?,
                    *role,
                    *full_name,
                );
                user.identity_number =
                    Some(format!("{:08}", rand::thread_rng().gen_range(0..100_000_000)));
                report.users_created += 1;
                users.create(&user).await?
            }
        };
        accounts.push(user);
    }
    let officer = &accounts[0];
    let student = &accounts[1];

    let categories = create_category_repository(pool);
    let now = Utc::now();
    let mut first_item = None;
    let mut last_item = None;
    for (name, category, location, hours_ago, description) in DEMO_ITEMS {
        let category = categories
            .get_by_name(category)
            .await?
            .ok_or_else(|| SeedError::MissingCategory(category.to_string()))?;
        let item = FoundItem::new(
            NewItem {
                name: name.to_string(),
                description: Some(description.to_string()),
                category_id: category.id,
                found_location: location.to_string(),
                found_at: now - Duration::hours(*hours_ago),
                photo: None,
            },
            officer.id,
        );
        items.create(&item).await?;
        first_item.get_or_insert(item.id);
        last_item = Some(item.id);
        report.items_created += 1;
    }

    if let Some(item_id) = first_item {
        let claims = create_claim_repository(pool);
        claims
            .create(&Claim::new(
                item_id,
                student.id,
                "Dompet saya, ada KTM atas nama Citra Lestari di dalamnya",
                None,
            ))
            .await?;
        report.claims_created += 1;
    }

    // One returned item so every dashboard figure is populated.
    if let Some(item_id) = last_item.filter(|id| Some(*id) != first_item) {
        items
            .hand_over(
                item_id,
                officer.id,
                &HandOver {
                    claimant_id: Some(student.id),
                    claimant_name: student.full_name.clone(),
                    claimant_contact: Some(student.email.clone()),
                },
            )
            .await?;
    }

    info!(
        users = report.users_created,
        items = report.items_created,
        "Seeded demo data"
    );
    Ok(report)
}

/// Generates a 16-character password with upper, lower, digit and symbol.
fn generate_secure_password() -> String {
    const UPPER: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ";
    const LOWER: &[u8] = b"abcdefghijkmnpqrstuvwxyz";
    const DIGITS: &[u8] = b"23456789";
    const SPECIAL: &[u8] = b"!@#$%^&*";

    let mut rng = rand::thread_rng();
    let mut password: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL]
        .iter()
        .map(|set| set[rng.gen_range(0..set.len())])
        .collect();

    let all: Vec<u8> = [UPPER, LOWER, DIGITS, SPECIAL].concat();
    while password.len() < 16 {
        password.push(all[rng.gen_range(0..all.len())]);
    }

    for i in (1..password.len()).rev() {
        let j = rng.gen_range(0..=i);
        password.swap(i, j);
    }

    password.into_iter().map(char::from).collect()
}
