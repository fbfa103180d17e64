//! Users, roles and session data.
//!
//! Three roles exist on campus: administrators manage accounts and
//! categories, officers (`PETUGAS`) log found items and process claims, and
//! regular users (students and staff) browse items and file claims.

pub mod password;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// User role for role-based access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    /// Full access, including user and category management.
    #[serde(rename = "ADMIN")]
    Admin,
    /// Campus officer who records found items and hands them back.
    #[serde(rename = "PETUGAS")]
    Officer,
    /// Student or staff member looking for a lost item.
    #[serde(rename = "USER")]
    #[default]
    User,
}

impl Role {
    /// All roles, highest privilege first.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Officer, Role::User];

    /// Returns the stored/wire name of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Officer => "PETUGAS",
            Role::User => "USER",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Role::Admin => 2,
            Role::Officer => 1,
            Role::User => 0,
        }
    }

    /// Returns true if this role includes the privileges of `required`.
    pub fn has_permission(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "petugas" | "officer" => Ok(Role::Officer),
            "user" => Ok(Role::User),
            _ => Err(()),
        }
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Email address (unique).
    pub email: String,
    /// Login name (unique).
    pub username: String,
    /// Argon2 PHC hash; never serialized.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub full_name: String,
    /// Student (NIM) or staff (NIP) number.
    pub identity_number: Option<String>,
    pub phone: Option<String>,
    pub enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Creates an enabled user with the given credentials.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
        full_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            username: username.into(),
            password_hash: password_hash.into(),
            role,
            full_name: full_name.into(),
            identity_number: None,
            phone: None,
            enabled: true,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the user has at least the given role's privileges.
    pub fn has_permission(&self, required: Role) -> bool {
        self.role.has_permission(required)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Officers and admins may record and hand over items.
    pub fn is_staff(&self) -> bool {
        self.has_permission(Role::Officer)
    }
}

/// Partial update for a user. `None` leaves the field untouched; for
/// nullable fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Option<Role>,
    pub full_name: Option<String>,
    pub identity_number: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub enabled: Option<bool>,
}

/// Filter for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub enabled: Option<bool>,
    /// Matches username, email or full name.
    pub search: Option<String>,
}

/// Data kept in the server-side session of a logged-in user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub logged_in_at: DateTime<Utc>,
}

impl SessionData {
    pub fn new(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            logged_in_at: Utc::now(),
        }
    }
}
