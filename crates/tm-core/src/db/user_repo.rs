//! User repository for database operations.

use super::pool::Placeholders;
use super::{make_like_pattern, parse_db_timestamp, parse_db_uuid, to_db_timestamp, DbError, DbPool};
use crate::auth::{Role, User, UserFilter, UserUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, password_hash, role, full_name, identity_number, phone, enabled, last_login_at, created_at, updated_at";

/// Repository trait for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Creates a new user.
    async fn create(&self, user: &User) -> Result<User, DbError>;

    /// Gets a user by ID.
    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError>;

    /// Gets a user by email, ignoring case.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError>;

    /// Gets a user by username, ignoring case.
    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DbError>;

    /// Gets a user by username or email.
    async fn get_by_login(&self, login: &str) -> Result<Option<User>, DbError>;

    /// Lists users ordered by username.
    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DbError>;

    /// Updates a user.
    async fn update(&self, id: Uuid, update: &UserUpdate) -> Result<User, DbError>;

    /// Updates a user's password hash.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), DbError>;

    /// Updates a user's last login timestamp.
    async fn update_last_login(&self, id: Uuid) -> Result<(), DbError>;

    /// Deletes a user. Fails with [`DbError::Constraint`] while items or
    /// claims still reference the account.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;

    /// Counts users matching a filter.
    async fn count(&self, filter: &UserFilter) -> Result<u64, DbError>;
}

/// Builds the WHERE clause for a user filter.
fn user_conditions(filter: &UserFilter, ph: &mut Placeholders) -> String {
    let mut conditions = vec!["1=1".to_string()];

    if filter.role.is_some() {
        conditions.push(format!("role = {}", ph.next()));
    }
    if filter.enabled.is_some() {
        conditions.push(format!("enabled = {}", ph.next()));
    }
    if filter.search.is_some() {
        conditions.push(format!(
            "(LOWER(username) LIKE LOWER({a}) ESCAPE '\\' OR LOWER(email) LIKE LOWER({b}) ESCAPE '\\' OR LOWER(full_name) LIKE LOWER({c}) ESCAPE '\\')",
            a = ph.next(),
            b = ph.next(),
            c = ph.next()
        ));
    }

    conditions.join(" AND ")
}

/// Binds filter values in the order produced by [`user_conditions`].
macro_rules! bind_user_filter {
    ($query:expr, $filter:expr) => {{
        let mut query = $query;
        if let Some(role) = &$filter.role {
            query = query.bind(role.as_str());
        }
        if let Some(enabled) = $filter.enabled {
            query = query.bind(enabled);
        }
        if let Some(search) = &$filter.search {
            let pattern = make_like_pattern(search);
            query = query.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
        }
        query
    }};
}

/// Resolves an update against the current record.
fn apply_update(existing: User, update: &UserUpdate) -> User {
    User {
        email: update.email.clone().unwrap_or(existing.email),
        username: update.username.clone().unwrap_or(existing.username),
        role: update.role.unwrap_or(existing.role),
        full_name: update.full_name.clone().unwrap_or(existing.full_name),
        identity_number: update
            .identity_number
            .clone()
            .unwrap_or(existing.identity_number),
        phone: update.phone.clone().unwrap_or(existing.phone),
        enabled: update.enabled.unwrap_or(existing.enabled),
        updated_at: Utc::now(),
        ..existing
    }
}

/// SQLite implementation of UserRepository.
pub struct SqliteUserRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, condition: &str, value: &str) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
        let row: Option<SqliteUserRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create(&self, user: &User) -> Result<User, DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, role, full_name, identity_number, phone, enabled, last_login_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(&user.identity_number)
        .bind(&user.phone)
        .bind(user.enabled)
        .bind(user.last_login_at.as_ref().map(to_db_timestamp))
        .bind(to_db_timestamp(&user.created_at))
        .bind(to_db_timestamp(&user.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(user.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError> {
        self.fetch_one_where("id = ?", &id.to_string()).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        self.fetch_one_where("LOWER(email) = LOWER(?)", email).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        self.fetch_one_where("LOWER(username) = LOWER(?)", username)
            .await
    }

    async fn get_by_login(&self, login: &str) -> Result<Option<User>, DbError> {
        match self.get_by_username(login).await? {
            Some(user) => Ok(Some(user)),
            None => self.get_by_email(login).await,
        }
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DbError> {
        let query = format!(
            "SELECT {} FROM users WHERE {} ORDER BY username ASC",
            USER_COLUMNS,
            user_conditions(filter, &mut Placeholders::sqlite())
        );

        let rows: Vec<SqliteUserRow> =
            bind_user_filter!(sqlx::query_as::<_, SqliteUserRow>(&query), filter)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &UserUpdate) -> Result<User, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;
        let user = apply_update(existing, update);

        sqlx::query(
            r#"
            UPDATE users SET email = ?, username = ?, role = ?, full_name = ?, identity_number = ?, phone = ?, enabled = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(&user.identity_number)
        .bind(&user.phone)
        .bind(user.enabled)
        .bind(to_db_timestamp(&user.updated_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), DbError> {
        let result = sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(to_db_timestamp(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(to_db_timestamp(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, DbError> {
        let query = format!(
            "SELECT COUNT(*) FROM users WHERE {}",
            user_conditions(filter, &mut Placeholders::sqlite())
        );

        let count: i64 = bind_user_filter!(sqlx::query_scalar::<_, i64>(&query), filter)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// PostgreSQL implementation of UserRepository.
pub struct PgUserRepository {
    pool: sqlx::PgPool,
}

impl PgUserRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_where(&self, condition: &str, value: &str) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
        let row: Option<PgUserRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> Result<User, DbError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, role, full_name, identity_number, phone, enabled, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(&user.identity_number)
        .bind(&user.phone)
        .bind(user.enabled)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(user.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<User>, DbError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<PgUserRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        self.fetch_one_where("LOWER(email) = LOWER($1)", email).await
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        self.fetch_one_where("LOWER(username) = LOWER($1)", username)
            .await
    }

    async fn get_by_login(&self, login: &str) -> Result<Option<User>, DbError> {
        match self.get_by_username(login).await? {
            Some(user) => Ok(Some(user)),
            None => self.get_by_email(login).await,
        }
    }

    async fn list(&self, filter: &UserFilter) -> Result<Vec<User>, DbError> {
        let query = format!(
            "SELECT {} FROM users WHERE {} ORDER BY username ASC",
            USER_COLUMNS,
            user_conditions(filter, &mut Placeholders::postgres())
        );

        let rows: Vec<PgUserRow> = bind_user_filter!(sqlx::query_as::<_, PgUserRow>(&query), filter)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(&self, id: Uuid, update: &UserUpdate) -> Result<User, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))?;
        let user = apply_update(existing, update);

        sqlx::query(
            r#"
            UPDATE users SET email = $1, username = $2, role = $3, full_name = $4, identity_number = $5, phone = $6, enabled = $7, updated_at = $8
            WHERE id = $9
            "#,
        )
        .bind(&user.email)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(&user.full_name)
        .bind(&user.identity_number)
        .bind(&user.phone)
        .bind(user.enabled)
        .bind(user.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), DbError> {
        let result =
            sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
                .bind(password_hash)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        Ok(())
    }

    async fn update_last_login(&self, id: Uuid) -> Result<(), DbError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, filter: &UserFilter) -> Result<u64, DbError> {
        let query = format!(
            "SELECT COUNT(*) FROM users WHERE {}",
            user_conditions(filter, &mut Placeholders::postgres())
        );

        let count: i64 = bind_user_filter!(sqlx::query_scalar::<_, i64>(&query), filter)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Factory function to create the appropriate repository based on pool type.
pub fn create_user_repository(pool: &DbPool) -> Box<dyn UserRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteUserRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgUserRepository::new(pool.clone())),
    }
}

fn parse_role(value: &str) -> Result<Role, DbError> {
    value
        .parse::<Role>()
        .map_err(|_| DbError::Serialization(format!("Invalid role: {}", value)))
}

#[derive(sqlx::FromRow)]
struct SqliteUserRow {
    id: String,
    email: String,
    username: String,
    password_hash: String,
    role: String,
    full_name: String,
    identity_number: Option<String>,
    phone: Option<String>,
    enabled: bool,
    last_login_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SqliteUserRow> for User {
    type Error = DbError;

    fn try_from(row: SqliteUserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: parse_db_uuid(&row.id)?,
            role: parse_role(&row.role)?,
            last_login_at: row
                .last_login_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
            created_at: parse_db_timestamp(&row.created_at)?,
            updated_at: parse_db_timestamp(&row.updated_at)?,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            full_name: row.full_name,
            identity_number: row.identity_number,
            phone: row.phone,
            enabled: row.enabled,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PgUserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    role: String,
    full_name: String,
    identity_number: Option<String>,
    phone: Option<String>,
    enabled: bool,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PgUserRow> for User {
    type Error = DbError;

    fn try_from(row: PgUserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: parse_role(&row.role)?,
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            full_name: row.full_name,
            identity_number: row.identity_number,
            phone: row.phone,
            enabled: row.enabled,
            last_login_at: row.last_login_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_follow_bind_order() {
        let filter = UserFilter {
            role: Some(Role::Officer),
            enabled: Some(true),
            search: Some("budi".to_string()),
        };
        let sql = user_conditions(&filter, &mut Placeholders::postgres());

        assert!(sql.contains("role = $1"));
        assert!(sql.contains("enabled = $2"));
        assert!(sql.contains("LOWER($5)"));
    }

    #[test]
    fn test_apply_update_clears_nullable_fields() {
        let mut user = User::new("a@kampus.ac.id", "andi", "h", Role::User, "Andi");
        user.phone = Some("0812".to_string());

        let updated = apply_update(
            user.clone(),
            &UserUpdate {
                phone: Some(None),
                full_name: Some("Andi Wijaya".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(updated.phone, None);
        assert_eq!(updated.full_name, "Andi Wijaya");
        assert_eq!(updated.email, user.email);
        assert_eq!(updated.id, user.id);
    }
}
