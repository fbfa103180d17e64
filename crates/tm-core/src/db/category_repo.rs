//! Category repository.

use super::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DbError, DbPool};
use crate::category::{Category, CategoryUpdate, CategoryWithCount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Repository trait for item categories.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(&self, category: &Category) -> Result<Category, DbError>;

    async fn get(&self, id: Uuid) -> Result<Option<Category>, DbError>;

    /// Finds a category by name, ignoring case.
    async fn get_by_name(&self, name: &str) -> Result<Option<Category>, DbError>;

    /// Lists categories ordered by name, with their item counts.
    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>, DbError>;

    async fn update(&self, id: Uuid, update: &CategoryUpdate) -> Result<Category, DbError>;

    /// Deletes a category. Fails with [`DbError::Constraint`] while items
    /// still use it.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;

    async fn count(&self) -> Result<u64, DbError>;
}

fn apply_update(existing: Category, update: &CategoryUpdate) -> Category {
    Category {
        name: update.name.clone().unwrap_or(existing.name),
        description: update.description.clone().unwrap_or(existing.description),
        updated_at: Utc::now(),
        ..existing
    }
}

pub struct SqliteCategoryRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteCategoryRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for SqliteCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category, DbError> {
        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(category.id.to_string())
        .bind(&category.name)
        .bind(&category.description)
        .bind(to_db_timestamp(&category.created_at))
        .bind(to_db_timestamp(&category.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(category.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Category>, DbError> {
        let row: Option<SqliteCategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at, updated_at FROM categories WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>, DbError> {
        let row: Option<SqliteCategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at, updated_at FROM categories WHERE LOWER(name) = LOWER(?)",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>, DbError> {
        let rows: Vec<SqliteCategoryCountRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.description, c.created_at, c.updated_at, COUNT(i.id) AS item_count
            FROM categories c
            LEFT JOIN found_items i ON i.category_id = c.id
            GROUP BY c.id, c.name, c.description, c.created_at, c.updated_at
            ORDER BY c.name COLLATE NOCASE ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CategoryWithCount {
                    item_count: row.item_count as u64,
                    category: SqliteCategoryRow {
                        id: row.id,
                        name: row.name,
                        description: row.description,
                        created_at: row.created_at,
                        updated_at: row.updated_at,
                    }
                    .try_into()?,
                })
            })
            .collect()
    }

    async fn update(&self, id: Uuid, update: &CategoryUpdate) -> Result<Category, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;
        let category = apply_update(existing, update);

        sqlx::query("UPDATE categories SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&category.name)
            .bind(&category.description)
            .bind(to_db_timestamp(&category.updated_at))
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(category)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

pub struct PgCategoryRepository {
    pool: sqlx::PgPool,
}

impl PgCategoryRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn create(&self, category: &Category) -> Result<Category, DbError> {
        sqlx::query(
            "INSERT INTO categories (id, name, description, created_at, updated_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(category.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Category>, DbError> {
        let row: Option<PgCategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Category>, DbError> {
        let row: Option<PgCategoryRow> = sqlx::query_as(
            "SELECT id, name, description, created_at, updated_at FROM categories WHERE LOWER(name) = LOWER($1)",
        )
        .bind(name.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_with_counts(&self) -> Result<Vec<CategoryWithCount>, DbError> {
        let rows: Vec<PgCategoryCountRow> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, c.description, c.created_at, c.updated_at, COUNT(i.id) AS item_count
            FROM categories c
            LEFT JOIN found_items i ON i.category_id = c.id
            GROUP BY c.id
            ORDER BY LOWER(c.name) ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CategoryWithCount {
                item_count: row.item_count as u64,
                category: Category {
                    id: row.id,
                    name: row.name,
                    description: row.description,
                    created_at: row.created_at,
                    updated_at: row.updated_at,
                },
            })
            .collect())
    }

    async fn update(&self, id: Uuid, update: &CategoryUpdate) -> Result<Category, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))?;
        let category = apply_update(existing, update);

        sqlx::query(
            "UPDATE categories SET name = $1, description = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

/// Factory function to create the appropriate repository based on pool type.
pub fn create_category_repository(pool: &DbPool) -> Box<dyn CategoryRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteCategoryRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgCategoryRepository::new(pool.clone())),
    }
}

#[derive(sqlx::FromRow)]
struct SqliteCategoryRow {
    id: String,
    name: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SqliteCategoryRow> for Category {
    type Error = DbError;

    fn try_from(row: SqliteCategoryRow) -> Result<Self, Self::Error> {
        Ok(Category {
            id: parse_db_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            created_at: parse_db_timestamp(&row.created_at)?,
            updated_at: parse_db_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SqliteCategoryCountRow {
    id: String,
    name: String,
    description: Option<String>,
    created_at: String,
    updated_at: String,
    item_count: i64,
}

#[derive(sqlx::FromRow)]
struct PgCategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PgCategoryRow> for Category {
    fn from(row: PgCategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PgCategoryCountRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    item_count: i64,
}
