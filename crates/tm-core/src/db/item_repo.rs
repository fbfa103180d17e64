//! Found-item repository.
//!
//! Handing an item over and rejecting the claims still open on it always
//! happen in one transaction; the helpers at the bottom of this module are
//! shared with the claim repository, which does the same when approving.

use super::pagination::Pagination;
use super::pool::Placeholders;
use super::{make_like_pattern, parse_db_timestamp, parse_db_uuid, to_db_timestamp, DbError, DbPool};
use crate::claim::AUTO_REJECT_NOTE;
use crate::item::{FoundItem, HandOver, ItemDetail, ItemFilter, ItemStatus, ItemUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

const ITEM_COLUMNS: &str = "i.id, i.name, i.description, i.category_id, i.found_location, i.found_at, i.photo, i.status, i.recorded_by, i.handed_over_by, i.claimant_id, i.claimant_name, i.claimant_contact, i.handed_over_at, i.created_at, i.updated_at";

const DETAIL_JOINS: &str = "FROM found_items i JOIN categories c ON c.id = i.category_id JOIN users r ON r.id = i.recorded_by LEFT JOIN users h ON h.id = i.handed_over_by";

/// Repository trait for found items.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn create(&self, item: &FoundItem) -> Result<FoundItem, DbError>;

    async fn get(&self, id: Uuid) -> Result<Option<FoundItem>, DbError>;

    /// Gets an item with its category, pencatat and penyerah names.
    async fn get_detail(&self, id: Uuid) -> Result<Option<ItemDetail>, DbError>;

    /// Lists items, newest `found_at` first.
    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: &Pagination,
    ) -> Result<Vec<ItemDetail>, DbError>;

    async fn count(&self, filter: &ItemFilter) -> Result<u64, DbError>;

    /// Updates descriptive fields; never touches status or handover data.
    async fn update(&self, id: Uuid, update: &ItemUpdate) -> Result<FoundItem, DbError>;

    /// Marks an unclaimed item as returned and rejects its pending claims.
    ///
    /// Fails with [`DbError::Conflict`] when the item was already returned.
    async fn hand_over(
        &self,
        id: Uuid,
        officer_id: Uuid,
        hand_over: &HandOver,
    ) -> Result<FoundItem, DbError>;

    /// Deletes an item together with its claims.
    async fn delete(&self, id: Uuid) -> Result<bool, DbError>;

    /// Counts item photos and claim proof photos pointing at `filename`.
    async fn photo_references(&self, filename: &str) -> Result<u64, DbError>;
}

const PHOTO_REFERENCES_SQLITE: &str = "SELECT (SELECT COUNT(*) FROM found_items WHERE photo = ?1) + (SELECT COUNT(*) FROM claims WHERE proof_photo = ?1)";

const PHOTO_REFERENCES_PG: &str = "SELECT (SELECT COUNT(*) FROM found_items WHERE photo = $1) + (SELECT COUNT(*) FROM claims WHERE proof_photo = $1)";

fn item_conditions(filter: &ItemFilter, ph: &mut Placeholders) -> String {
    let mut conditions = vec!["1=1".to_string()];

    if filter.status.is_some() {
        conditions.push(format!("i.status = {}", ph.next()));
    }
    if filter.category_id.is_some() {
        conditions.push(format!("i.category_id = {}", ph.next()));
    }
    if filter.search.is_some() {
        conditions.push(format!(
            "(LOWER(i.name) LIKE LOWER({a}) ESCAPE '\\' OR LOWER(i.description) LIKE LOWER({b}) ESCAPE '\\' OR LOWER(i.found_location) LIKE LOWER({c}) ESCAPE '\\')",
            a = ph.next(),
            b = ph.next(),
            c = ph.next()
        ));
    }
    if filter.found_from.is_some() {
        conditions.push(format!("i.found_at >= {}", ph.next()));
    }
    if filter.found_until.is_some() {
        conditions.push(format!("i.found_at <= {}", ph.next()));
    }
    if filter.recorded_by.is_some() {
        conditions.push(format!("i.recorded_by = {}", ph.next()));
    }

    conditions.join(" AND ")
}

/// Binds filter values in the order produced by [`item_conditions`], using
/// the backend's representation for ids and timestamps.
macro_rules! bind_item_filter {
    ($query:expr, $filter:expr, $uuid:expr, $time:expr) => {{
        let mut query = $query;
        if let Some(status) = $filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(category_id) = $filter.category_id {
            query = query.bind($uuid(category_id));
        }
        if let Some(search) = &$filter.search {
            let pattern = make_like_pattern(search);
            query = query.bind(pattern.clone()).bind(pattern.clone()).bind(pattern);
        }
        if let Some(from) = &$filter.found_from {
            query = query.bind($time(from));
        }
        if let Some(until) = &$filter.found_until {
            query = query.bind($time(until));
        }
        if let Some(recorded_by) = $filter.recorded_by {
            query = query.bind($uuid(recorded_by));
        }
        query
    }};
}

fn apply_update(existing: FoundItem, update: &ItemUpdate) -> FoundItem {
    FoundItem {
        name: update.name.clone().unwrap_or(existing.name),
        description: update.description.clone().unwrap_or(existing.description),
        category_id: update.category_id.unwrap_or(existing.category_id),
        found_location: update
            .found_location
            .clone()
            .unwrap_or(existing.found_location),
        found_at: update.found_at.unwrap_or(existing.found_at),
        photo: update.photo.clone().unwrap_or(existing.photo),
        updated_at: Utc::now(),
        ..existing
    }
}

fn parse_status(value: &str) -> Result<ItemStatus, DbError> {
    value.parse::<ItemStatus>().map_err(DbError::Serialization)
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

pub struct SqliteItemRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteItemRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for SqliteItemRepository {
    async fn create(&self, item: &FoundItem) -> Result<FoundItem, DbError> {
        sqlx::query(
            r#"
            INSERT INTO found_items (id, name, description, category_id, found_location, found_at, photo, status, recorded_by, handed_over_by, claimant_id, claimant_name, claimant_contact, handed_over_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id.to_string())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category_id.to_string())
        .bind(&item.found_location)
        .bind(to_db_timestamp(&item.found_at))
        .bind(&item.photo)
        .bind(item.status.as_str())
        .bind(item.recorded_by.to_string())
        .bind(item.handed_over_by.map(|id| id.to_string()))
        .bind(item.claimant_id.map(|id| id.to_string()))
        .bind(&item.claimant_name)
        .bind(&item.claimant_contact)
        .bind(item.handed_over_at.as_ref().map(to_db_timestamp))
        .bind(to_db_timestamp(&item.created_at))
        .bind(to_db_timestamp(&item.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(item.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FoundItem>, DbError> {
        let query = format!("SELECT {} FROM found_items i WHERE i.id = ?", ITEM_COLUMNS);
        let row: Option<SqliteItemRow> = sqlx::query_as(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_detail(&self, id: Uuid) -> Result<Option<ItemDetail>, DbError> {
        let query = format!(
            "SELECT {}, c.name AS category_name, r.full_name AS recorded_by_name, h.full_name AS handed_over_by_name {} WHERE i.id = ?",
            ITEM_COLUMNS, DETAIL_JOINS
        );
        let row: Option<SqliteItemDetailRow> = sqlx::query_as(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: &Pagination,
    ) -> Result<Vec<ItemDetail>, DbError> {
        let query = format!(
            "SELECT {}, c.name AS category_name, r.full_name AS recorded_by_name, h.full_name AS handed_over_by_name {} WHERE {} ORDER BY i.found_at DESC, i.created_at DESC LIMIT ? OFFSET ?",
            ITEM_COLUMNS,
            DETAIL_JOINS,
            item_conditions(filter, &mut Placeholders::sqlite())
        );

        let rows: Vec<SqliteItemDetailRow> = bind_item_filter!(
            sqlx::query_as::<_, SqliteItemDetailRow>(&query),
            filter,
            |id: Uuid| id.to_string(),
            to_db_timestamp
        )
        .bind(pagination.limit() as i64)
        .bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, filter: &ItemFilter) -> Result<u64, DbError> {
        let query = format!(
            "SELECT COUNT(*) FROM found_items i WHERE {}",
            item_conditions(filter, &mut Placeholders::sqlite())
        );

        let count: i64 = bind_item_filter!(
            sqlx::query_scalar::<_, i64>(&query),
            filter,
            |id: Uuid| id.to_string(),
            to_db_timestamp
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn update(&self, id: Uuid, update: &ItemUpdate) -> Result<FoundItem, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("FoundItem", id))?;
        let item = apply_update(existing, update);

        sqlx::query(
            r#"
            UPDATE found_items SET name = ?, description = ?, category_id = ?, found_location = ?, found_at = ?, photo = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category_id.to_string())
        .bind(&item.found_location)
        .bind(to_db_timestamp(&item.found_at))
        .bind(&item.photo)
        .bind(to_db_timestamp(&item.updated_at))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    async fn hand_over(
        &self,
        id: Uuid,
        officer_id: Uuid,
        hand_over: &HandOver,
    ) -> Result<FoundItem, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlite_mark_returned(&mut tx, id, officer_id, hand_over, now).await?;
        let rejected =
            sqlite_reject_pending_claims(&mut tx, id, officer_id, AUTO_REJECT_NOTE, now).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        debug!(item_id = %id, rejected, "Item handed over");

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("FoundItem", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM found_items WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn photo_references(&self, filename: &str) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar(PHOTO_REFERENCES_SQLITE)
            .bind(filename)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

/// Sets an unclaimed item to returned inside an open transaction.
pub(super) async fn sqlite_mark_returned(
    conn: &mut sqlx::SqliteConnection,
    id: Uuid,
    officer_id: Uuid,
    hand_over: &HandOver,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let now = to_db_timestamp(&now);
    let result = sqlx::query(
        r#"
        UPDATE found_items
        SET status = ?, handed_over_by = ?, handed_over_at = ?, claimant_id = ?, claimant_name = ?, claimant_contact = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(ItemStatus::Returned.as_str())
    .bind(officer_id.to_string())
    .bind(&now)
    .bind(hand_over.claimant_id.map(|id| id.to_string()))
    .bind(&hand_over.claimant_name)
    .bind(&hand_over.claimant_contact)
    .bind(&now)
    .bind(id.to_string())
    .bind(ItemStatus::Unclaimed.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<String> = sqlx::query_scalar("SELECT status FROM found_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match exists {
            Some(_) => DbError::Conflict("Item has already been handed over".to_string()),
            None => DbError::not_found("FoundItem", id),
        });
    }

    Ok(())
}

/// Rejects every pending claim on an item inside an open transaction.
pub(super) async fn sqlite_reject_pending_claims(
    conn: &mut sqlx::SqliteConnection,
    item_id: Uuid,
    reviewer_id: Uuid,
    note: &str,
    now: DateTime<Utc>,
) -> Result<u64, DbError> {
    let now = to_db_timestamp(&now);
    let result = sqlx::query(
        r#"
        UPDATE claims SET status = 'REJECTED', reviewed_by = ?, review_note = ?, reviewed_at = ?, updated_at = ?
        WHERE item_id = ? AND status = 'PENDING'
        "#,
    )
    .bind(reviewer_id.to_string())
    .bind(note)
    .bind(&now)
    .bind(&now)
    .bind(item_id.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

pub struct PgItemRepository {
    pool: sqlx::PgPool,
}

impl PgItemRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemRepository for PgItemRepository {
    async fn create(&self, item: &FoundItem) -> Result<FoundItem, DbError> {
        sqlx::query(
            r#"
            INSERT INTO found_items (id, name, description, category_id, found_location, found_at, photo, status, recorded_by, handed_over_by, claimant_id, claimant_name, claimant_contact, handed_over_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category_id)
        .bind(&item.found_location)
        .bind(item.found_at)
        .bind(&item.photo)
        .bind(item.status.as_str())
        .bind(item.recorded_by)
        .bind(item.handed_over_by)
        .bind(item.claimant_id)
        .bind(&item.claimant_name)
        .bind(&item.claimant_contact)
        .bind(item.handed_over_at)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(item.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<FoundItem>, DbError> {
        let query = format!("SELECT {} FROM found_items i WHERE i.id = $1", ITEM_COLUMNS);
        let row: Option<PgItemRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_detail(&self, id: Uuid) -> Result<Option<ItemDetail>, DbError> {
        let query = format!(
            "SELECT {}, c.name AS category_name, r.full_name AS recorded_by_name, h.full_name AS handed_over_by_name {} WHERE i.id = $1",
            ITEM_COLUMNS, DETAIL_JOINS
        );
        let row: Option<PgItemDetailRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(
        &self,
        filter: &ItemFilter,
        pagination: &Pagination,
    ) -> Result<Vec<ItemDetail>, DbError> {
        let mut ph = Placeholders::postgres();
        let conditions = item_conditions(filter, &mut ph);
        let query = format!(
            "SELECT {}, c.name AS category_name, r.full_name AS recorded_by_name, h.full_name AS handed_over_by_name {} WHERE {} ORDER BY i.found_at DESC, i.created_at DESC LIMIT {} OFFSET {}",
            ITEM_COLUMNS,
            DETAIL_JOINS,
            conditions,
            ph.next(),
            ph.next()
        );

        let rows: Vec<PgItemDetailRow> = bind_item_filter!(
            sqlx::query_as::<_, PgItemDetailRow>(&query),
            filter,
            |id: Uuid| id,
            |ts: &DateTime<Utc>| *ts
        )
        .bind(pagination.limit() as i64)
        .bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn count(&self, filter: &ItemFilter) -> Result<u64, DbError> {
        let query = format!(
            "SELECT COUNT(*) FROM found_items i WHERE {}",
            item_conditions(filter, &mut Placeholders::postgres())
        );

        let count: i64 = bind_item_filter!(
            sqlx::query_scalar::<_, i64>(&query),
            filter,
            |id: Uuid| id,
            |ts: &DateTime<Utc>| *ts
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count as u64)
    }

    async fn update(&self, id: Uuid, update: &ItemUpdate) -> Result<FoundItem, DbError> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("FoundItem", id))?;
        let item = apply_update(existing, update);

        sqlx::query(
            r#"
            UPDATE found_items SET name = $1, description = $2, category_id = $3, found_location = $4, found_at = $5, photo = $6, updated_at = $7
            WHERE id = $8
            "#,
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.category_id)
        .bind(&item.found_location)
        .bind(item.found_at)
        .bind(&item.photo)
        .bind(item.updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    async fn hand_over(
        &self,
        id: Uuid,
        officer_id: Uuid,
        hand_over: &HandOver,
    ) -> Result<FoundItem, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        pg_mark_returned(&mut tx, id, officer_id, hand_over, now).await?;
        let rejected =
            pg_reject_pending_claims(&mut tx, id, officer_id, AUTO_REJECT_NOTE, now).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;
        debug!(item_id = %id, rejected, "Item handed over");

        self.get(id)
            .await?
            .ok_or_else(|| DbError::not_found("FoundItem", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM found_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn photo_references(&self, filename: &str) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar(PHOTO_REFERENCES_PG)
            .bind(filename)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}

/// Sets an unclaimed item to returned inside an open transaction.
pub(super) async fn pg_mark_returned(
    conn: &mut sqlx::PgConnection,
    id: Uuid,
    officer_id: Uuid,
    hand_over: &HandOver,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE found_items
        SET status = $1, handed_over_by = $2, handed_over_at = $3, claimant_id = $4, claimant_name = $5, claimant_contact = $6, updated_at = $3
        WHERE id = $7 AND status = $8
        "#,
    )
    .bind(ItemStatus::Returned.as_str())
    .bind(officer_id)
    .bind(now)
    .bind(hand_over.claimant_id)
    .bind(&hand_over.claimant_name)
    .bind(&hand_over.claimant_contact)
    .bind(id)
    .bind(ItemStatus::Unclaimed.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let exists: Option<String> = sqlx::query_scalar("SELECT status FROM found_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        return Err(match exists {
            Some(_) => DbError::Conflict("Item has already been handed over".to_string()),
            None => DbError::not_found("FoundItem", id),
        });
    }

    Ok(())
}

/// Rejects every pending claim on an item inside an open transaction.
pub(super) async fn pg_reject_pending_claims(
    conn: &mut sqlx::PgConnection,
    item_id: Uuid,
    reviewer_id: Uuid,
    note: &str,
    now: DateTime<Utc>,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        r#"
        UPDATE claims SET status = 'REJECTED', reviewed_by = $1, review_note = $2, reviewed_at = $3, updated_at = $3
        WHERE item_id = $4 AND status = 'PENDING'
        "#,
    )
    .bind(reviewer_id)
    .bind(note)
    .bind(now)
    .bind(item_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected())
}

/// Factory function to create the appropriate repository based on pool type.
pub fn create_item_repository(pool: &DbPool) -> Box<dyn ItemRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteItemRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgItemRepository::new(pool.clone())),
    }
}

// Row mapping

#[derive(sqlx::FromRow)]
struct SqliteItemRow {
    id: String,
    name: String,
    description: Option<String>,
    category_id: String,
    found_location: String,
    found_at: String,
    photo: Option<String>,
    status: String,
    recorded_by: String,
    handed_over_by: Option<String>,
    claimant_id: Option<String>,
    claimant_name: Option<String>,
    claimant_contact: Option<String>,
    handed_over_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SqliteItemRow> for FoundItem {
    type Error = DbError;

    fn try_from(row: SqliteItemRow) -> Result<Self, Self::Error> {
        Ok(FoundItem {
            id: parse_db_uuid(&row.id)?,
            name: row.name,
            description: row.description,
            category_id: parse_db_uuid(&row.category_id)?,
            found_location: row.found_location,
            found_at: parse_db_timestamp(&row.found_at)?,
            photo: row.photo,
            status: parse_status(&row.status)?,
            recorded_by: parse_db_uuid(&row.recorded_by)?,
            handed_over_by: row.handed_over_by.as_deref().map(parse_db_uuid).transpose()?,
            claimant_id: row.claimant_id.as_deref().map(parse_db_uuid).transpose()?,
            claimant_name: row.claimant_name,
            claimant_contact: row.claimant_contact,
            handed_over_at: row
                .handed_over_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
            created_at: parse_db_timestamp(&row.created_at)?,
            updated_at: parse_db_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SqliteItemDetailRow {
    #[sqlx(flatten)]
    item: SqliteItemRow,
    category_name: String,
    recorded_by_name: String,
    handed_over_by_name: Option<String>,
}

impl TryFrom<SqliteItemDetailRow> for ItemDetail {
    type Error = DbError;

    fn try_from(row: SqliteItemDetailRow) -> Result<Self, Self::Error> {
        Ok(ItemDetail {
            item: row.item.try_into()?,
            category_name: row.category_name,
            recorded_by_name: row.recorded_by_name,
            handed_over_by_name: row.handed_over_by_name,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PgItemRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    category_id: Uuid,
    found_location: String,
    found_at: DateTime<Utc>,
    photo: Option<String>,
    status: String,
    recorded_by: Uuid,
    handed_over_by: Option<Uuid>,
    claimant_id: Option<Uuid>,
    claimant_name: Option<String>,
    claimant_contact: Option<String>,
    handed_over_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PgItemRow> for FoundItem {
    type Error = DbError;

    fn try_from(row: PgItemRow) -> Result<Self, Self::Error> {
        Ok(FoundItem {
            status: parse_status(&row.status)?,
            id: row.id,
            name: row.name,
            description: row.description,
            category_id: row.category_id,
            found_location: row.found_location,
            found_at: row.found_at,
            photo: row.photo,
            recorded_by: row.recorded_by,
            handed_over_by: row.handed_over_by,
            claimant_id: row.claimant_id,
            claimant_name: row.claimant_name,
            claimant_contact: row.claimant_contact,
            handed_over_at: row.handed_over_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PgItemDetailRow {
    #[sqlx(flatten)]
    item: PgItemRow,
    category_name: String,
    recorded_by_name: String,
    handed_over_by_name: Option<String>,
}

impl TryFrom<PgItemDetailRow> for ItemDetail {
    type Error = DbError;

    fn try_from(row: PgItemDetailRow) -> Result<Self, Self::Error> {
        Ok(ItemDetail {
            item: row.item.try_into()?,
            category_name: row.category_name,
            recorded_by_name: row.recorded_by_name,
            handed_over_by_name: row.handed_over_by_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conditions_number_postgres_params() {
        let filter = ItemFilter {
            status: Some(ItemStatus::Unclaimed),
            search: Some("dompet".to_string()),
            recorded_by: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let mut ph = Placeholders::postgres();
        let sql = item_conditions(&filter, &mut ph);

        assert!(sql.contains("i.status = $1"));
        assert!(sql.contains("LOWER($4)"));
        assert!(sql.contains("i.recorded_by = $5"));
        assert_eq!(ph.next(), "$6");
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let sql = item_conditions(&ItemFilter::default(), &mut Placeholders::sqlite());
        assert_eq!(sql, "1=1");
    }
}
