//! Claim repository.

use super::item_repo::{
    pg_mark_returned, pg_reject_pending_claims, sqlite_mark_returned, sqlite_reject_pending_claims,
};
use super::pool::Placeholders;
use super::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DbError, DbPool};
use crate::claim::{Claim, ClaimDetail, ClaimFilter, ClaimStatus, AUTO_REJECT_NOTE};
use crate::item::HandOver;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

const CLAIM_COLUMNS: &str = "cl.id, cl.item_id, cl.claimant_id, cl.description, cl.proof_photo, cl.status, cl.reviewed_by, cl.review_note, cl.reviewed_at, cl.created_at, cl.updated_at";

const DETAIL_JOINS: &str =
    "FROM claims cl JOIN found_items i ON i.id = cl.item_id JOIN users u ON u.id = cl.claimant_id";

/// Repository trait for claims.
#[async_trait]
pub trait ClaimRepository: Send + Sync {
    /// Stores a new pending claim. A second pending claim by the same user
    /// on the same item fails with [`DbError::Constraint`].
    async fn create(&self, claim: &Claim) -> Result<Claim, DbError>;

    async fn get(&self, id: Uuid) -> Result<Option<Claim>, DbError>;

    /// Lists claims with item and claimant names, newest first.
    async fn list(&self, filter: &ClaimFilter) -> Result<Vec<ClaimDetail>, DbError>;

    /// Approves a pending claim and hands its item to the claimant.
    ///
    /// Runs in a single transaction: the claim becomes approved, the item
    /// returned (with the claimant's name and contact), and every other
    /// pending claim on the item is rejected.
    async fn approve(
        &self,
        id: Uuid,
        reviewer_id: Uuid,
        note: Option<&str>,
    ) -> Result<Claim, DbError>;

    /// Rejects a pending claim.
    async fn reject(&self, id: Uuid, reviewer_id: Uuid, note: &str) -> Result<Claim, DbError>;

    /// Deletes a claim that is still pending.
    async fn delete_pending(&self, id: Uuid) -> Result<bool, DbError>;
}

fn claim_conditions(filter: &ClaimFilter, ph: &mut Placeholders) -> String {
    let mut conditions = vec!["1=1".to_string()];

    if filter.status.is_some() {
        conditions.push(format!("cl.status = {}", ph.next()));
    }
    if filter.item_id.is_some() {
        conditions.push(format!("cl.item_id = {}", ph.next()));
    }
    if filter.claimant_id.is_some() {
        conditions.push(format!("cl.claimant_id = {}", ph.next()));
    }

    conditions.join(" AND ")
}

macro_rules! bind_claim_filter {
    ($query:expr, $filter:expr, $uuid:expr) => {{
        let mut query = $query;
        if let Some(status) = $filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(item_id) = $filter.item_id {
            query = query.bind($uuid(item_id));
        }
        if let Some(claimant_id) = $filter.claimant_id {
            query = query.bind($uuid(claimant_id));
        }
        query
    }};
}

fn parse_status(value: &str) -> Result<ClaimStatus, DbError> {
    value.parse::<ClaimStatus>().map_err(DbError::Serialization)
}

fn not_pending(claim: &Claim) -> DbError {
    DbError::Conflict(format!("Claim has already been {}", claim.status.as_str().to_lowercase()))
}

// ---------------------------------------------------------------------------
// SQLite
// ---------------------------------------------------------------------------

pub struct SqliteClaimRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteClaimRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(conn: &mut sqlx::SqliteConnection, id: Uuid) -> Result<Option<Claim>, DbError> {
        let query = format!("SELECT {} FROM claims cl WHERE cl.id = ?", CLAIM_COLUMNS);
        let row: Option<SqliteClaimRow> = sqlx::query_as(&query)
            .bind(id.to_string())
            .fetch_optional(&mut *conn)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_review(
        conn: &mut sqlx::SqliteConnection,
        id: Uuid,
        status: ClaimStatus,
        reviewer_id: Uuid,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let now = to_db_timestamp(&now);
        let result = sqlx::query(
            "UPDATE claims SET status = ?, reviewed_by = ?, review_note = ?, reviewed_at = ?, updated_at = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(status.as_str())
        .bind(reviewer_id.to_string())
        .bind(note)
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict("Claim is no longer pending".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClaimRepository for SqliteClaimRepository {
    async fn create(&self, claim: &Claim) -> Result<Claim, DbError> {
        sqlx::query(
            r#"
            INSERT INTO claims (id, item_id, claimant_id, description, proof_photo, status, reviewed_by, review_note, reviewed_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(claim.id.to_string())
        .bind(claim.item_id.to_string())
        .bind(claim.claimant_id.to_string())
        .bind(&claim.description)
        .bind(&claim.proof_photo)
        .bind(claim.status.as_str())
        .bind(claim.reviewed_by.map(|id| id.to_string()))
        .bind(&claim.review_note)
        .bind(claim.reviewed_at.as_ref().map(to_db_timestamp))
        .bind(to_db_timestamp(&claim.created_at))
        .bind(to_db_timestamp(&claim.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(claim.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Claim>, DbError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    async fn list(&self, filter: &ClaimFilter) -> Result<Vec<ClaimDetail>, DbError> {
        let query = format!(
            "SELECT {}, i.name AS item_name, u.full_name AS claimant_name {} WHERE {} ORDER BY cl.created_at DESC",
            CLAIM_COLUMNS,
            DETAIL_JOINS,
            claim_conditions(filter, &mut Placeholders::sqlite())
        );

        let rows: Vec<SqliteClaimDetailRow> = bind_claim_filter!(
            sqlx::query_as::<_, SqliteClaimDetailRow>(&query),
            filter,
            |id: Uuid| id.to_string()
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn approve(
        &self,
        id: Uuid,
        reviewer_id: Uuid,
        note: Option<&str>,
    ) -> Result<Claim, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let claim = Self::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))?;
        if !claim.is_pending() {
            return Err(not_pending(&claim));
        }

        let (claimant_name, claimant_contact): (String, Option<String>) = sqlx::query_as(
            "SELECT full_name, COALESCE(phone, email) FROM users WHERE id = ?",
        )
        .bind(claim.claimant_id.to_string())
        .fetch_one(&mut *tx)
        .await?;

        Self::set_review(&mut tx, id, ClaimStatus::Approved, reviewer_id, note, now).await?;
        let hand_over = HandOver {
            claimant_id: Some(claim.claimant_id),
            claimant_name,
            claimant_contact,
        };
        sqlite_mark_returned(&mut tx, claim.item_id, reviewer_id, &hand_over, now).await?;
        let rejected =
            sqlite_reject_pending_claims(&mut tx, claim.item_id, reviewer_id, AUTO_REJECT_NOTE, now)
                .await?;

        let approved = Self::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))?;
        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        debug!(claim_id = %id, item_id = %claim.item_id, rejected, "Claim approved");
        Ok(approved)
    }

    async fn reject(&self, id: Uuid, reviewer_id: Uuid, note: &str) -> Result<Claim, DbError> {
        let mut conn = self.pool.acquire().await?;

        let claim = Self::fetch(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))?;
        if !claim.is_pending() {
            return Err(not_pending(&claim));
        }

        Self::set_review(
            &mut conn,
            id,
            ClaimStatus::Rejected,
            reviewer_id,
            Some(note),
            Utc::now(),
        )
        .await?;

        Self::fetch(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))
    }

    async fn delete_pending(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM claims WHERE id = ? AND status = 'PENDING'")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

pub struct PgClaimRepository {
    pool: sqlx::PgPool,
}

impl PgClaimRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        for_update: bool,
    ) -> Result<Option<Claim>, DbError> {
        let query = format!(
            "SELECT {} FROM claims cl WHERE cl.id = $1{}",
            CLAIM_COLUMNS,
            if for_update { " FOR UPDATE" } else { "" }
        );
        let row: Option<PgClaimRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_review(
        conn: &mut sqlx::PgConnection,
        id: Uuid,
        status: ClaimStatus,
        reviewer_id: Uuid,
        note: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE claims SET status = $1, reviewed_by = $2, review_note = $3, reviewed_at = $4, updated_at = $4 WHERE id = $5 AND status = 'PENDING'",
        )
        .bind(status.as_str())
        .bind(reviewer_id)
        .bind(note)
        .bind(now)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Conflict("Claim is no longer pending".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClaimRepository for PgClaimRepository {
    async fn create(&self, claim: &Claim) -> Result<Claim, DbError> {
        sqlx::query(
            r#"
            INSERT INTO claims (id, item_id, claimant_id, description, proof_photo, status, reviewed_by, review_note, reviewed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(claim.id)
        .bind(claim.item_id)
        .bind(claim.claimant_id)
        .bind(&claim.description)
        .bind(&claim.proof_photo)
        .bind(claim.status.as_str())
        .bind(claim.reviewed_by)
        .bind(&claim.review_note)
        .bind(claim.reviewed_at)
        .bind(claim.created_at)
        .bind(claim.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(claim.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Claim>, DbError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id, false).await
    }

    async fn list(&self, filter: &ClaimFilter) -> Result<Vec<ClaimDetail>, DbError> {
        let query = format!(
            "SELECT {}, i.name AS item_name, u.full_name AS claimant_name {} WHERE {} ORDER BY cl.created_at DESC",
            CLAIM_COLUMNS,
            DETAIL_JOINS,
            claim_conditions(filter, &mut Placeholders::postgres())
        );

        let rows: Vec<PgClaimDetailRow> = bind_claim_filter!(
            sqlx::query_as::<_, PgClaimDetailRow>(&query),
            filter,
            |id: Uuid| id
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn approve(
        &self,
        id: Uuid,
        reviewer_id: Uuid,
        note: Option<&str>,
    ) -> Result<Claim, DbError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let claim = Self::fetch(&mut tx, id, true)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))?;
        if !claim.is_pending() {
            return Err(not_pending(&claim));
        }

        let (claimant_name, claimant_contact): (String, Option<String>) = sqlx::query_as(
            "SELECT full_name, COALESCE(phone, email) FROM users WHERE id = $1",
        )
        .bind(claim.claimant_id)
        .fetch_one(&mut *tx)
        .await?;

        Self::set_review(&mut tx, id, ClaimStatus::Approved, reviewer_id, note, now).await?;
        let hand_over = HandOver {
            claimant_id: Some(claim.claimant_id),
            claimant_name,
            claimant_contact,
        };
        pg_mark_returned(&mut tx, claim.item_id, reviewer_id, &hand_over, now).await?;
        let rejected =
            pg_reject_pending_claims(&mut tx, claim.item_id, reviewer_id, AUTO_REJECT_NOTE, now)
                .await?;

        let approved = Self::fetch(&mut tx, id, false)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))?;
        tx.commit()
            .await
            .map_err(|e| DbError::Transaction(e.to_string()))?;

        debug!(claim_id = %id, item_id = %claim.item_id, rejected, "Claim approved");
        Ok(approved)
    }

    async fn reject(&self, id: Uuid, reviewer_id: Uuid, note: &str) -> Result<Claim, DbError> {
        let mut conn = self.pool.acquire().await?;

        let claim = Self::fetch(&mut conn, id, false)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))?;
        if !claim.is_pending() {
            return Err(not_pending(&claim));
        }

        Self::set_review(
            &mut conn,
            id,
            ClaimStatus::Rejected,
            reviewer_id,
            Some(note),
            Utc::now(),
        )
        .await?;

        Self::fetch(&mut conn, id, false)
            .await?
            .ok_or_else(|| DbError::not_found("Claim", id))
    }

    async fn delete_pending(&self, id: Uuid) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM claims WHERE id = $1 AND status = 'PENDING'")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Factory function to create the appropriate repository based on pool type.
pub fn create_claim_repository(pool: &DbPool) -> Box<dyn ClaimRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteClaimRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgClaimRepository::new(pool.clone())),
    }
}

// Row mapping

#[derive(sqlx::FromRow)]
struct SqliteClaimRow {
    id: String,
    item_id: String,
    claimant_id: String,
    description: String,
    proof_photo: Option<String>,
    status: String,
    reviewed_by: Option<String>,
    review_note: Option<String>,
    reviewed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<SqliteClaimRow> for Claim {
    type Error = DbError;

    fn try_from(row: SqliteClaimRow) -> Result<Self, Self::Error> {
        Ok(Claim {
            id: parse_db_uuid(&row.id)?,
            item_id: parse_db_uuid(&row.item_id)?,
            claimant_id: parse_db_uuid(&row.claimant_id)?,
            description: row.description,
            proof_photo: row.proof_photo,
            status: parse_status(&row.status)?,
            reviewed_by: row.reviewed_by.as_deref().map(parse_db_uuid).transpose()?,
            review_note: row.review_note,
            reviewed_at: row
                .reviewed_at
                .as_deref()
                .map(parse_db_timestamp)
                .transpose()?,
            created_at: parse_db_timestamp(&row.created_at)?,
            updated_at: parse_db_timestamp(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SqliteClaimDetailRow {
    #[sqlx(flatten)]
    claim: SqliteClaimRow,
    item_name: String,
    claimant_name: String,
}

impl TryFrom<SqliteClaimDetailRow> for ClaimDetail {
    type Error = DbError;

    fn try_from(row: SqliteClaimDetailRow) -> Result<Self, Self::Error> {
        Ok(ClaimDetail {
            claim: row.claim.try_into()?,
            item_name: row.item_name,
            claimant_name: row.claimant_name,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PgClaimRow {
    id: Uuid,
    item_id: Uuid,
    claimant_id: Uuid,
    description: String,
    proof_photo: Option<String>,
    status: String,
    reviewed_by: Option<Uuid>,
    review_note: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PgClaimRow> for Claim {
    type Error = DbError;

    fn try_from(row: PgClaimRow) -> Result<Self, Self::Error> {
        Ok(Claim {
            status: parse_status(&row.status)?,
            id: row.id,
            item_id: row.item_id,
            claimant_id: row.claimant_id,
            description: row.description,
            proof_photo: row.proof_photo,
            reviewed_by: row.reviewed_by,
            review_note: row.review_note,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PgClaimDetailRow {
    #[sqlx(flatten)]
    claim: PgClaimRow,
    item_name: String,
    claimant_name: String,
}

impl TryFrom<PgClaimDetailRow> for ClaimDetail {
    type Error = DbError;

    fn try_from(row: PgClaimDetailRow) -> Result<Self, Self::Error> {
        Ok(ClaimDetail {
            claim: row.claim.try_into()?,
            item_name: row.item_name,
            claimant_name: row.claimant_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_conditions() {
        let filter = ClaimFilter {
            status: Some(ClaimStatus::Pending),
            claimant_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let sql = claim_conditions(&filter, &mut Placeholders::postgres());
        assert_eq!(sql, "1=1 AND cl.status = $1 AND cl.claimant_id = $2");
    }

    #[test]
    fn test_not_pending_message() {
        let mut claim = Claim::new(Uuid::new_v4(), Uuid::new_v4(), "x", None);
        claim.status = ClaimStatus::Rejected;
        assert_eq!(not_pending(&claim).to_string(), "Conflict: Claim has already been rejected");
    }
}
