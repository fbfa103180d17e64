//! Aggregate queries behind the dashboards.

use super::pool::Placeholders;
use super::{parse_db_timestamp, parse_db_uuid, to_db_timestamp, DbError, DbPool};
use crate::claim::ClaimStatus;
use crate::dashboard::{
    ClaimCounts, ItemSummary, ItemTotals, PopularCategory, RoleCounts, SummaryOrder, SummaryQuery,
};
use crate::item::ItemStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Read-only aggregate queries. Each method is independent so callers can
/// run them concurrently.
#[async_trait]
pub trait DashboardRepository: Send + Sync {
    /// Item counts by status.
    async fn item_totals(&self) -> Result<ItemTotals, DbError>;

    /// Items whose `found_at` is at or after `since`.
    async fn count_found_since(&self, since: DateTime<Utc>) -> Result<u64, DbError>;

    /// Items recorded by an officer, optionally only those created since a time.
    async fn count_recorded_since(
        &self,
        officer_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, DbError>;

    /// Items an officer has handed back.
    async fn count_handed_over_by(&self, officer_id: Uuid) -> Result<u64, DbError>;

    async fn users_by_role(&self) -> Result<RoleCounts, DbError>;

    async fn count_categories(&self) -> Result<u64, DbError>;

    /// Claim counts by status, for one claimant or everyone.
    async fn claim_counts(&self, claimant_id: Option<Uuid>) -> Result<ClaimCounts, DbError>;

    /// Categories with the most items; ties broken by name.
    async fn popular_categories(&self, limit: u32) -> Result<Vec<PopularCategory>, DbError>;

    async fn item_summaries(&self, query: &SummaryQuery) -> Result<Vec<ItemSummary>, DbError>;
}

fn item_totals_from(rows: Vec<(String, i64)>) -> Result<ItemTotals, DbError> {
    let mut totals = ItemTotals::default();
    for (status, count) in rows {
        let count = count as u64;
        match status.parse::<ItemStatus>().map_err(DbError::Serialization)? {
            ItemStatus::Unclaimed => totals.unclaimed += count,
            ItemStatus::Returned => totals.returned += count,
        }
        totals.total += count;
    }
    Ok(totals)
}

fn role_counts_from(rows: Vec<(String, i64)>) -> RoleCounts {
    let mut counts = RoleCounts::default();
    for (role, count) in rows {
        let count = count as u64;
        match role.as_str() {
            "ADMIN" => counts.admin += count,
            "PETUGAS" => counts.petugas += count,
            _ => counts.user += count,
        }
    }
    counts
}

fn claim_counts_from(rows: Vec<(String, i64)>) -> Result<ClaimCounts, DbError> {
    let mut counts = ClaimCounts::default();
    for (status, count) in rows {
        let status = status
            .parse::<ClaimStatus>()
            .map_err(DbError::Serialization)?;
        counts.add(status, count as u64);
    }
    Ok(counts)
}

fn summary_sql(query: &SummaryQuery, ph: &mut Placeholders) -> String {
    let mut conditions = vec!["1=1".to_string()];
    if query.status.is_some() {
        conditions.push(format!("i.status = {}", ph.next()));
    }
    if query.recorded_by.is_some() {
        conditions.push(format!("i.recorded_by = {}", ph.next()));
    }
    let order = match query.order {
        SummaryOrder::NewestRecorded => "i.created_at DESC",
        SummaryOrder::OldestFound => "i.found_at ASC",
    };

    format!(
        "SELECT i.id, i.name, c.name AS category_name, i.found_location, i.found_at, i.status, i.photo, i.created_at FROM found_items i JOIN categories c ON c.id = i.category_id WHERE {} ORDER BY {} LIMIT {}",
        conditions.join(" AND "),
        order,
        ph.next()
    )
}

pub struct SqliteDashboardRepository {
    pool: sqlx::SqlitePool,
}

impl SqliteDashboardRepository {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DashboardRepository for SqliteDashboardRepository {
    async fn item_totals(&self) -> Result<ItemTotals, DbError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM found_items GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        item_totals_from(rows)
    }

    async fn count_found_since(&self, since: DateTime<Utc>) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM found_items WHERE found_at >= ?")
            .bind(to_db_timestamp(&since))
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_recorded_since(
        &self,
        officer_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM found_items WHERE recorded_by = ? AND (? IS NULL OR created_at >= ?)",
        )
        .bind(officer_id.to_string())
        .bind(since.as_ref().map(to_db_timestamp))
        .bind(since.as_ref().map(to_db_timestamp))
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn count_handed_over_by(&self, officer_id: Uuid) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM found_items WHERE handed_over_by = ?")
            .bind(officer_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn users_by_role(&self) -> Result<RoleCounts, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
            .fetch_all(&self.pool)
            .await?;
        Ok(role_counts_from(rows))
    }

    async fn count_categories(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn claim_counts(&self, claimant_id: Option<Uuid>) -> Result<ClaimCounts, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM claims WHERE (? IS NULL OR claimant_id = ?) GROUP BY status",
        )
        .bind(claimant_id.map(|id| id.to_string()))
        .bind(claimant_id.map(|id| id.to_string()))
        .fetch_all(&self.pool)
        .await?;
        claim_counts_from(rows)
    }

    async fn popular_categories(&self, limit: u32) -> Result<Vec<PopularCategory>, DbError> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, COUNT(i.id) AS item_count
            FROM categories c
            LEFT JOIN found_items i ON i.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY item_count DESC, c.name COLLATE NOCASE ASC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(id, name, count)| {
                Ok(PopularCategory {
                    id: parse_db_uuid(&id)?,
                    name,
                    item_count: count as u64,
                })
            })
            .collect()
    }

    async fn item_summaries(&self, query: &SummaryQuery) -> Result<Vec<ItemSummary>, DbError> {
        let sql = summary_sql(query, &mut Placeholders::sqlite());
        let mut q = sqlx::query_as::<_, SqliteSummaryRow>(&sql);
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }
        if let Some(recorded_by) = query.recorded_by {
            q = q.bind(recorded_by.to_string());
        }

        let rows = q.bind(query.limit as i64).fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

pub struct PgDashboardRepository {
    pool: sqlx::PgPool,
}

impl PgDashboardRepository {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DashboardRepository for PgDashboardRepository {
    async fn item_totals(&self) -> Result<ItemTotals, DbError> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM found_items GROUP BY status")
                .fetch_all(&self.pool)
                .await?;
        item_totals_from(rows)
    }

    async fn count_found_since(&self, since: DateTime<Utc>) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM found_items WHERE found_at >= $1")
            .bind(since)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_recorded_since(
        &self,
        officer_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM found_items WHERE recorded_by = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)",
        )
        .bind(officer_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn count_handed_over_by(&self, officer_id: Uuid) -> Result<u64, DbError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM found_items WHERE handed_over_by = $1")
                .bind(officer_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count as u64)
    }

    async fn users_by_role(&self) -> Result<RoleCounts, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role")
            .fetch_all(&self.pool)
            .await?;
        Ok(role_counts_from(rows))
    }

    async fn count_categories(&self) -> Result<u64, DbError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn claim_counts(&self, claimant_id: Option<Uuid>) -> Result<ClaimCounts, DbError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM claims WHERE ($1::uuid IS NULL OR claimant_id = $1) GROUP BY status",
        )
        .bind(claimant_id)
        .fetch_all(&self.pool)
        .await?;
        claim_counts_from(rows)
    }

    async fn popular_categories(&self, limit: u32) -> Result<Vec<PopularCategory>, DbError> {
        let rows: Vec<(Uuid, String, i64)> = sqlx::query_as(
            r#"
            SELECT c.id, c.name, COUNT(i.id) AS item_count
            FROM categories c
            LEFT JOIN found_items i ON i.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY item_count DESC, LOWER(c.name) ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, count)| PopularCategory {
                id,
                name,
                item_count: count as u64,
            })
            .collect())
    }

    async fn item_summaries(&self, query: &SummaryQuery) -> Result<Vec<ItemSummary>, DbError> {
        let sql = summary_sql(query, &mut Placeholders::postgres());
        let mut q = sqlx::query_as::<_, PgSummaryRow>(&sql);
        if let Some(status) = query.status {
            q = q.bind(status.as_str());
        }
        if let Some(recorded_by) = query.recorded_by {
            q = q.bind(recorded_by);
        }

        let rows = q.bind(query.limit as i64).fetch_all(&self.pool).await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}

/// Factory function to create the appropriate repository based on pool type.
pub fn create_dashboard_repository(pool: &DbPool) -> Box<dyn DashboardRepository> {
    match pool {
        DbPool::Sqlite(pool) => Box::new(SqliteDashboardRepository::new(pool.clone())),
        DbPool::Postgres(pool) => Box::new(PgDashboardRepository::new(pool.clone())),
    }
}

#[derive(sqlx::FromRow)]
struct SqliteSummaryRow {
    id: String,
    name: String,
    category_name: String,
    found_location: String,
    found_at: String,
    status: String,
    photo: Option<String>,
    created_at: String,
}

impl TryFrom<SqliteSummaryRow> for ItemSummary {
    type Error = DbError;

    fn try_from(row: SqliteSummaryRow) -> Result<Self, Self::Error> {
        Ok(ItemSummary {
            id: parse_db_uuid(&row.id)?,
            name: row.name,
            category_name: row.category_name,
            found_location: row.found_location,
            found_at: parse_db_timestamp(&row.found_at)?,
            status: row.status.parse().map_err(DbError::Serialization)?,
            photo: row.photo,
            created_at: parse_db_timestamp(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PgSummaryRow {
    id: Uuid,
    name: String,
    category_name: String,
    found_location: String,
    found_at: DateTime<Utc>,
    status: String,
    photo: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PgSummaryRow> for ItemSummary {
    type Error = DbError;

    fn try_from(row: PgSummaryRow) -> Result<Self, Self::Error> {
        Ok(ItemSummary {
            status: row.status.parse().map_err(DbError::Serialization)?,
            id: row.id,
            name: row.name,
            category_name: row.category_name,
            found_location: row.found_location,
            found_at: row.found_at,
            photo: row.photo,
            created_at: row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_totals_from_rows() {
        let totals = item_totals_from(vec![
            ("BELUM_DIAMBIL".to_string(), 4),
            ("SUDAH_DIAMBIL".to_string(), 2),
        ])
        .unwrap();
        assert_eq!(
            totals,
            ItemTotals {
                total: 6,
                unclaimed: 4,
                returned: 2
            }
        );
        assert!(item_totals_from(vec![("HILANG".to_string(), 1)]).is_err());
    }

    #[test]
    fn test_role_counts_from_rows() {
        let counts = role_counts_from(vec![
            ("ADMIN".to_string(), 1),
            ("PETUGAS".to_string(), 3),
            ("USER".to_string(), 40),
        ]);
        assert_eq!(counts.admin, 1);
        assert_eq!(counts.petugas, 3);
        assert_eq!(counts.user, 40);
    }

    #[test]
    fn test_summary_sql_orders() {
        let query = SummaryQuery {
            status: Some(ItemStatus::Unclaimed),
            recorded_by: None,
            order: SummaryOrder::OldestFound,
            limit: 5,
        };
        let sql = summary_sql(&query, &mut Placeholders::postgres());
        assert!(sql.contains("i.status = $1"));
        assert!(sql.contains("ORDER BY i.found_at ASC LIMIT $2"));
    }
}
