//! Role-scoped dashboard aggregation.
//!
//! Each dashboard is composed from small, independent aggregate queries run
//! concurrently against the [`DashboardRepository`](crate::db::DashboardRepository).
//! "Today", "this week" and "this month" are computed in the campus time zone,
//! given as a fixed UTC offset (WIB, UTC+7, by default); weeks start on Monday.

use crate::claim::ClaimStatus;
use crate::item::ItemStatus;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Dashboard tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Campus time zone as hours east of UTC.
    pub utc_offset_hours: i32,
    /// Length of the "recent items" lists.
    pub recent_limit: u32,
    /// Number of popular categories on the admin dashboard.
    pub popular_limit: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: 7,
            recent_limit: 5,
            popular_limit: 5,
        }
    }
}

impl DashboardConfig {
    /// Returns the configured offset, or UTC when it is out of range.
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }
}

/// Start instants of the current day, week and month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Periods {
    pub today: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
}

impl Periods {
    /// Computes period boundaries for `now` as seen in `offset`.
    pub fn at(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local_date = now.with_timezone(&offset).date_naive();
        let week_date = local_date - Duration::days(local_date.weekday().num_days_from_monday() as i64);
        let month_date = local_date - Duration::days(local_date.day0() as i64);

        let to_utc = |date: chrono::NaiveDate| {
            let local_midnight = date.and_time(NaiveTime::MIN);
            Utc.from_utc_datetime(
                &(local_midnight - Duration::seconds(offset.local_minus_utc() as i64)),
            )
        };

        Self {
            today: to_utc(local_date),
            week: to_utc(week_date),
            month: to_utc(month_date),
        }
    }
}

/// Item counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTotals {
    pub total: u64,
    pub unclaimed: u64,
    pub returned: u64,
}

/// Counts over the current day, week and month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCounts {
    pub today: u64,
    pub this_week: u64,
    pub this_month: u64,
}

/// Account counts by role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub admin: u64,
    pub petugas: u64,
    pub user: u64,
}

/// Claim counts by status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub total: u64,
}

impl ClaimCounts {
    /// Adds `count` claims of the given status.
    pub fn add(&mut self, status: ClaimStatus, count: u64) {
        match status {
            ClaimStatus::Pending => self.pending += count,
            ClaimStatus::Approved => self.approved += count,
            ClaimStatus::Rejected => self.rejected += count,
        }
        self.total += count;
    }
}

/// A category ranked by how many items it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularCategory {
    pub id: Uuid,
    pub name: String,
    pub item_count: u64,
}

/// Compact item row for dashboard lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub name: String,
    pub category_name: String,
    pub found_location: String,
    pub found_at: DateTime<Utc>,
    pub status: ItemStatus,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ordering for item summary lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryOrder {
    /// Most recently recorded first.
    NewestRecorded,
    /// Longest-waiting first, by found date.
    OldestFound,
}

/// Selection for an item summary list.
#[derive(Debug, Clone)]
pub struct SummaryQuery {
    pub status: Option<ItemStatus>,
    pub recorded_by: Option<Uuid>,
    pub order: SummaryOrder,
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub items: ItemTotals,
    /// Items found (by `found_at`) in each period.
    pub found: PeriodCounts,
    pub users_by_role: RoleCounts,
    pub category_count: u64,
    pub pending_claims: u64,
    pub popular_categories: Vec<PopularCategory>,
    pub recent_items: Vec<ItemSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficerDashboard {
    pub recorded_total: u64,
    /// Items recorded by the officer in each period.
    pub recorded: PeriodCounts,
    pub handed_over: u64,
    pub pending_claims: u64,
    pub my_recent_items: Vec<ItemSummary>,
    pub oldest_unclaimed: Vec<ItemSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDashboard {
    pub my_claims: ClaimCounts,
    pub unclaimed_items: u64,
    pub recent_unclaimed: Vec<ItemSummary>,
}

#[cfg(feature = "database")]
pub use service::DashboardService;

#[cfg(feature = "database")]
mod service {
    use super::*;
    use crate::db::{DashboardRepository, DbError};
    use tracing::instrument;

    /// Composes dashboards from aggregate queries.
    pub struct DashboardService {
        repo: Box<dyn DashboardRepository>,
        config: DashboardConfig,
    }

    impl DashboardService {
        pub fn new(repo: Box<dyn DashboardRepository>, config: DashboardConfig) -> Self {
            Self { repo, config }
        }

        pub fn config(&self) -> &DashboardConfig {
            &self.config
        }

        fn periods(&self) -> Periods {
            Periods::at(Utc::now(), self.config.offset())
        }

        fn recent(&self, status: Option<ItemStatus>, recorded_by: Option<Uuid>) -> SummaryQuery {
            SummaryQuery {
                status,
                recorded_by,
                order: SummaryOrder::NewestRecorded,
                limit: self.config.recent_limit,
            }
        }

        #[instrument(skip(self))]
        pub async fn admin(&self) -> Result<AdminDashboard, DbError> {
            let periods = self.periods();
            let repo = self.repo.as_ref();
            let recent = self.recent(None, None);

            let (items, today, this_week, this_month, users_by_role, category_count) = tokio::try_join!(
                repo.item_totals(),
                repo.count_found_since(periods.today),
                repo.count_found_since(periods.week),
                repo.count_found_since(periods.month),
                repo.users_by_role(),
                repo.count_categories(),
            )?;
            let (claims, popular_categories, recent_items) = tokio::try_join!(
                repo.claim_counts(None),
                repo.popular_categories(self.config.popular_limit),
                repo.item_summaries(&recent),
            )?;

            Ok(AdminDashboard {
                items,
                found: PeriodCounts {
                    today,
                    this_week,
                    this_month,
                },
                users_by_role,
                category_count,
                pending_claims: claims.pending,
                popular_categories,
                recent_items,
            })
        }

        #[instrument(skip(self))]
        pub async fn officer(&self, officer_id: Uuid) -> Result<OfficerDashboard, DbError> {
            let periods = self.periods();
            let repo = self.repo.as_ref();
            let mine = self.recent(None, Some(officer_id));
            let oldest = SummaryQuery {
                status: Some(ItemStatus::Unclaimed),
                recorded_by: None,
                order: SummaryOrder::OldestFound,
                limit: self.config.recent_limit,
            };

            let (recorded_total, today, this_week, this_month, handed_over) = tokio::try_join!(
                repo.count_recorded_since(officer_id, None),
                repo.count_recorded_since(officer_id, Some(periods.today)),
                repo.count_recorded_since(officer_id, Some(periods.week)),
                repo.count_recorded_since(officer_id, Some(periods.month)),
                repo.count_handed_over_by(officer_id),
            )?;
            let (claims, my_recent_items, oldest_unclaimed) = tokio::try_join!(
                repo.claim_counts(None),
                repo.item_summaries(&mine),
                repo.item_summaries(&oldest),
            )?;

            Ok(OfficerDashboard {
                recorded_total,
                recorded: PeriodCounts {
                    today,
                    this_week,
                    this_month,
                },
                handed_over,
                pending_claims: claims.pending,
                my_recent_items,
                oldest_unclaimed,
            })
        }

        #[instrument(skip(self))]
        pub async fn user(&self, user_id: Uuid) -> Result<UserDashboard, DbError> {
            let repo = self.repo.as_ref();
            let recent = self.recent(Some(ItemStatus::Unclaimed), None);

            let (my_claims, items, recent_unclaimed) = tokio::try_join!(
                repo.claim_counts(Some(user_id)),
                repo.item_totals(),
                repo.item_summaries(&recent),
            )?;

            Ok(UserDashboard {
                my_claims,
                unclaimed_items: items.unclaimed,
                recent_unclaimed,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wib() -> FixedOffset {
        DashboardConfig::default().offset()
    }

    #[test]
    fn test_periods_in_wib() {
        // Wednesday 2024-05-15 03:00 WIB is Tuesday 20:00 UTC.
        let now = Utc.with_ymd_and_hms(2024, 5, 14, 20, 0, 0).unwrap();
        let periods = Periods::at(now, wib());

        assert_eq!(periods.today, Utc.with_ymd_and_hms(2024, 5, 14, 17, 0, 0).unwrap());
        assert_eq!(periods.week, Utc.with_ymd_and_hms(2024, 5, 12, 17, 0, 0).unwrap());
        assert_eq!(periods.month, Utc.with_ymd_and_hms(2024, 4, 30, 17, 0, 0).unwrap());
    }

    #[test]
    fn test_week_starts_monday() {
        // Monday 2024-05-13 10:00 WIB
        let now = Utc.with_ymd_and_hms(2024, 5, 13, 3, 0, 0).unwrap();
        let periods = Periods::at(now, wib());
        assert_eq!(periods.week, periods.today);

        // Sunday 2024-05-19 23:00 WIB still belongs to the same week
        let now = Utc.with_ymd_and_hms(2024, 5, 19, 16, 0, 0).unwrap();
        assert_eq!(Periods::at(now, wib()).week, periods.week);
    }

    #[test]
    fn test_periods_in_utc() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let periods = Periods::at(now, Utc.fix());
        assert_eq!(periods.today, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert_eq!(periods.month, periods.today);
    }

    #[test]
    fn test_invalid_offset_falls_back_to_utc() {
        let config = DashboardConfig {
            utc_offset_hours: 99,
            ..Default::default()
        };
        assert_eq!(config.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_claim_counts_add() {
        let mut counts = ClaimCounts::default();
        counts.add(ClaimStatus::Pending, 2);
        counts.add(ClaimStatus::Rejected, 1);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.rejected, 1);
        assert_eq!(counts.approved, 0);
        assert_eq!(counts.total, 3);
    }
}
