//! Dashboard aggregates over a small fixture.

#![cfg(feature = "database")]

mod common;

use common::{create_category, create_user, record_item, test_pool};
use tm_core::db::{create_claim_repository, create_dashboard_repository, create_item_repository, DbPool};
use tm_core::{Claim, DashboardConfig, DashboardService, HandOver, Role, User};

struct Fixture {
    pool: DbPool,
    officer: User,
    other_officer: User,
    student: User,
}

/// Two officers, two users, three categories and five items: one returned,
/// one with a pending claim and one found long before this month.
async fn fixture() -> Fixture {
    let pool = test_pool().await;
    create_user(&pool, "admin1", Role::Admin).await;
    let officer = create_user(&pool, "petugas1", Role::Officer).await;
    let other_officer = create_user(&pool, "petugas2", Role::Officer).await;
    let student = create_user(&pool, "citra", Role::User).await;
    create_user(&pool, "dodi", Role::User).await;

    let electronics = create_category(&pool, "Elektronik").await;
    let keys = create_category(&pool, "Kunci").await;
    create_category(&pool, "Pakaian").await;

    let phone = record_item(&pool, "Ponsel", &electronics, &officer, 0).await;
    let charger = record_item(&pool, "Charger", &electronics, &officer, 24 * 40).await;
    record_item(&pool, "Earphone", &electronics, &other_officer, 24 * 45).await;
    record_item(&pool, "Kunci motor", &keys, &other_officer, 24 * 50).await;
    record_item(&pool, "Kunci loker", &keys, &officer, 24 * 60).await;

    create_claim_repository(&pool)
        .create(&Claim::new(phone.id, student.id, "Ponsel saya", None))
        .await
        .unwrap();
    create_item_repository(&pool)
        .hand_over(
            charger.id,
            officer.id,
            &HandOver {
                claimant_id: Some(student.id),
                claimant_name: student.full_name.clone(),
                claimant_contact: None,
            },
        )
        .await
        .unwrap();

    Fixture {
        pool,
        officer,
        other_officer,
        student,
    }
}

fn service(pool: &DbPool) -> DashboardService {
    DashboardService::new(create_dashboard_repository(pool), DashboardConfig::default())
}

#[tokio::test]
async fn test_admin_dashboard_counts_everything() {
    let fx = fixture().await;
    let dashboard = service(&fx.pool).admin().await.unwrap();

    assert_eq!(dashboard.items.total, 5);
    assert_eq!(dashboard.items.unclaimed, 4);
    assert_eq!(dashboard.items.returned, 1);

    assert_eq!(dashboard.found.today, 1);
    assert_eq!(dashboard.found.this_week, 1);
    assert_eq!(dashboard.found.this_month, 1);

    assert_eq!(dashboard.users_by_role.admin, 1);
    assert_eq!(dashboard.users_by_role.petugas, 2);
    assert_eq!(dashboard.users_by_role.user, 2);
    assert_eq!(dashboard.category_count, 3);
    assert_eq!(dashboard.pending_claims, 1);

    let popular: Vec<_> = dashboard
        .popular_categories
        .iter()
        .map(|c| (c.name.as_str(), c.item_count))
        .collect();
    assert_eq!(
        popular,
        vec![("Elektronik", 3), ("Kunci", 2), ("Pakaian", 0)]
    );
    assert_eq!(dashboard.recent_items.len(), 5);
}

#[tokio::test]
async fn test_officer_dashboard_is_scoped_to_the_officer() {
    let fx = fixture().await;
    let svc = service(&fx.pool);

    let mine = svc.officer(fx.officer.id).await.unwrap();
    assert_eq!(mine.recorded_total, 3);
    // Every fixture item was recorded just now.
    assert_eq!(mine.recorded.today, 3);
    assert_eq!(mine.recorded.this_month, 3);
    assert_eq!(mine.handed_over, 1);
    assert_eq!(mine.pending_claims, 1);
    assert_eq!(mine.my_recent_items.len(), 3);

    let oldest: Vec<_> = mine.oldest_unclaimed.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(oldest, vec!["Kunci loker", "Kunci motor", "Earphone", "Ponsel"]);

    let theirs = svc.officer(fx.other_officer.id).await.unwrap();
    assert_eq!(theirs.recorded_total, 2);
    assert_eq!(theirs.handed_over, 0);
}

#[tokio::test]
async fn test_user_dashboard_shows_own_claims() {
    let fx = fixture().await;
    let dashboard = service(&fx.pool).user(fx.student.id).await.unwrap();

    assert_eq!(dashboard.my_claims.pending, 1);
    assert_eq!(dashboard.my_claims.total, 1);
    assert_eq!(dashboard.unclaimed_items, 4);
    assert_eq!(dashboard.recent_unclaimed.len(), 4);
    assert!(dashboard
        .recent_unclaimed
        .iter()
        .all(|i| i.status == tm_core::ItemStatus::Unclaimed));
}

#[tokio::test]
async fn test_recent_lists_respect_the_limit() {
    let fx = fixture().await;
    let config = DashboardConfig {
        recent_limit: 2,
        popular_limit: 1,
        ..Default::default()
    };
    let svc = DashboardService::new(create_dashboard_repository(&fx.pool), config);

    let dashboard = svc.admin().await.unwrap();
    assert_eq!(dashboard.recent_items.len(), 2);
    assert_eq!(dashboard.popular_categories.len(), 1);
}

#[tokio::test]
async fn test_empty_database_gives_zeroes() {
    let pool = test_pool().await;
    let dashboard = service(&pool).admin().await.unwrap();

    assert_eq!(dashboard.items.total, 0);
    assert_eq!(dashboard.found.today, 0);
    assert!(dashboard.popular_categories.is_empty());
    assert!(dashboard.recent_items.is_empty());
}
