#![cfg(feature = "database")]

mod common;

use common::test_pool;
use tm_core::db::{
    create_category_repository, create_claim_repository, create_item_repository,
    create_user_repository, ensure_admin_user, seed_categories, seed_demo_data, AdminSeed,
};
use tm_core::category::DEFAULT_CATEGORIES;
use tm_core::{ClaimFilter, ClaimStatus, ItemFilter, ItemStatus, Role, UserFilter};

#[tokio::test]
async fn test_admin_seed_runs_once() {
    let pool = test_pool().await;

    let first = ensure_admin_user(&pool).await.unwrap();
    assert!(matches!(first, AdminSeed::Created { .. }));

    let second = ensure_admin_user(&pool).await.unwrap();
    assert_eq!(second, AdminSeed::Existing);

    let admins = create_user_repository(&pool)
        .count(&UserFilter {
            role: Some(Role::Admin),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(admins, 1);
}

#[tokio::test]
async fn test_category_seed_is_idempotent() {
    let pool = test_pool().await;

    assert_eq!(seed_categories(&pool).await.unwrap(), DEFAULT_CATEGORIES.len());
    assert_eq!(seed_categories(&pool).await.unwrap(), 0);
    assert_eq!(
        create_category_repository(&pool).count().await.unwrap(),
        DEFAULT_CATEGORIES.len() as u64
    );
}

#[tokio::test]
async fn test_demo_data_populates_an_empty_database() {
    let pool = test_pool().await;

    let report = seed_demo_data(&pool).await.unwrap();
    assert_eq!(report.categories_created, DEFAULT_CATEGORIES.len());
    assert_eq!(report.users_created, 2);
    assert_eq!(report.items_created, 7);
    assert_eq!(report.claims_created, 1);

    let items = create_item_repository(&pool);
    let returned = items
        .count(&ItemFilter {
            status: Some(ItemStatus::Returned),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(returned, 1);

    let pending = create_claim_repository(&pool)
        .list(&ClaimFilter {
            status: Some(ClaimStatus::Pending),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].claimant_name, "Citra Lestari");

    let again = seed_demo_data(&pool).await.unwrap();
    assert_eq!(again.items_created, 0);
    assert_eq!(again.users_created, 0);
    assert_eq!(items.count(&ItemFilter::default()).await.unwrap(), 7);
}
