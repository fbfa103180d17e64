//! Test helpers for authentication.
//!
//! Lets route tests act as a given user without a session store.

use axum::{extract::Request, middleware::Next, response::Response};
use tm_core::{db::create_user_repository, db::DbPool, Role, User};

/// Extension type for injecting a test user into requests.
#[derive(Clone)]
pub struct TestUser(pub User);

impl TestUser {
    /// Stores a user with the given role and returns it as a test user.
    pub async fn create(db: &DbPool, username: &str, role: Role) -> Self {
        let user = User::new(
            format!("{}@test.local", username),
            username,
            "not_used",
            role,
            format!("Test {}", username),
        );
        let user = create_user_repository(db)
            .create(&user)
            .await
            .expect("Failed to create test user");
        TestUser(user)
    }

    pub async fn admin(db: &DbPool) -> Self {
        Self::create(db, "test_admin", Role::Admin).await
    }

    pub async fn officer(db: &DbPool) -> Self {
        Self::create(db, "test_petugas", Role::Officer).await
    }

    pub async fn user(db: &DbPool) -> Self {
        Self::create(db, "test_user", Role::User).await
    }
}

/// Middleware that injects a test user into the request extensions.
///
/// ```ignore
/// let router = Router::new()
///     .route("/protected", get(handler))
///     .layer(middleware::from_fn_with_state(user, inject_test_user));
/// ```
pub async fn inject_test_user(
    axum::extract::State(test_user): axum::extract::State<TestUser>,
    mut request: Request,
    next: Next,
) -> Response {
    request.extensions_mut().insert(test_user);
    next.run(request).await
}
