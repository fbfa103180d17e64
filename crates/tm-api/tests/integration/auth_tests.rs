//! Session authentication and role checks through the public router.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use tm_core::Role;

use super::common::{read_json, session_cookie, TestApp, PASSWORD};

#[tokio::test]
async fn test_protected_endpoints_require_login() {
    let app = TestApp::new().await;

    for (method, uri) in [
        (Method::GET, "/api/auth/me"),
        (Method::GET, "/api/items"),
        (Method::GET, "/api/categories"),
        (Method::GET, "/api/claims/mine"),
        (Method::GET, "/api/dashboard/user"),
        (Method::GET, "/api/admin/users"),
        (Method::GET, "/api/metrics"),
    ] {
        let response = app.request(method.clone(), uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        let body: Value = read_json(response).await;
        assert_eq!(body["code"], "UNAUTHORIZED");
    }
}

#[tokio::test]
async fn test_register_then_login() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/register",
            Some(json!({
                "email": "sari@kampus.ac.id",
                "username": "sari",
                "password": PASSWORD,
                "full_name": "Sari Wulandari",
                "identity_number": "2201001",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let cookie = app.login("sari").await;
    let response = app
        .request(Method::GET, "/api/auth/me", None, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = read_json(response).await;
    assert_eq!(me["username"], "sari");
    assert_eq!(me["role"], "USER");
    assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = TestApp::new().await;
    app.create_user("sari", Role::User).await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "login": "sari", "password": "SalahSekali1" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = read_json(response).await;
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new().await;
    app.create_user("sari", Role::User).await;
    let cookie = app.login("sari@kampus.ac.id").await;

    let response = app
        .request(Method::POST, "/api/auth/logout", None, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request(Method::GET, "/api/auth/me", None, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_disabled_account_loses_session() {
    let app = TestApp::new().await;
    app.create_user("admin1", Role::Admin).await;
    let user = app.create_user("sari", Role::User).await;
    let admin_cookie = app.login("admin1").await;
    let user_cookie = app.login("sari").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/admin/users/{}", user.id),
            Some(json!({ "enabled": false })),
            Some(&admin_cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/auth/me", None, Some(&user_cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_boundaries() {
    let app = TestApp::new().await;
    app.create_user("petugas1", Role::Officer).await;
    app.create_user("sari", Role::User).await;
    let officer = app.login("petugas1").await;
    let user = app.login("sari").await;

    let cases = [
        (&user, Method::GET, "/api/claims", StatusCode::FORBIDDEN),
        (&user, Method::GET, "/api/dashboard/officer", StatusCode::FORBIDDEN),
        (&user, Method::GET, "/api/dashboard/user", StatusCode::OK),
        (&officer, Method::GET, "/api/claims", StatusCode::OK),
        (&officer, Method::GET, "/api/dashboard/officer", StatusCode::OK),
        (&officer, Method::GET, "/api/dashboard/admin", StatusCode::FORBIDDEN),
        (&officer, Method::GET, "/api/admin/users", StatusCode::FORBIDDEN),
    ];
    for (cookie, method, uri, status) in cases {
        let response = app.request(method.clone(), uri, None, Some(cookie)).await;
        assert_eq!(response.status(), status, "{} {}", method, uri);
    }
}

#[tokio::test]
async fn test_login_cookie_flags() {
    let app = TestApp::new().await;
    app.create_user("sari", Role::User).await;

    let response = app
        .request(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "login": "sari", "password": PASSWORD })),
            None,
        )
        .await;
    let set_cookie = response.headers()[axum::http::header::SET_COOKIE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(session_cookie(&response).starts_with("temuan_session="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
}
