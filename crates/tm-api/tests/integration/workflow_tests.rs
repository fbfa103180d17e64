//! End-to-end lost-and-found flows: record, claim, review and hand over.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tm_core::Role;

use super::common::{read_json, TestApp};

const BOUNDARY: &str = "temuan-integration-boundary";

async fn category_id(app: &TestApp, cookie: &str, name: &str) -> String {
    let response = app
        .request(Method::GET, "/api/categories", None, Some(cookie))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let categories: Vec<Value> = read_json(response).await;
    categories
        .iter()
        .find(|c| c["name"] == name)
        .and_then(|c| c["id"].as_str())
        .map(str::to_string)
        .expect("seeded category")
}

async fn upload_photo(app: &TestApp, cookie: &str) -> Value {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"dompet.png\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0]);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/uploads")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap();
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

async fn record_item(app: &TestApp, cookie: &str, name: &str, photo: Option<&str>) -> Value {
    let category = category_id(app, cookie, "Dompet & Tas").await;
    let response = app
        .request(
            Method::POST,
            "/api/items",
            Some(json!({
                "name": name,
                "description": "Kulit coklat, ada gantungan kunci",
                "category_id": category,
                "found_location": "Kantin Pusat",
                "found_at": (Utc::now() - Duration::hours(3)).to_rfc3339(),
                "photo": photo,
            })),
            Some(cookie),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    read_json(response).await
}

#[tokio::test]
async fn test_claim_approval_returns_item() {
    let app = TestApp::new().await;
    app.create_user("petugas1", Role::Officer).await;
    app.create_user("sari", Role::User).await;
    app.create_user("budi", Role::User).await;
    let officer = app.login("petugas1").await;
    let sari = app.login("sari").await;
    let budi = app.login("budi").await;

    let photo = upload_photo(&app, &officer).await;
    let filename = photo["filename"].as_str().unwrap();
    let item = record_item(&app, &officer, "Dompet coklat", Some(filename)).await;
    let item_id = item["id"].as_str().unwrap().to_string();
    assert_eq!(item["status"], "BELUM_DIAMBIL");
    assert_eq!(item["recorded_by_name"], "Pengguna petugas1");
    assert_eq!(item["photo_url"], format!("/uploads/{}", filename));

    // The stored photo is served statically.
    let response = app
        .request(Method::GET, &format!("/uploads/{}", filename), None, None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let claim_body = |text: &str| json!({ "item_id": item_id, "description": text });
    let response = app
        .request(
            Method::POST,
            "/api/claims",
            Some(claim_body("Dompet saya, berisi KTM atas nama Sari")),
            Some(&sari),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let sari_claim: Value = read_json(response).await;
    assert_eq!(sari_claim["status"], "PENDING");

    let response = app
        .request(
            Method::POST,
            "/api/claims",
            Some(claim_body("Sepertinya dompet saya yang hilang kemarin")),
            Some(&budi),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let budi_claim: Value = read_json(response).await;

    // A second pending claim from the same user is refused.
    let response = app
        .request(
            Method::POST,
            "/api/claims",
            Some(claim_body("Dompet saya, berisi KTM atas nama Sari")),
            Some(&sari),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Claimants cannot review.
    let approve_uri = format!("/api/claims/{}/approve", sari_claim["id"].as_str().unwrap());
    let response = app
        .request(Method::POST, &approve_uri, None, Some(&sari))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            &approve_uri,
            Some(json!({ "note": "KTM cocok" })),
            Some(&officer),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let approved: Value = read_json(response).await;
    assert_eq!(approved["status"], "APPROVED");
    assert_eq!(approved["review_note"], "KTM cocok");

    let response = app
        .request(Method::GET, &format!("/api/items/{}", item_id), None, Some(&sari))
        .await;
    let item: Value = read_json(response).await;
    assert_eq!(item["status"], "SUDAH_DIAMBIL");
    assert_eq!(item["claimant_name"], "Pengguna sari");
    assert_eq!(item["handed_over_by_name"], "Pengguna petugas1");

    // The competing claim was closed with the item.
    let response = app
        .request(
            Method::GET,
            &format!("/api/claims/{}", budi_claim["id"].as_str().unwrap()),
            None,
            Some(&budi),
        )
        .await;
    let closed: Value = read_json(response).await;
    assert_eq!(closed["status"], "REJECTED");

    // Reviewing again conflicts.
    let response = app
        .request(Method::POST, &approve_uri, None, Some(&officer))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .request(Method::GET, "/api/dashboard/user", None, Some(&sari))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard: Value = read_json(response).await;
    assert_eq!(dashboard["my_claims"]["approved"], 1);
    assert_eq!(dashboard["my_claims"]["pending"], 0);
    assert_eq!(dashboard["unclaimed_items"], 0);

    let response = app
        .request(Method::GET, "/api/dashboard/officer", None, Some(&officer))
        .await;
    let dashboard: Value = read_json(response).await;
    assert_eq!(dashboard["recorded_total"], 1);
    assert_eq!(dashboard["handed_over"], 1);
    assert_eq!(dashboard["pending_claims"], 0);
}

#[tokio::test]
async fn test_direct_handover_and_listing_filters() {
    let app = TestApp::new().await;
    app.create_user("admin1", Role::Admin).await;
    app.create_user("petugas1", Role::Officer).await;
    let admin = app.login("admin1").await;
    let officer = app.login("petugas1").await;

    let kept = record_item(&app, &officer, "Tas ransel hitam", None).await;
    let returned = record_item(&app, &officer, "Dompet merah", None).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/items/{}/handover", returned["id"].as_str().unwrap()),
            Some(json!({ "claimant_name": "Rina", "claimant_contact": "0812-1111-2222" })),
            Some(&officer),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let handed: Value = read_json(response).await;
    assert_eq!(handed["status"], "SUDAH_DIAMBIL");
    assert_eq!(handed["claimant_contact"], "0812-1111-2222");

    let response = app
        .request(
            Method::GET,
            "/api/items?status=BELUM_DIAMBIL",
            None,
            Some(&officer),
        )
        .await;
    let page: Value = read_json(response).await;
    assert_eq!(page["pagination"]["total_items"], 1);
    assert_eq!(page["data"][0]["id"], kept["id"]);

    let response = app
        .request(Method::GET, "/api/items?search=merah", None, Some(&officer))
        .await;
    let page: Value = read_json(response).await;
    assert_eq!(page["pagination"]["total_items"], 1);
    assert_eq!(page["data"][0]["id"], returned["id"]);

    let response = app
        .request(Method::GET, "/api/items?status=HILANG", None, Some(&officer))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .request(Method::GET, "/api/dashboard/admin", None, Some(&admin))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard: Value = read_json(response).await;
    assert_eq!(dashboard["items"]["total"], 2);
    assert_eq!(dashboard["items"]["unclaimed"], 1);
    assert_eq!(dashboard["items"]["returned"], 1);
    assert_eq!(dashboard["users_by_role"]["admin"], 1);
    assert_eq!(dashboard["users_by_role"]["petugas"], 1);
}

#[tokio::test]
async fn test_user_cannot_record_items() {
    let app = TestApp::new().await;
    app.create_user("sari", Role::User).await;
    let sari = app.login("sari").await;
    let category = category_id(&app, &sari, "Kunci").await;

    let response = app
        .request(
            Method::POST,
            "/api/items",
            Some(json!({
                "name": "Kunci motor",
                "category_id": category,
                "found_location": "Parkiran",
                "found_at": Utc::now().to_rfc3339(),
            })),
            Some(&sari),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_category_in_use_cannot_be_deleted() {
    let app = TestApp::new().await;
    app.create_user("admin1", Role::Admin).await;
    let admin = app.login("admin1").await;
    record_item(&app, &admin, "Dompet biru", None).await;
    let category = category_id(&app, &admin, "Dompet & Tas").await;

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/categories/{}", category),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let unused = category_id(&app, &admin, "Kunci").await;
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/categories/{}", unused),
            None,
            Some(&admin),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
