// tests/integration/services.rs

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::helpers::{create_service, server, token, WithAuth};

#[tokio::test]
async fn test_create_and_list_services() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");

    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server.get("/api/services").with_auth(org, &admin).await;
    response.assert_status_ok();
    let body: Value = response.json();
    let services = body.as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["id"], service_id.to_string());
    assert_eq!(services[0]["status"], "operational");
    assert_eq!(services[0]["display_status"], "operational");
}

#[tokio::test]
async fn test_missing_token_unauthorized() {
    let (server, _service) = server();

    let response = server
        .post("/api/services")
        .json(&json!({ "name": "api" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_member_is_read_only() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let member = token(org, "org:member");

    create_service(&server, org, &admin, "api").await;

    let response = server
        .post("/api/services")
        .with_auth(org, &member)
        .json(&json!({ "name": "db" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // чтение участнику доступно
    let response = server.get("/api/services").with_auth(org, &member).await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_cross_tenant_scope_is_hard_failure() {
    let (server, _service) = server();
    let org_a = Uuid::new_v4();
    let org_b = Uuid::new_v4();
    let admin_a = token(org_a, "org:admin");

    // токен организации A со скоупом организации B
    let response = server.get("/api/services").with_auth(org_b, &admin_a).await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_org_header_rejected() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");

    let response = server
        .get("/api/services")
        .add_header(
            axum::http::HeaderName::from_static("authorization"),
            axum::http::HeaderValue::from_str(&format!("Bearer {}", admin)).unwrap(),
        )
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_declared_under_maintenance_rejected() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");

    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server
        .put(&format!("/api/services/{}", service_id))
        .with_auth(org, &admin)
        .json(&json!({ "status": "under_maintenance" }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_service() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");

    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server
        .delete(&format!("/api/services/{}", service_id))
        .with_auth(org, &admin)
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server.get("/api/services").with_auth(org, &admin).await;
    let body: Value = response.json();
    assert!(body.as_array().unwrap().is_empty());
}
