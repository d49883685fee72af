// tests/integration/public.rs

use axum::http::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use crate::helpers::{create_service, server, token, WithAuth};

#[tokio::test]
async fn test_public_orgs_services_requires_no_auth() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server.get("/public/orgs_services").await;
    response.assert_status_ok();
    let body: Value = response.json();

    let entry = &body[org.to_string()];
    assert_eq!(entry["name"], "Acme");
    let services = entry["services"].as_array().unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0]["id"], service_id.to_string());
    assert!(entry["incidents"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_public_org_name() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    create_service(&server, org, &admin, "api").await;

    let response = server.get(&format!("/public/org_name/{}", org)).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["org_id"], org.to_string());
}

#[tokio::test]
async fn test_public_org_name_unknown_org() {
    let (server, _service) = server();
    let response = server
        .get(&format!("/public/org_name/{}", Uuid::new_v4()))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
}
