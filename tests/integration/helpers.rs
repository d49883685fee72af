// tests/integration/helpers.rs

use axum::http::{HeaderName, HeaderValue};
use axum_test::{TestRequest, TestServer};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use statuspage_backend::auth;
use statuspage_backend::events::EventHub;
use statuspage_backend::status_service::StatusService;
use statuspage_backend::web;

pub fn server() -> (TestServer, Arc<StatusService>) {
    let hub = Arc::new(EventHub::new(64));
    let service = Arc::new(StatusService::new(hub));
    let server = TestServer::new(web::create_router(service.clone())).unwrap();
    (server, service)
}

pub fn token(org: Uuid, role: &str) -> String {
    auth::generate_token("test-user", org, Some("Acme"), role).unwrap()
}

pub trait WithAuth {
    fn with_auth(self, org: Uuid, token: &str) -> Self;
}

impl WithAuth for TestRequest {
    fn with_auth(self, org: Uuid, token: &str) -> Self {
        self.add_header(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
        .add_header(
            HeaderName::from_static("x-organization-id"),
            HeaderValue::from_str(&org.to_string()).unwrap(),
        )
    }
}

/// Создаёт сервис от имени админа и возвращает его id
pub async fn create_service(server: &TestServer, org: Uuid, admin: &str, name: &str) -> Uuid {
    let response = server
        .post("/api/services")
        .with_auth(org, admin)
        .json(&json!({ "name": name, "status": "operational" }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}
