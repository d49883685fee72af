// tests/integration/events.rs

use serde_json::json;
use uuid::Uuid;

use statuspage_backend::events::EventType;

use crate::helpers::{create_service, server, token, WithAuth};

#[tokio::test]
async fn test_rest_mutations_reach_subscribers() {
    let (server, service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");

    let mut rx = service.hub().subscribe(org);

    let service_id = create_service(&server, org, &admin, "api").await;
    server
        .post("/api/incidents")
        .with_auth(org, &admin)
        .json(&json!({
            "title": "Outage",
            "service_id": service_id,
            "message": "Looking",
            "status": "investigating"
        }))
        .await
        .assert_status(axum::http::StatusCode::CREATED);

    let first = rx.recv().await.unwrap();
    assert_eq!(first.event_type, EventType::ServiceCreated);
    assert_eq!(first.org_id, org);
    assert_eq!(first.data["id"], service_id.to_string());

    let second = rx.recv().await.unwrap();
    assert_eq!(second.event_type, EventType::IncidentCreated);
    assert_eq!(second.data["title"], "Outage");
}

#[tokio::test]
async fn test_subscriber_of_other_org_sees_nothing() {
    let (server, service) = server();
    let org = Uuid::new_v4();
    let other = Uuid::new_v4();
    let admin = token(org, "org:admin");

    let mut rx_other = service.hub().subscribe(other);
    create_service(&server, org, &admin, "api").await;

    assert!(rx_other.try_recv().is_err());
}
