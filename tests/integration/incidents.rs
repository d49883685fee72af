// tests/integration/incidents.rs

use axum::http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::helpers::{create_service, server, token, WithAuth};

fn resolved_count(incident: &Value) -> usize {
    incident["updates"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|u| u["status"] == "resolved")
        .count()
}

#[tokio::test]
async fn test_incident_lifecycle() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server
        .post("/api/incidents")
        .with_auth(org, &admin)
        .json(&json!({
            "title": "Elevated error rates",
            "service_id": service_id,
            "message": "We are investigating",
            "status": "investigating"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let incident: Value = response.json();
    assert_eq!(incident["status"], "investigating");
    let incident_id = incident["id"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/api/incidents/{}/updates", incident_id))
        .with_auth(org, &admin)
        .json(&json!({ "message": "Root cause identified", "status": "identified" }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let response = server
        .post(&format!("/api/incidents/{}/updates", incident_id))
        .with_auth(org, &admin)
        .json(&json!({ "message": "Fix deployed", "status": "resolved" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let incident: Value = response.json();
    assert_eq!(incident["status"], "resolved");
    assert_eq!(resolved_count(&incident), 1);
}

#[tokio::test]
async fn test_edit_to_resolved_demotes_other_entry() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let service_id = create_service(&server, org, &admin, "api").await;

    // журнал [investigating t1, identified t2, resolved t3], t2 > t3
    let response = server
        .post("/api/incidents")
        .with_auth(org, &admin)
        .json(&json!({
            "title": "Outage",
            "service_id": service_id,
            "message": "Looking",
            "status": "investigating"
        }))
        .await;
    let incident: Value = response.json();
    let incident_id = incident["id"].as_str().unwrap().to_string();

    server
        .post(&format!("/api/incidents/{}/updates", incident_id))
        .with_auth(org, &admin)
        .json(&json!({
            "message": "Cause found",
            "status": "identified",
            "timestamp": "2030-01-01T12:00:00Z"
        }))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post(&format!("/api/incidents/{}/updates", incident_id))
        .with_auth(org, &admin)
        .json(&json!({
            "message": "Fixed",
            "status": "resolved",
            "timestamp": "2030-01-01T11:00:00Z"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    // правим запись t2 (индекс 1) в resolved → запись t3 понижается
    let response = server
        .put(&format!("/api/incidents/{}/updates/1", incident_id))
        .with_auth(org, &admin)
        .json(&json!({ "status": "resolved", "epoch": 0 }))
        .await;
    response.assert_status_ok();
    let incident: Value = response.json();

    assert_eq!(resolved_count(&incident), 1);
    let updates = incident["updates"].as_array().unwrap();
    assert_eq!(updates[1]["status"], "resolved");
    assert_eq!(updates[2]["status"], "monitoring");
    // t2 — максимальный timestamp, поэтому статус инцидента resolved
    assert_eq!(incident["status"], "resolved");
}

#[tokio::test]
async fn test_empty_update_message_rejected() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server
        .post("/api/incidents")
        .with_auth(org, &admin)
        .json(&json!({
            "title": "Outage",
            "service_id": service_id,
            "message": "   ",
            "status": "investigating"
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // состояние не изменилось
    let response = server.get("/api/incidents").with_auth(org, &admin).await;
    let body: Value = response.json();
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_stale_index_conflict_after_remove() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server
        .post("/api/incidents")
        .with_auth(org, &admin)
        .json(&json!({
            "title": "Outage",
            "service_id": service_id,
            "message": "Looking",
            "status": "investigating"
        }))
        .await;
    let incident: Value = response.json();
    let incident_id = incident["id"].as_str().unwrap().to_string();

    server
        .post(&format!("/api/incidents/{}/updates", incident_id))
        .with_auth(org, &admin)
        .json(&json!({ "message": "Watching", "status": "monitoring" }))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .delete(&format!("/api/incidents/{}/updates/0", incident_id))
        .with_auth(org, &admin)
        .await
        .assert_status_ok();

    // правка со старым epoch отклоняется
    let response = server
        .put(&format!("/api/incidents/{}/updates/0", incident_id))
        .with_auth(org, &admin)
        .json(&json!({ "message": "Late edit", "epoch": 0 }))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    // с перечитанным epoch — проходит
    let response = server
        .put(&format!("/api/incidents/{}/updates/0", incident_id))
        .with_auth(org, &admin)
        .json(&json!({ "message": "Fresh edit", "epoch": 1 }))
        .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_remove_last_update_rejected() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server
        .post("/api/incidents")
        .with_auth(org, &admin)
        .json(&json!({
            "title": "Outage",
            "service_id": service_id,
            "message": "Looking",
            "status": "investigating"
        }))
        .await;
    let incident: Value = response.json();
    let incident_id = incident["id"].as_str().unwrap().to_string();

    let response = server
        .delete(&format!("/api/incidents/{}/updates/0", incident_id))
        .with_auth(org, &admin)
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_incident() {
    let (server, _service) = server();
    let org = Uuid::new_v4();
    let admin = token(org, "org:admin");
    let service_id = create_service(&server, org, &admin, "api").await;

    let response = server
        .post("/api/incidents")
        .with_auth(org, &admin)
        .json(&json!({
            "title": "Outage",
            "service_id": service_id,
            "message": "Looking",
            "status": "investigating"
        }))
        .await;
    let incident: Value = response.json();
    let incident_id = incident["id"].as_str().unwrap().to_string();

    server
        .delete(&format!("/api/incidents/{}", incident_id))
        .with_auth(org, &admin)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = server.get("/api/incidents").with_auth(org, &admin).await;
    let body: Value = response.json();
    assert!(body.as_array().unwrap().is_empty());
}
