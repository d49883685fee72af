// src/web.rs

use axum::{
    routing::{get, post},
    Router, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::auth::Claims;
use crate::middleware::{authorize, require_admin, AppState, AuthGateError, OrgScope};
use crate::models::{display_status, Incident, Service, ServiceStatus, UpdateStatus};
use crate::status_service::{
    AppendUpdate, CreateIncident, CreateService, EditUpdate, OrgSnapshot, ScheduleMaintenance,
    StatusError, StatusService, UpdateIncident, UpdateService,
};

// === Ошибки API ===

#[derive(Debug)]
pub enum ApiError {
    Status(StatusError),
    Gate(AuthGateError),
}

impl From<StatusError> for ApiError {
    fn from(e: StatusError) -> Self {
        ApiError::Status(e)
    }
}

impl From<AuthGateError> for ApiError {
    fn from(e: AuthGateError) -> Self {
        ApiError::Gate(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Gate(e) => e.into_response(),
            ApiError::Status(e) => {
                let status = match &e {
                    StatusError::InvalidInput(_)
                    | StatusError::InvalidUpdate(_)
                    | StatusError::InvalidWindow
                    | StatusError::EmptyLedger => StatusCode::BAD_REQUEST,
                    StatusError::StaleIndex | StatusError::MaintenanceAlreadyScheduled => {
                        StatusCode::CONFLICT
                    }
                    StatusError::NotFound(_) => StatusCode::NOT_FOUND,
                };
                (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
            }
        }
    }
}

// === Ответы ===

#[derive(Serialize)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ServiceStatus,
    pub display_status: ServiceStatus,
    pub uptime: f64,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn service_response(service: &Service, incidents: &[Incident]) -> ServiceResponse {
    ServiceResponse {
        id: service.id,
        org_id: service.org_id,
        name: service.name.clone(),
        description: service.description.clone(),
        status: service.status,
        display_status: display_status(service, incidents),
        uptime: service.uptime,
        link: service.link.clone(),
        created_at: service.created_at,
        updated_at: service.updated_at,
    }
}

#[derive(Serialize)]
pub struct UpdateResponse {
    pub message: String,
    pub status: UpdateStatus,
    pub timestamp: DateTime<Utc>,
    pub seq: u64,
}

#[derive(Serialize)]
pub struct IncidentResponse {
    pub id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    pub service_id: Uuid,
    pub status: UpdateStatus,
    pub is_maintenance: bool,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updates: Vec<UpdateResponse>,
    pub ledger_epoch: u64,
}

impl From<Incident> for IncidentResponse {
    fn from(incident: Incident) -> Self {
        let status = incident.current_status();
        // порядок журнала сохраняется: индексы записей адресуют
        // правки/удаления; сортировку «новые сверху» делает витрина
        let updates: Vec<UpdateResponse> = incident
            .ledger
            .entries()
            .iter()
            .map(|u| UpdateResponse {
                message: u.message.clone(),
                status: u.status,
                timestamp: u.timestamp,
                seq: u.seq,
            })
            .collect();

        Self {
            id: incident.id,
            org_id: incident.org_id,
            title: incident.title,
            service_id: incident.service_id,
            status,
            is_maintenance: incident.is_maintenance,
            scheduled_start: incident.scheduled_start,
            scheduled_end: incident.scheduled_end,
            created_at: incident.created_at,
            updates,
            ledger_epoch: incident.ledger.epoch(),
        }
    }
}

#[derive(Serialize)]
pub struct SnapshotResponse {
    pub services: Vec<ServiceResponse>,
    pub incidents: Vec<IncidentResponse>,
}

fn snapshot_response(snapshot: OrgSnapshot) -> SnapshotResponse {
    let services = snapshot
        .services
        .iter()
        .map(|s| service_response(s, &snapshot.incidents))
        .collect();
    let incidents = snapshot
        .incidents
        .into_iter()
        .map(IncidentResponse::from)
        .collect();
    SnapshotResponse { services, incidents }
}

#[derive(Serialize)]
pub struct PublicOrgEntry {
    pub name: String,
    pub services: Vec<ServiceResponse>,
    pub incidents: Vec<IncidentResponse>,
}

// === Хэндлеры: сервисы ===

async fn list_services(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    service.ensure_org(scope.0, claims.org_name.as_deref()).await;
    let snapshot = service.get_snapshot(scope.0).await;
    let responses: Vec<ServiceResponse> = snapshot
        .services
        .iter()
        .map(|s| service_response(s, &snapshot.incidents))
        .collect();
    Ok(Json(responses))
}

async fn create_service(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Json(payload): Json<CreateService>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    service.ensure_org(scope.0, claims.org_name.as_deref()).await;
    let created = service.create_service(scope.0, payload).await?;
    Ok((StatusCode::CREATED, Json(service_response(&created, &[]))))
}

async fn update_service(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Path(service_id): Path<Uuid>,
    Json(payload): Json<UpdateService>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    let updated = service.update_service(scope.0, service_id, payload).await?;
    let incidents = service.list_incidents(scope.0).await;
    Ok(Json(service_response(&updated, &incidents)))
}

async fn delete_service(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Path(service_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    service.delete_service(scope.0, service_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// === Хэндлеры: инциденты ===

async fn list_incidents(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    service.ensure_org(scope.0, claims.org_name.as_deref()).await;
    let incidents = service.list_incidents(scope.0).await;
    let responses: Vec<IncidentResponse> =
        incidents.into_iter().map(IncidentResponse::from).collect();
    Ok(Json(responses))
}

async fn create_incident(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Json(payload): Json<CreateIncident>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    let created = service.create_incident(scope.0, payload).await?;
    Ok((StatusCode::CREATED, Json(IncidentResponse::from(created))))
}

async fn update_incident(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Path(incident_id): Path<Uuid>,
    Json(payload): Json<UpdateIncident>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    let updated = service.update_incident(scope.0, incident_id, payload).await?;
    Ok(Json(IncidentResponse::from(updated)))
}

async fn delete_incident(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Path(incident_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    service.delete_incident(scope.0, incident_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// === Хэндлеры: журнал ===

async fn append_update(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Path(incident_id): Path<Uuid>,
    Json(payload): Json<AppendUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    let incident = service.append_update(scope.0, incident_id, payload).await?;
    Ok((StatusCode::CREATED, Json(IncidentResponse::from(incident))))
}

async fn edit_update(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Path((incident_id, index)): Path<(Uuid, usize)>,
    Json(payload): Json<EditUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    let incident = service
        .edit_update(scope.0, incident_id, index, payload)
        .await?;
    Ok(Json(IncidentResponse::from(incident)))
}

async fn remove_update(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Path((incident_id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    let incident = service.remove_update(scope.0, incident_id, index).await?;
    Ok(Json(IncidentResponse::from(incident)))
}

// === Хэндлеры: обслуживание ===

async fn schedule_maintenance(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
    Json(payload): Json<ScheduleMaintenance>,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    require_admin(&claims)?;
    service.ensure_org(scope.0, claims.org_name.as_deref()).await;
    let incident = service.schedule_maintenance(scope.0, payload).await?;
    Ok((StatusCode::CREATED, Json(IncidentResponse::from(incident))))
}

// === Хэндлеры: снимок и поток событий ===

async fn get_snapshot(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
) -> Result<impl IntoResponse, ApiError> {
    authorize(&claims, &scope)?;
    let snapshot = service.get_snapshot(scope.0).await;
    Ok(Json(snapshot_response(snapshot)))
}

async fn stream_events(
    State(service): State<AppState>,
    claims: Claims,
    scope: OrgScope,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    authorize(&claims, &scope)?;
    let rx = service.hub().subscribe(scope.0);
    let stream = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => Event::default().json_data(&event).ok().map(Ok::<Event, Infallible>),
            // отставший подписчик теряет события, но не рвёт поток
            Err(_) => None,
        }
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// === Публичная витрина (без аутентификации) ===

async fn public_orgs_services(
    State(service): State<AppState>,
) -> Json<HashMap<Uuid, PublicOrgEntry>> {
    let mut out = HashMap::new();
    for (org, snapshot) in service.public_snapshot().await {
        let rendered = snapshot_response(snapshot);
        out.insert(
            org.id,
            PublicOrgEntry {
                name: org.name,
                services: rendered.services,
                incidents: rendered.incidents,
            },
        );
    }
    Json(out)
}

async fn public_org_name(
    State(service): State<AppState>,
    Path(org_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let name = service.get_org_name(org_id).await?;
    Ok(Json(serde_json::json!({ "org_id": org_id, "name": name })))
}

// === Router ===

pub fn create_router(service: Arc<StatusService>) -> Router {
    let cors = tower_http::cors::CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/api/services", get(list_services).post(create_service))
        .route(
            "/api/services/:id",
            axum::routing::put(update_service).delete(delete_service),
        )
        .route("/api/incidents", get(list_incidents).post(create_incident))
        .route(
            "/api/incidents/:id",
            axum::routing::put(update_incident).delete(delete_incident),
        )
        .route("/api/incidents/:id/updates", post(append_update))
        .route(
            "/api/incidents/:id/updates/:index",
            axum::routing::put(edit_update).delete(remove_update),
        )
        .route("/api/maintenance", post(schedule_maintenance))
        .route("/api/snapshot", get(get_snapshot))
        .route("/api/events", get(stream_events))
        .route("/public/orgs_services", get(public_orgs_services))
        .route("/public/org_name/:org_id", get(public_org_name))
        .with_state(service)
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

pub async fn run_web_server(
    service: Arc<StatusService>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(service);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("🌐 Status API запущен на http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
