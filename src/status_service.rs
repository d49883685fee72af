// src/status_service.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use serde_json::json;

use crate::events::{EventHub, EventType};
use crate::ledger::{LedgerError, UpdatePatch};
use crate::models::{display_status, Incident, Organization, Service, ServiceStatus, UpdateStatus};

/// Ошибки доменного слоя
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    InvalidInput(String),
    InvalidUpdate(String),
    InvalidWindow,
    EmptyLedger,
    StaleIndex,
    MaintenanceAlreadyScheduled,
    NotFound(String),
}

impl From<LedgerError> for StatusError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidUpdate(msg) => StatusError::InvalidUpdate(msg),
            LedgerError::EmptyLedger => StatusError::EmptyLedger,
            LedgerError::StaleIndex => StatusError::StaleIndex,
            LedgerError::IndexOutOfRange(i) => StatusError::NotFound(format!("update index {}", i)),
        }
    }
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            StatusError::InvalidUpdate(e) => write!(f, "Invalid update: {}", e),
            StatusError::InvalidWindow => write!(f, "Maintenance window must have start < end"),
            StatusError::EmptyLedger => write!(f, "Incident must keep at least one update"),
            StatusError::StaleIndex => write!(f, "Update indices are stale, re-fetch the incident"),
            StatusError::MaintenanceAlreadyScheduled => {
                write!(f, "Service already has an open maintenance incident")
            }
            StatusError::NotFound(e) => write!(f, "Not found: {}", e),
        }
    }
}

impl std::error::Error for StatusError {}

// === Запросы мутаций ===

#[derive(Deserialize, Debug, Clone)]
pub struct CreateService {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default = "default_uptime")]
    pub uptime: f64,
    pub link: Option<String>,
}

fn default_uptime() -> f64 {
    100.0
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdateService {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ServiceStatus>,
    pub uptime: Option<f64>,
    pub link: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateIncident {
    pub title: String,
    pub service_id: Uuid,
    pub message: String,
    #[serde(default)]
    pub status: UpdateStatus,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UpdateIncident {
    pub title: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AppendUpdate {
    pub message: String,
    pub status: UpdateStatus,
    /// По умолчанию — серверное время
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct EditUpdate {
    pub message: Option<String>,
    pub status: Option<UpdateStatus>,
    /// Epoch журнала, при котором клиент читал индексы
    pub epoch: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ScheduleMaintenance {
    pub service_id: Uuid,
    pub title: String,
    pub message: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Полный снимок состояния организации — то, что перечитывает
/// live-sync клиент по любому событию
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OrgSnapshot {
    pub services: Vec<Service>,
    pub incidents: Vec<Incident>,
}

struct OrgData {
    org: Organization,
    services: HashMap<Uuid, Service>,
    incidents: HashMap<Uuid, Incident>,
}

/// Доменный сервис поверх in-memory хранилища.
///
/// Все мутации идут через write-lock одного RwLock: записи в журнал
/// одного инцидента сериализуются (инвариант «один resolved» не
/// наблюдаем нарушенным даже транзиентно), а комбинированная запись
/// планировщика обслуживания атомарна.
pub struct StatusService {
    store: RwLock<HashMap<Uuid, OrgData>>,
    hub: Arc<EventHub>,
}

impl StatusService {
    pub fn new(hub: Arc<EventHub>) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            hub,
        }
    }

    pub fn hub(&self) -> &Arc<EventHub> {
        &self.hub
    }

    /// Лениво завести организацию; имя приходит из claims
    /// identity-провайдера и кэшируется здесь
    pub async fn ensure_org(&self, org_id: Uuid, name: Option<&str>) {
        let mut store = self.store.write().await;
        let data = store.entry(org_id).or_insert_with(|| OrgData {
            org: Organization::new(org_id, ""),
            services: HashMap::new(),
            incidents: HashMap::new(),
        });
        if let Some(name) = name {
            if !name.is_empty() && data.org.name != name {
                data.org.name = name.to_string();
            }
        }
    }

    // === SERVICES ===

    pub async fn list_services(&self, org_id: Uuid) -> Vec<Service> {
        let store = self.store.read().await;
        let mut services: Vec<Service> = store
            .get(&org_id)
            .map(|d| d.services.values().cloned().collect())
            .unwrap_or_default();
        services.sort_by_key(|s| s.created_at);
        services
    }

    pub async fn create_service(
        &self,
        org_id: Uuid,
        req: CreateService,
    ) -> Result<Service, StatusError> {
        validate_declared_status(req.status)?;
        if req.name.trim().is_empty() {
            return Err(StatusError::InvalidInput("service name must not be empty".into()));
        }

        let service = Service {
            id: Uuid::new_v4(),
            org_id,
            name: req.name,
            description: req.description,
            status: req.status,
            uptime: req.uptime,
            link: req.link,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            data.services.insert(service.id, service.clone());
        }

        self.hub.publish(
            org_id,
            EventType::ServiceCreated,
            json!({"id": service.id, "name": service.name}),
        );
        Ok(service)
    }

    pub async fn update_service(
        &self,
        org_id: Uuid,
        service_id: Uuid,
        req: UpdateService,
    ) -> Result<Service, StatusError> {
        if let Some(status) = req.status {
            validate_declared_status(status)?;
        }

        let service = {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            let service = data
                .services
                .get_mut(&service_id)
                .ok_or_else(|| StatusError::NotFound(format!("service {}", service_id)))?;

            if let Some(name) = req.name {
                if name.trim().is_empty() {
                    return Err(StatusError::InvalidInput("service name must not be empty".into()));
                }
                service.name = name;
            }
            if let Some(description) = req.description {
                service.description = Some(description);
            }
            if let Some(status) = req.status {
                service.status = status;
            }
            if let Some(uptime) = req.uptime {
                service.uptime = uptime;
            }
            if let Some(link) = req.link {
                service.link = Some(link);
            }
            service.updated_at = Utc::now();
            service.clone()
        };

        self.hub.publish(
            org_id,
            EventType::ServiceUpdated,
            json!({"id": service.id, "name": service.name}),
        );
        Ok(service)
    }

    /// Удаляет сервис вместе с его инцидентами — осиротевших
    /// инцидентов в хранилище не остаётся
    pub async fn delete_service(&self, org_id: Uuid, service_id: Uuid) -> Result<(), StatusError> {
        {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            data.services
                .remove(&service_id)
                .ok_or_else(|| StatusError::NotFound(format!("service {}", service_id)))?;
            data.incidents.retain(|_, i| i.service_id != service_id);
        }

        self.hub
            .publish(org_id, EventType::ServiceDeleted, json!({"id": service_id}));
        Ok(())
    }

    // === INCIDENTS ===

    pub async fn list_incidents(&self, org_id: Uuid) -> Vec<Incident> {
        let store = self.store.read().await;
        let mut incidents: Vec<Incident> = store
            .get(&org_id)
            .map(|d| d.incidents.values().cloned().collect())
            .unwrap_or_default();
        incidents.sort_by_key(|i| std::cmp::Reverse(i.created_at));
        incidents
    }

    pub async fn get_incident(&self, org_id: Uuid, incident_id: Uuid) -> Result<Incident, StatusError> {
        let store = self.store.read().await;
        store
            .get(&org_id)
            .and_then(|d| d.incidents.get(&incident_id))
            .cloned()
            .ok_or_else(|| StatusError::NotFound(format!("incident {}", incident_id)))
    }

    pub async fn create_incident(
        &self,
        org_id: Uuid,
        req: CreateIncident,
    ) -> Result<Incident, StatusError> {
        if req.title.trim().is_empty() {
            return Err(StatusError::InvalidInput("incident title must not be empty".into()));
        }

        let incident = {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            if !data.services.contains_key(&req.service_id) {
                return Err(StatusError::NotFound(format!("service {}", req.service_id)));
            }
            let incident = Incident::new(
                org_id,
                req.service_id,
                req.title,
                req.message,
                req.status,
                Utc::now(),
            )?;
            data.incidents.insert(incident.id, incident.clone());
            incident
        };

        self.hub.publish(
            org_id,
            EventType::IncidentCreated,
            json!({"id": incident.id, "title": incident.title}),
        );
        Ok(incident)
    }

    pub async fn update_incident(
        &self,
        org_id: Uuid,
        incident_id: Uuid,
        req: UpdateIncident,
    ) -> Result<Incident, StatusError> {
        if req.title.trim().is_empty() {
            return Err(StatusError::InvalidInput("incident title must not be empty".into()));
        }

        let incident = {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            let incident = data
                .incidents
                .get_mut(&incident_id)
                .ok_or_else(|| StatusError::NotFound(format!("incident {}", incident_id)))?;
            incident.title = req.title;
            incident.clone()
        };

        self.hub.publish(
            org_id,
            EventType::IncidentUpdated,
            json!({"id": incident.id, "title": incident.title}),
        );
        Ok(incident)
    }

    /// Логическое удаление — инцидент убирается из активной коллекции
    pub async fn delete_incident(&self, org_id: Uuid, incident_id: Uuid) -> Result<(), StatusError> {
        {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            data.incidents
                .remove(&incident_id)
                .ok_or_else(|| StatusError::NotFound(format!("incident {}", incident_id)))?;
        }

        self.hub
            .publish(org_id, EventType::IncidentDeleted, json!({"id": incident_id}));
        Ok(())
    }

    // === UPDATE LEDGER ===

    pub async fn append_update(
        &self,
        org_id: Uuid,
        incident_id: Uuid,
        req: AppendUpdate,
    ) -> Result<Incident, StatusError> {
        let (incident, was_resolved) = {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            let incident = data
                .incidents
                .get_mut(&incident_id)
                .ok_or_else(|| StatusError::NotFound(format!("incident {}", incident_id)))?;

            let was_resolved = incident.current_status() == UpdateStatus::Resolved;
            incident.ledger.append(
                req.message,
                req.status,
                req.timestamp.unwrap_or_else(Utc::now),
            )?;
            (incident.clone(), was_resolved)
        };

        self.hub.publish(
            org_id,
            EventType::IncidentUpdateAdded,
            json!({"id": incident.id, "title": incident.title}),
        );
        self.on_status_transition(org_id, &incident, was_resolved).await;
        Ok(incident)
    }

    pub async fn edit_update(
        &self,
        org_id: Uuid,
        incident_id: Uuid,
        index: usize,
        req: EditUpdate,
    ) -> Result<Incident, StatusError> {
        let (incident, was_resolved) = {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            let incident = data
                .incidents
                .get_mut(&incident_id)
                .ok_or_else(|| StatusError::NotFound(format!("incident {}", incident_id)))?;

            let was_resolved = incident.current_status() == UpdateStatus::Resolved;
            let patch = UpdatePatch {
                message: req.message,
                status: req.status,
            };
            incident.ledger.edit(index, patch, req.epoch)?;
            (incident.clone(), was_resolved)
        };

        self.hub.publish(
            org_id,
            EventType::IncidentUpdated,
            json!({"id": incident.id, "title": incident.title}),
        );
        self.on_status_transition(org_id, &incident, was_resolved).await;
        Ok(incident)
    }

    pub async fn remove_update(
        &self,
        org_id: Uuid,
        incident_id: Uuid,
        index: usize,
    ) -> Result<Incident, StatusError> {
        let incident = {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            let incident = data
                .incidents
                .get_mut(&incident_id)
                .ok_or_else(|| StatusError::NotFound(format!("incident {}", incident_id)))?;
            incident.ledger.remove(index)?;
            incident.clone()
        };

        self.hub.publish(
            org_id,
            EventType::IncidentUpdated,
            json!({"id": incident.id, "title": incident.title}),
        );
        Ok(incident)
    }

    // === MAINTENANCE SCHEDULER ===

    /// Создаёт maintenance-инцидент с monitoring-записью об окне.
    /// Обе стороны связки (инцидент + видимый статус сервиса) меняются
    /// под одним write-lock — целиком или никак.
    pub async fn schedule_maintenance(
        &self,
        org_id: Uuid,
        req: ScheduleMaintenance,
    ) -> Result<Incident, StatusError> {
        if req.start >= req.end {
            return Err(StatusError::InvalidWindow);
        }
        if req.title.trim().is_empty() {
            return Err(StatusError::InvalidInput("maintenance title must not be empty".into()));
        }

        let incident = {
            let mut store = self.store.write().await;
            let data = org_mut(&mut store, org_id)?;
            if !data.services.contains_key(&req.service_id) {
                return Err(StatusError::NotFound(format!("service {}", req.service_id)));
            }
            let already_open = data
                .incidents
                .values()
                .any(|i| i.service_id == req.service_id && i.is_open_maintenance());
            if already_open {
                return Err(StatusError::MaintenanceAlreadyScheduled);
            }

            let message = req.message.unwrap_or_else(|| {
                format!(
                    "Maintenance window scheduled from {} to {}",
                    req.start.to_rfc3339(),
                    req.end.to_rfc3339()
                )
            });
            let mut incident = Incident::new(
                org_id,
                req.service_id,
                req.title,
                message,
                UpdateStatus::Monitoring,
                Utc::now(),
            )?;
            incident.is_maintenance = true;
            incident.scheduled_start = Some(req.start);
            incident.scheduled_end = Some(req.end);
            data.incidents.insert(incident.id, incident.clone());
            incident
        };

        self.hub.publish(
            org_id,
            EventType::IncidentCreated,
            json!({"id": incident.id, "title": incident.title}),
        );
        Ok(incident)
    }

    // === SNAPSHOTS ===

    pub async fn get_snapshot(&self, org_id: Uuid) -> OrgSnapshot {
        OrgSnapshot {
            services: self.list_services(org_id).await,
            incidents: self.list_incidents(org_id).await,
        }
    }

    pub async fn get_org_name(&self, org_id: Uuid) -> Result<String, StatusError> {
        let store = self.store.read().await;
        store
            .get(&org_id)
            .map(|d| d.org.name.clone())
            .ok_or_else(|| StatusError::NotFound(format!("organization {}", org_id)))
    }

    /// Публичный срез: все организации с их сервисами и инцидентами
    pub async fn public_snapshot(&self) -> Vec<(Organization, OrgSnapshot)> {
        let orgs: Vec<Organization> = {
            let store = self.store.read().await;
            store.values().map(|d| d.org.clone()).collect()
        };
        let mut out = Vec::with_capacity(orgs.len());
        for org in orgs {
            let snapshot = self.get_snapshot(org.id).await;
            out.push((org, snapshot));
        }
        out
    }

    /// Переход инцидента в resolved: агрегатор пересчитывает
    /// отображаемый статус владеющего сервиса
    async fn on_status_transition(&self, org_id: Uuid, incident: &Incident, was_resolved: bool) {
        if was_resolved || incident.current_status() != UpdateStatus::Resolved {
            return;
        }
        let store = self.store.read().await;
        if let Some(data) = store.get(&org_id) {
            if let Some(service) = data.services.get(&incident.service_id) {
                let incidents: Vec<Incident> = data.incidents.values().cloned().collect();
                let display_st = display_status(service, &incidents);
                tracing::info!(
                    service = %service.name,
                    status = %display_st,
                    "incident resolved, service display status recomputed"
                );
            }
        }
        drop(store);
        self.hub.publish(
            org_id,
            EventType::ServiceUpdated,
            json!({"id": incident.service_id}),
        );
    }
}

fn validate_declared_status(status: ServiceStatus) -> Result<(), StatusError> {
    if status == ServiceStatus::UnderMaintenance {
        return Err(StatusError::InvalidInput(
            "under_maintenance is managed by the maintenance scheduler".into(),
        ));
    }
    Ok(())
}

fn org_mut(
    store: &mut HashMap<Uuid, OrgData>,
    org_id: Uuid,
) -> Result<&mut OrgData, StatusError> {
    store
        .get_mut(&org_id)
        .ok_or_else(|| StatusError::NotFound(format!("organization {}", org_id)))
}
