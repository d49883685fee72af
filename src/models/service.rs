// src/models/service.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

use crate::models::incident::Incident;

/// Заявленный статус сервиса.
/// `UnderMaintenance` никогда не записывается в поле `status` напрямую —
/// он выводится агрегатором из открытого maintenance-инцидента.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    #[default]
    Operational,
    PartialOutage,
    DegradedPerformance,
    MajorOutage,
    UnderMaintenance,
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServiceStatus::Operational => "operational",
            ServiceStatus::PartialOutage => "partial_outage",
            ServiceStatus::DegradedPerformance => "degraded_performance",
            ServiceStatus::MajorOutage => "major_outage",
            ServiceStatus::UnderMaintenance => "under_maintenance",
        };
        write!(f, "{}", s)
    }
}

/// Сервис — наблюдаемая единица внутри организации
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Service {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: ServiceStatus,
    pub uptime: f64,
    pub link: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

/// Агрегатор отображаемого статуса.
/// Открытое плановое обслуживание перекрывает заявленный статус;
/// из обычных открытых инцидентов деградация НЕ выводится — админ
/// выставляет поле `status` явно.
pub fn display_status(service: &Service, incidents: &[Incident]) -> ServiceStatus {
    let in_maintenance = incidents
        .iter()
        .any(|i| i.service_id == service.id && i.is_open_maintenance());

    if in_maintenance {
        ServiceStatus::UnderMaintenance
    } else {
        service.status
    }
}
