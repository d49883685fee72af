// src/models/incident.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::ledger::{Ledger, LedgerError};

/// Статус записи в журнале инцидента
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    #[default]
    Investigating,
    Identified,
    Monitoring,
    Resolved,
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UpdateStatus::Investigating => "investigating",
            UpdateStatus::Identified => "identified",
            UpdateStatus::Monitoring => "monitoring",
            UpdateStatus::Resolved => "resolved",
        };
        write!(f, "{}", s)
    }
}

/// Одна запись журнала: сообщение + статус + отметка времени.
/// `seq` — порядковый номер добавления, переживает удаления
/// и разрешает ничьи по timestamp (поздняя запись побеждает).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Update {
    pub message: String,
    pub status: UpdateStatus,
    pub timestamp: DateTime<Utc>,
    pub seq: u64,
}

/// Инцидент привязан ровно к одному сервису.
/// Текущий статус НЕ хранится — он выводится из журнала (см. `current_status`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Incident {
    pub id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    pub service_id: Uuid,
    pub is_maintenance: bool,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub ledger: Ledger,
}

impl Incident {
    /// Инцидент никогда не создаётся без первой записи журнала
    pub fn new(
        org_id: Uuid,
        service_id: Uuid,
        title: impl Into<String>,
        first_message: impl Into<String>,
        first_status: UpdateStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let ledger = Ledger::new(first_message.into(), first_status, timestamp)?;
        Ok(Self {
            id: Uuid::new_v4(),
            org_id,
            title: title.into(),
            service_id,
            is_maintenance: false,
            scheduled_start: None,
            scheduled_end: None,
            created_at: Utc::now(),
            ledger,
        })
    }

    /// Текущий статус инцидента — чистая функция журнала:
    /// запись с максимальным timestamp, при равенстве — с большим seq.
    pub fn current_status(&self) -> UpdateStatus {
        self.ledger.current_status()
    }

    /// Открытое плановое обслуживание?
    pub fn is_open_maintenance(&self) -> bool {
        self.is_maintenance && self.current_status() != UpdateStatus::Resolved
    }
}
