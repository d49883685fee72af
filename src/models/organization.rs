// src/models/organization.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;

/// Организация — граница изоляции (tenant)
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: chrono::DateTime<Utc>,
    pub meta: std::collections::HashMap<String, String>,
}

impl Organization {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: Utc::now(),
            meta: std::collections::HashMap::new(),
        }
    }
}
