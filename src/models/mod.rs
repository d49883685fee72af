// src/models/mod.rs

pub mod organization;
pub mod service;
pub mod incident;

pub use organization::Organization;
pub use service::{Service, ServiceStatus, display_status};
pub use incident::{Incident, Update, UpdateStatus};
