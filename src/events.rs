// src/events.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Типы событий мутаций
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ServiceCreated,
    ServiceUpdated,
    ServiceDeleted,
    IncidentCreated,
    IncidentUpdated,
    IncidentDeleted,
    IncidentUpdateAdded,
}

/// Событие мутации в рамках одной организации.
/// `data` несёт только минимальные идентифицирующие поля —
/// подписчики всё равно перечитывают полное состояние.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StatusEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub org_id: Uuid,
    pub data: serde_json::Value,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Точка веерной рассылки событий, по одному каналу на организацию.
/// Каналы создаются лениво; отправка никогда не блокируется —
/// отставший подписчик теряет события (broadcast lag), а не
/// тормозит публикующего.
pub struct EventHub {
    buffer: usize,
    channels: RwLock<HashMap<Uuid, broadcast::Sender<StatusEvent>>>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        tracing::debug!("event hub initialized (buffer={})", buffer);
        Self {
            buffer,
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Подписка на поток событий организации
    pub fn subscribe(&self, org_id: Uuid) -> broadcast::Receiver<StatusEvent> {
        self.sender(org_id).subscribe()
    }

    /// Опубликовать событие. Порядок публикаций внутри организации
    /// сохраняется (FIFO per tenant); между организациями — нет.
    pub fn publish(&self, org_id: Uuid, event_type: EventType, data: serde_json::Value) {
        let event = StatusEvent {
            event_type,
            org_id,
            data,
            timestamp: Utc::now(),
        };
        let sender = self.sender(org_id);
        // игнорируем, если нет получателей
        let _ = sender.send(event);
    }

    fn sender(&self, org_id: Uuid) -> broadcast::Sender<StatusEvent> {
        {
            let channels = self.channels.read().unwrap_or_else(|e| e.into_inner());
            if let Some(sender) = channels.get(&org_id) {
                return sender.clone();
            }
        }
        let mut channels = self.channels.write().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(org_id)
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(self.buffer);
                sender
            })
            .clone()
    }
}
