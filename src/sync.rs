// src/sync.rs

use futures_util::future::BoxFuture;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::events::StatusEvent;
use crate::status_service::{OrgSnapshot, StatusService};

/// Состояние подключения live-sync клиента
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Connected,
    Disconnected,
}

/// Ошибки транспорта
#[derive(Debug, Clone)]
pub enum TransportError {
    Connect(String),
    Fetch(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::Connect(e) => write!(f, "Connect failed: {}", e),
            TransportError::Fetch(e) => write!(f, "Snapshot fetch failed: {}", e),
        }
    }
}

impl std::error::Error for TransportError {}

pub type EventStream = Pin<Box<dyn Stream<Item = StatusEvent> + Send>>;

/// Транспорт абстрагирован, чтобы машина состояний не зависела
/// от конкретного канала (SSE, WebSocket, in-memory в тестах)
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, org_id: Uuid) -> BoxFuture<'static, Result<EventStream, TransportError>>;
    fn fetch_snapshot(
        &self,
        org_id: Uuid,
    ) -> BoxFuture<'static, Result<OrgSnapshot, TransportError>>;
}

/// Подписчик, держащий соединение с шиной событий одной организации.
///
/// Машина состояний: Connecting → Connected (удачный handshake,
/// счётчик попыток сбрасывается), Connected → Disconnected (обрыв),
/// Disconnected → Connecting (после backoff-задержки
/// `min(base * 2^attempt, max)`). После `max_attempts` подряд
/// неудачных попыток клиент перестаёт переподключаться и остаётся
/// в Disconnected — последний снимок продолжает отображаться.
///
/// Любое принятое событие — лишь сигнал устаревания: клиент не
/// сливает частичный payload в локальное состояние, а перечитывает
/// полный снимок и заменяет состояние целиком.
pub struct SyncClient {
    transport: Arc<dyn Transport>,
    policy: SyncConfig,
    org_id: Uuid,
    snapshot: Arc<RwLock<Option<OrgSnapshot>>>,
    state_rx: watch::Receiver<ConnState>,
    task: JoinHandle<()>,
}

impl SyncClient {
    pub fn start(transport: Arc<dyn Transport>, org_id: Uuid) -> Self {
        Self::with_policy(transport, org_id, SyncConfig::default())
    }

    pub fn with_policy(transport: Arc<dyn Transport>, org_id: Uuid, policy: SyncConfig) -> Self {
        let snapshot: Arc<RwLock<Option<OrgSnapshot>>> = Arc::new(RwLock::new(None));
        let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
        let task = tokio::spawn(run_connection(
            transport.clone(),
            org_id,
            policy,
            state_tx,
            snapshot.clone(),
        ));
        Self {
            transport,
            policy,
            org_id,
            snapshot,
            state_rx,
            task,
        }
    }

    pub fn org_id(&self) -> Uuid {
        self.org_id
    }

    pub fn state(&self) -> ConnState {
        *self.state_rx.borrow()
    }

    /// Наблюдение за сменой состояний (для индикатора в UI)
    pub fn state_watch(&self) -> watch::Receiver<ConnState> {
        self.state_rx.clone()
    }

    /// Последний полный снимок организации, если уже получен
    pub fn snapshot(&self) -> Option<OrgSnapshot> {
        self.snapshot
            .read()
            .map(|guard| guard.clone())
            .unwrap_or(None)
    }

    /// Смена организации: старое соединение рвётся (вместе с
    /// отложенным таймером переподключения), снимок сбрасывается —
    /// события чужой организации не просачиваются даже транзиентно
    pub fn switch_org(&mut self, org_id: Uuid) {
        if org_id == self.org_id {
            return;
        }
        self.task.abort();
        self.org_id = org_id;
        // свежая ячейка снимка: незавершённый refetch старой
        // организации допишет в брошенную, а не в новую
        self.snapshot = Arc::new(RwLock::new(None));
        let (state_tx, state_rx) = watch::channel(ConnState::Connecting);
        self.state_rx = state_rx;
        self.task = tokio::spawn(run_connection(
            self.transport.clone(),
            org_id,
            self.policy,
            state_tx,
            self.snapshot.clone(),
        ));
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_connection(
    transport: Arc<dyn Transport>,
    org_id: Uuid,
    policy: SyncConfig,
    state_tx: watch::Sender<ConnState>,
    snapshot: Arc<RwLock<Option<OrgSnapshot>>>,
) {
    let mut attempts: u32 = 0;
    loop {
        let _ = state_tx.send(ConnState::Connecting);
        match transport.connect(org_id).await {
            Ok(mut stream) => {
                attempts = 0;
                let _ = state_tx.send(ConnState::Connected);
                tracing::debug!(%org_id, "sync connected");
                // схождение после (пере)подключения: пропущенные события
                // покрываются полным перечитыванием
                spawn_refetch(&transport, org_id, &snapshot);

                while let Some(event) = stream.next().await {
                    tracing::debug!(%org_id, event_type = ?event.event_type, "sync event");
                    spawn_refetch(&transport, org_id, &snapshot);
                }
                tracing::warn!(%org_id, "sync stream closed");
            }
            Err(e) => {
                tracing::warn!(%org_id, error = %e, "sync connect failed");
            }
        }
        let _ = state_tx.send(ConnState::Disconnected);

        if attempts >= policy.max_attempts {
            tracing::warn!(%org_id, attempts, "reconnect attempts exhausted, staying disconnected");
            return;
        }
        let delay_ms = policy
            .base_delay_ms
            .saturating_mul(1u64 << attempts.min(31))
            .min(policy.max_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        attempts += 1;
    }
}

/// Транспорт поверх внутренней шины — для клиента, живущего в том же
/// процессе, что и сервис (другие админ-сессии, smoke-прогоны)
pub struct LocalTransport {
    service: Arc<StatusService>,
}

impl LocalTransport {
    pub fn new(service: Arc<StatusService>) -> Self {
        Self { service }
    }
}

impl Transport for LocalTransport {
    fn connect(&self, org_id: Uuid) -> BoxFuture<'static, Result<EventStream, TransportError>> {
        let rx = self.service.hub().subscribe(org_id);
        let stream: EventStream = Box::pin(
            tokio_stream::wrappers::BroadcastStream::new(rx)
                // отставание broadcast не рвёт поток, события просто теряются
                .filter_map(|result| async move { result.ok() }),
        );
        Box::pin(async move { Ok(stream) })
    }

    fn fetch_snapshot(
        &self,
        org_id: Uuid,
    ) -> BoxFuture<'static, Result<OrgSnapshot, TransportError>> {
        let service = self.service.clone();
        Box::pin(async move { Ok(service.get_snapshot(org_id).await) })
    }
}

/// Перечитывание снимка — fire-and-forget: медленный fetch не
/// блокирует приём следующих событий
fn spawn_refetch(
    transport: &Arc<dyn Transport>,
    org_id: Uuid,
    snapshot: &Arc<RwLock<Option<OrgSnapshot>>>,
) {
    let transport = transport.clone();
    let snapshot = snapshot.clone();
    tokio::spawn(async move {
        match transport.fetch_snapshot(org_id).await {
            Ok(fresh) => {
                // замена целиком, никаких частичных слияний
                if let Ok(mut guard) = snapshot.write() {
                    *guard = Some(fresh);
                }
            }
            Err(e) => {
                tracing::warn!(%org_id, error = %e, "snapshot refetch failed");
            }
        }
    });
}
