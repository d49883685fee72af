// src/ledger.rs

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use crate::models::incident::{Update, UpdateStatus};

/// Ошибки журнала
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    InvalidUpdate(String),
    EmptyLedger,
    StaleIndex,
    IndexOutOfRange(usize),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerError::InvalidUpdate(e) => write!(f, "Invalid update: {}", e),
            LedgerError::EmptyLedger => write!(f, "Incident ledger must contain at least one update"),
            LedgerError::StaleIndex => write!(f, "Ledger changed since indices were fetched"),
            LedgerError::IndexOutOfRange(i) => write!(f, "No update at index {}", i),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Патч для правки существующей записи
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UpdatePatch {
    pub message: Option<String>,
    pub status: Option<UpdateStatus>,
}

/// Журнал статусов инцидента — упорядоченный append-only лог.
///
/// Определяющая обязанность журнала: инвариант «не более одной записи
/// со статусом resolved». Любая запись, получающая resolved, атомарно
/// понижает все прочие resolved-записи до monitoring.
///
/// `epoch` растёт при каждом удалении; правка, пришедшая со старым
/// epoch, отклоняется как StaleIndex — индексы после удаления
/// нужно перечитать.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Ledger {
    entries: Vec<Update>,
    epoch: u64,
    next_seq: u64,
}

impl Ledger {
    /// Журнал всегда создаётся с первой записью
    pub fn new(
        message: String,
        status: UpdateStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        validate_message(&message)?;
        let mut ledger = Self {
            entries: Vec::new(),
            epoch: 0,
            next_seq: 0,
        };
        ledger.push(message, status, timestamp);
        Ok(ledger)
    }

    pub fn entries(&self) -> &[Update] {
        &self.entries
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Запись с максимальным timestamp; ничья решается в пользу
    /// большего seq (поздняя запись побеждает)
    pub fn current_status(&self) -> UpdateStatus {
        self.entries
            .iter()
            .max_by_key(|u| (u.timestamp, u.seq))
            .map(|u| u.status)
            .unwrap_or_default() // пустым журнал не бывает по построению
    }

    /// Добавить запись. Возвращает индекс новой записи.
    pub fn append(
        &mut self,
        message: String,
        status: UpdateStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        validate_message(&message)?;
        let index = self.push(message, status, timestamp);
        if status == UpdateStatus::Resolved {
            self.demote_other_resolved(index);
        }
        Ok(index)
    }

    /// Правка записи по индексу. `observed_epoch` — epoch, при котором
    /// вызывающая сторона читала индексы.
    pub fn edit(
        &mut self,
        index: usize,
        patch: UpdatePatch,
        observed_epoch: u64,
    ) -> Result<&Update, LedgerError> {
        if observed_epoch != self.epoch {
            return Err(LedgerError::StaleIndex);
        }
        if index >= self.entries.len() {
            return Err(LedgerError::IndexOutOfRange(index));
        }
        if let Some(message) = &patch.message {
            validate_message(message)?;
        }

        let entry = &mut self.entries[index];
        if let Some(message) = patch.message {
            entry.message = message;
        }
        if let Some(status) = patch.status {
            entry.status = status;
            if status == UpdateStatus::Resolved {
                self.demote_other_resolved(index);
            }
        }
        Ok(&self.entries[index])
    }

    /// Удалить запись. Последнюю оставшуюся удалить нельзя —
    /// инцидент без журнала не существует.
    pub fn remove(&mut self, index: usize) -> Result<(), LedgerError> {
        if index >= self.entries.len() {
            return Err(LedgerError::IndexOutOfRange(index));
        }
        if self.entries.len() == 1 {
            return Err(LedgerError::EmptyLedger);
        }
        self.entries.remove(index);
        self.epoch += 1; // все выданные индексы устарели
        Ok(())
    }

    fn push(&mut self, message: String, status: UpdateStatus, timestamp: DateTime<Utc>) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Update {
            message,
            status,
            timestamp,
            seq,
        });
        self.entries.len() - 1
    }

    /// Понизить все resolved-записи, кроме `keep`, до monitoring
    fn demote_other_resolved(&mut self, keep: usize) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            if i != keep && entry.status == UpdateStatus::Resolved {
                entry.status = UpdateStatus::Monitoring;
            }
        }
    }
}

fn validate_message(message: &str) -> Result<(), LedgerError> {
    if message.trim().is_empty() {
        return Err(LedgerError::InvalidUpdate("message must not be empty".into()));
    }
    Ok(())
}
