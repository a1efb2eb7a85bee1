use chrono::{DateTime, Utc};
use shared::{PredictionRecord, WasteLabel};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

type SessionMap = HashMap<Uuid, Arc<Mutex<SessionState>>>;

const CSV_HEADER: &str = "Time,Prediction,Confidence";

/// Prediction history of one interactive session.
///
/// The history only ever covers the most recent upload batch: it is cleared whenever
/// a new batch starts.
#[derive(Debug, Default)]
pub struct SessionState {
    records: Vec<PredictionRecord>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }

    pub fn record(&mut self, label: WasteLabel, confidence: f64, at: DateTime<Utc>) {
        self.records.push(PredictionRecord {
            timestamp: at,
            label,
            confidence,
        });
    }

    pub fn records(&self) -> &[PredictionRecord] {
        &self.records
    }

    pub fn export_csv(&self) -> String {
        let mut csv = String::with_capacity(CSV_HEADER.len() + 1 + self.records.len() * 40);
        csv.push_str(CSV_HEADER);
        csv.push('\n');
        for record in &self.records {
            // writing into a String cannot fail
            let _ = writeln!(
                csv,
                "{},{},{:.2}",
                record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                record.label,
                record.confidence
            );
        }
        csv
    }

    pub fn export_file_name(now: DateTime<Utc>) -> String {
        format!("smartwaste_predictions_{}.csv", now.format("%Y%m%d_%H%M%S"))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Session store lock poisoned")]
pub struct PoisonedStore;

/// All live sessions, addressed by the id handed out on creation.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<SessionMap>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> Result<MutexGuard<'_, SessionMap>, PoisonedStore> {
        self.sessions.lock().map_err(|_| PoisonedStore)
    }

    pub fn create(&self) -> Result<Uuid, PoisonedStore> {
        let id = Uuid::new_v4();
        self.sessions()?
            .insert(id, Arc::new(Mutex::new(SessionState::new())));
        log::info!("Created session {}", id);
        Ok(id)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Arc<Mutex<SessionState>>>, PoisonedStore> {
        Ok(self.sessions()?.get(&id).cloned())
    }

    pub fn remove(&self, id: Uuid) -> Result<bool, PoisonedStore> {
        let removed = self.sessions()?.remove(&id).is_some();
        if removed {
            log::info!("Closed session {}", id);
        }
        Ok(removed)
    }

    pub fn len(&self) -> Result<usize, PoisonedStore> {
        Ok(self.sessions()?.len())
    }
}
