use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::models::{Consultation, ConsultationStatus, EditHistoryEntry};

/// In-memory consultation repository.
///
/// Stands in for the external persistence collaborator: keyed records,
/// closure-based updates, edit-history retention, and the per-id edit
/// reservation that serializes review edits. Reads clone the record so
/// polling and export never block a running pipeline.
#[derive(Default)]
pub struct ConsultationStore {
    records: RwLock<HashMap<Uuid, Consultation>>,
    history: RwLock<HashMap<Uuid, Vec<EditHistoryEntry>>>,
    edits_in_flight: Mutex<HashSet<Uuid>>,
}

/// Exclusive reservation for one consultation's edit. Released on drop.
pub struct EditToken<'a> {
    store: &'a ConsultationStore,
    id: Uuid,
}

impl Drop for EditToken<'_> {
    fn drop(&mut self) {
        self.store
            .edits_in_flight
            .lock()
            .expect("edit registry lock poisoned")
            .remove(&self.id);
    }
}

impl ConsultationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, consultation: Consultation) {
        self.records
            .write()
            .expect("consultation store lock poisoned")
            .insert(consultation.id, consultation);
    }

    pub fn get(&self, id: Uuid) -> Option<Consultation> {
        self.records
            .read()
            .expect("consultation store lock poisoned")
            .get(&id)
            .cloned()
    }

    /// Apply `f` to the stored record and return the updated copy.
    pub fn update(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Consultation),
    ) -> Result<Consultation> {
        let mut records = self
            .records
            .write()
            .expect("consultation store lock poisoned");
        let record = records.get_mut(&id).ok_or(PipelineError::NotFound(id))?;
        f(record);
        Ok(record.clone())
    }

    /// Most-recent-first listing with an optional status filter.
    pub fn list(
        &self,
        status: Option<ConsultationStatus>,
        limit: usize,
    ) -> Vec<Consultation> {
        let records = self
            .records
            .read()
            .expect("consultation store lock poisoned");
        let mut matched: Vec<Consultation> = records
            .values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        matched
    }

    /// Reserve the exclusive right to edit `id`. A second reservation while
    /// one is outstanding is the concurrent-edit collision and is rejected.
    pub fn begin_edit(&self, id: Uuid) -> Result<EditToken<'_>> {
        let mut in_flight = self
            .edits_in_flight
            .lock()
            .expect("edit registry lock poisoned");
        if !in_flight.insert(id) {
            return Err(PipelineError::Conflict(id));
        }
        Ok(EditToken { store: self, id })
    }

    pub fn append_history(&self, entry: EditHistoryEntry) {
        self.history
            .write()
            .expect("edit history lock poisoned")
            .entry(entry.consultation_id)
            .or_default()
            .push(entry);
    }

    pub fn history(&self, id: Uuid) -> Vec<EditHistoryEntry> {
        self.history
            .read()
            .expect("edit history lock poisoned")
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}
