use std::sync::{Arc, Mutex};

use serde_json::Value;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::models::{AuditAction, AuditLogEntry};

/// Append-only destination for audit records. The production sink is an
/// external compliance store; [`MemoryAuditLog`] stands in elsewhere.
pub trait AuditSink: Send + Sync {
    fn append(&self, entry: AuditLogEntry) -> Result<()>;
}

/// In-memory append-only audit log
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().expect("audit log lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditLog {
    fn append(&self, entry: AuditLogEntry) -> Result<()> {
        self.entries
            .lock()
            .expect("audit log lock poisoned")
            .push(entry);
        Ok(())
    }
}

/// Records state transitions against the configured sink. Every transition
/// in the pipeline and the review machine goes through [`record`] before
/// the transition is committed, so a crash can never yield a success
/// response without its audit record.
///
/// [`record`]: AuditLogWriter::record
#[derive(Clone)]
pub struct AuditLogWriter {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogWriter {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn record(
        &self,
        actor: &str,
        action: AuditAction,
        consultation_id: Uuid,
        details: Value,
    ) -> Result<()> {
        let entry = AuditLogEntry::new(actor, action, "consultation", consultation_id, details);
        self.sink
            .append(entry)
            .map_err(|e| PipelineError::Audit(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let log = Arc::new(MemoryAuditLog::new());
        let writer = AuditLogWriter::new(log.clone());
        let id = Uuid::new_v4();

        writer
            .record("pipeline", AuditAction::Create, id, json!({"method": "primary"}))
            .unwrap();
        writer
            .record("dr.rao", AuditAction::Approve, id, json!({}))
            .unwrap();

        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, AuditAction::Create);
        assert_eq!(entries[0].resource_id, id);
        assert_eq!(entries[1].actor, "dr.rao");
    }

    struct RefusingSink;

    impl AuditSink for RefusingSink {
        fn append(&self, _entry: AuditLogEntry) -> Result<()> {
            Err(PipelineError::Audit("sink offline".to_string()))
        }
    }

    #[test]
    fn test_sink_failure_surfaces_as_audit_error() {
        let writer = AuditLogWriter::new(Arc::new(RefusingSink));
        let err = writer
            .record("pipeline", AuditAction::Create, Uuid::new_v4(), json!({}))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Audit(_)));
    }
}
