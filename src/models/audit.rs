use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action recorded on an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Approve,
    Delete,
    Export,
}

/// One append-only audit record. Entries are retained for the compliance
/// window and never mutated or deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: AuditAction,
    pub resource_type: String,
    pub resource_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    pub fn new(
        actor: impl Into<String>,
        action: AuditAction,
        resource_type: impl Into<String>,
        resource_id: Uuid,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor: actor.into(),
            action,
            resource_type: resource_type.into(),
            resource_id,
            timestamp: Utc::now(),
            details,
        }
    }
}

/// Immutable record of one accepted review edit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditHistoryEntry {
    pub consultation_id: Uuid,
    pub editor: String,
    pub field: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}
