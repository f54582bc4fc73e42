use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditLogWriter;
use crate::error::{PipelineError, Result};
use crate::models::{
    AuditAction, ConsultationStatus, EditHistoryEntry, ReviewStatus, SoapNote,
};
use crate::store::ConsultationStore;

/// Result of an accepted edit
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub edit_count: u32,
    pub review_status: ReviewStatus,
}

/// Result of an approval
#[derive(Debug, Clone)]
pub struct ApproveOutcome {
    pub status: ConsultationStatus,
    pub approved_at: DateTime<Utc>,
}

/// Governs every transition after the pipeline hands a consultation to
/// review.
///
/// Edits and approvals for the same consultation are serialized through
/// the store's per-id reservation; the loser of a race gets
/// [`PipelineError::Conflict`] rather than a silent merge. Each accepted
/// transition writes its audit entry before the record is committed.
/// Approval is idempotent, and nothing transitions out of `Completed` or
/// `Failed`.
pub struct ReviewStateMachine {
    store: Arc<ConsultationStore>,
    audit: AuditLogWriter,
}

impl ReviewStateMachine {
    pub fn new(store: Arc<ConsultationStore>, audit: AuditLogWriter) -> Self {
        Self { store, audit }
    }

    /// Replace the note under review. Increments `edit_count` by exactly
    /// one and appends an immutable history entry.
    pub fn edit(
        &self,
        id: Uuid,
        editor: &str,
        mut new_note: SoapNote,
        reason: Option<String>,
    ) -> Result<EditOutcome> {
        let _token = self.store.begin_edit(id)?;

        let current = self.store.get(id).ok_or(PipelineError::NotFound(id))?;
        if current.status != ConsultationStatus::Review {
            return Err(PipelineError::Validation(format!(
                "consultation is not editable in status '{:?}'",
                current.status
            )));
        }

        new_note.refresh_markdown();
        let edit_count = current.review.edit_count + 1;
        let history = EditHistoryEntry {
            consultation_id: id,
            editor: editor.to_string(),
            field: "note".to_string(),
            old_value: serde_json::to_value(&current.note).unwrap_or_default(),
            new_value: serde_json::to_value(&new_note).unwrap_or_default(),
            reason: reason.clone(),
            timestamp: Utc::now(),
        };

        self.audit.record(
            editor,
            AuditAction::Update,
            id,
            json!({ "field": "note", "edit_count": edit_count, "reason": reason }),
        )?;

        self.store.update(id, |c| {
            c.note = Some(new_note);
            c.review.review_status = ReviewStatus::UnderReview;
            c.review.edit_count = edit_count;
            c.review.last_editor = Some(editor.to_string());
        })?;
        self.store.append_history(history);

        info!(consultation = %id, editor, edit_count, "note edited");
        Ok(EditOutcome {
            edit_count,
            review_status: ReviewStatus::UnderReview,
        })
    }

    /// Approve the consultation, optionally with a final note revision.
    /// Approving an already-completed consultation is a no-op success.
    pub fn approve(
        &self,
        id: Uuid,
        approver: &str,
        note: Option<SoapNote>,
    ) -> Result<ApproveOutcome> {
        let _token = self.store.begin_edit(id)?;

        let current = self.store.get(id).ok_or(PipelineError::NotFound(id))?;
        if current.status == ConsultationStatus::Completed {
            let approved_at = current
                .review
                .approved_at
                .unwrap_or_else(|| Utc::now());
            return Ok(ApproveOutcome {
                status: ConsultationStatus::Completed,
                approved_at,
            });
        }
        if current.status != ConsultationStatus::Review {
            return Err(PipelineError::Validation(format!(
                "consultation cannot be approved in status '{:?}'",
                current.status
            )));
        }

        let final_note = match note {
            Some(mut revised) => {
                revised.refresh_markdown();
                Some(revised)
            }
            None => current.note.clone(),
        };
        if final_note.is_none() {
            return Err(PipelineError::Validation(
                "consultation has no note to approve".to_string(),
            ));
        }

        let approved_at = Utc::now();
        self.audit
            .record(approver, AuditAction::Approve, id, json!({}))?;

        self.store.update(id, |c| {
            c.note = final_note;
            c.review.review_status = ReviewStatus::Approved;
            c.review.approved_by = Some(approver.to_string());
            c.review.approved_at = Some(approved_at);
            c.status = ConsultationStatus::Completed;
            c.completed_at = Some(approved_at);
        })?;

        info!(consultation = %id, approver, "consultation approved");
        Ok(ApproveOutcome {
            status: ConsultationStatus::Completed,
            approved_at,
        })
    }

    /// Mark the current note as rejected. The consultation stays in
    /// review; a later edit or approval remains possible.
    pub fn reject(&self, id: Uuid, reviewer: &str, reason: Option<String>) -> Result<()> {
        let _token = self.store.begin_edit(id)?;

        let current = self.store.get(id).ok_or(PipelineError::NotFound(id))?;
        if current.status != ConsultationStatus::Review {
            return Err(PipelineError::Validation(format!(
                "consultation cannot be rejected in status '{:?}'",
                current.status
            )));
        }

        self.audit.record(
            reviewer,
            AuditAction::Update,
            id,
            json!({ "review_status": "rejected", "reason": reason }),
        )?;
        self.store.update(id, |c| {
            c.review.review_status = ReviewStatus::Rejected;
            c.review.last_editor = Some(reviewer.to_string());
        })?;

        info!(consultation = %id, reviewer, "note rejected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::models::{AudioMetadata, Consultation, Language, PlanItem};

    fn reviewable_consultation() -> Consultation {
        let mut consultation = Consultation::new(
            "user-1".to_string(),
            Some("Priya".to_string()),
            Language::Tamil,
            AudioMetadata {
                storage_path: "audio-files/a.mp3".to_string(),
                format: "mp3".to_string(),
                byte_size: 1024,
                duration_secs: 60.0,
            },
        );
        consultation.status = ConsultationStatus::Review;
        consultation.note = Some(SoapNote::new(
            vec!["Fever for 3 days".to_string()],
            vec![],
            vec!["Viral fever".to_string()],
            vec![],
        ));
        consultation
    }

    fn machine() -> (ReviewStateMachine, Arc<ConsultationStore>, Arc<MemoryAuditLog>) {
        let store = Arc::new(ConsultationStore::new());
        let log = Arc::new(MemoryAuditLog::new());
        let machine = ReviewStateMachine::new(store.clone(), AuditLogWriter::new(log.clone()));
        (machine, store, log)
    }

    fn revised_note() -> SoapNote {
        SoapNote::new(
            vec!["Fever for 3 days".to_string()],
            vec![],
            vec!["Viral fever".to_string()],
            vec![PlanItem::Prescription {
                medication: "Paracetamol".to_string(),
                dosage: "650mg".to_string(),
                frequency: "TID".to_string(),
            }],
        )
    }

    #[test]
    fn test_edit_then_approve() {
        let (machine, store, log) = machine();
        let consultation = reviewable_consultation();
        let id = consultation.id;
        store.insert(consultation);

        let outcome = machine
            .edit(id, "dr.rao", revised_note(), Some("fixed dosage".to_string()))
            .unwrap();
        assert_eq!(outcome.edit_count, 1);
        assert_eq!(outcome.review_status, ReviewStatus::UnderReview);

        let approval = machine.approve(id, "dr.rao", None).unwrap();
        assert_eq!(approval.status, ConsultationStatus::Completed);

        let stored = store.get(id).unwrap();
        assert_eq!(stored.review.edit_count, 1);
        assert_eq!(stored.review.review_status, ReviewStatus::Approved);
        assert_eq!(stored.review.approved_by.as_deref(), Some("dr.rao"));
        assert!(stored.review.approved_at.is_some());
        assert!(stored.completed_at.is_some());

        // edit + approve
        assert_eq!(log.len(), 2);
        let history = store.history(id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason.as_deref(), Some("fixed dosage"));
        assert_eq!(history[0].field, "note");
    }

    #[test]
    fn test_approve_without_note_is_rejected() {
        let (machine, store, _log) = machine();
        let mut consultation = reviewable_consultation();
        consultation.note = None;
        let id = consultation.id;
        store.insert(consultation);

        let err = machine.approve(id, "dr.rao", None).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
        assert_eq!(store.get(id).unwrap().status, ConsultationStatus::Review);
    }

    #[test]
    fn test_double_approval_is_idempotent() {
        let (machine, store, log) = machine();
        let consultation = reviewable_consultation();
        let id = consultation.id;
        store.insert(consultation);

        let first = machine.approve(id, "dr.rao", None).unwrap();
        let second = machine.approve(id, "dr.rao", None).unwrap();

        assert_eq!(second.status, ConsultationStatus::Completed);
        assert_eq!(second.approved_at, first.approved_at);
        // Second approval is a no-op: no extra audit entry
        assert_eq!(log.len(), 1);
        assert_eq!(store.get(id).unwrap().review.edit_count, 0);
    }

    #[test]
    fn test_concurrent_edit_is_a_conflict() {
        let (machine, store, log) = machine();
        let consultation = reviewable_consultation();
        let id = consultation.id;
        store.insert(consultation);

        // First editor holds the reservation
        let token = store.begin_edit(id).unwrap();
        let err = machine
            .edit(id, "dr.iyer", revised_note(), None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Conflict(_)));
        assert_eq!(store.get(id).unwrap().review.edit_count, 0);
        assert_eq!(log.len(), 0);

        drop(token);
        machine.edit(id, "dr.iyer", revised_note(), None).unwrap();
        assert_eq!(store.get(id).unwrap().review.edit_count, 1);
    }

    #[test]
    fn test_editing_a_processing_consultation_fails() {
        let (machine, store, _log) = machine();
        let mut consultation = reviewable_consultation();
        consultation.status = ConsultationStatus::Processing;
        consultation.note = None;
        let id = consultation.id;
        store.insert(consultation);

        let err = machine.edit(id, "dr.rao", revised_note(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[test]
    fn test_reject_keeps_consultation_editable() {
        let (machine, store, _log) = machine();
        let consultation = reviewable_consultation();
        let id = consultation.id;
        store.insert(consultation);

        machine
            .reject(id, "dr.rao", Some("objective section incomplete".to_string()))
            .unwrap();
        let stored = store.get(id).unwrap();
        assert_eq!(stored.status, ConsultationStatus::Review);
        assert_eq!(stored.review.review_status, ReviewStatus::Rejected);

        machine.edit(id, "dr.rao", revised_note(), None).unwrap();
        assert_eq!(
            store.get(id).unwrap().review.review_status,
            ReviewStatus::UnderReview
        );
    }

    #[test]
    fn test_unknown_consultation_is_not_found() {
        let (machine, _store, _log) = machine();
        let err = machine
            .edit(Uuid::new_v4(), "dr.rao", revised_note(), None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    struct RefusingSink;

    impl crate::audit::AuditSink for RefusingSink {
        fn append(&self, _entry: crate::models::AuditLogEntry) -> Result<()> {
            Err(PipelineError::Audit("sink offline".to_string()))
        }
    }

    #[test]
    fn test_audit_failure_aborts_the_edit() {
        let store = Arc::new(ConsultationStore::new());
        let machine =
            ReviewStateMachine::new(store.clone(), AuditLogWriter::new(Arc::new(RefusingSink)));
        let consultation = reviewable_consultation();
        let id = consultation.id;
        store.insert(consultation);

        let err = machine.edit(id, "dr.rao", revised_note(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Audit(_)));

        // The transition did not happen
        let stored = store.get(id).unwrap();
        assert_eq!(stored.review.edit_count, 0);
        assert_eq!(stored.review.review_status, ReviewStatus::PendingReview);
        assert!(store.history(id).is_empty());
    }
}
