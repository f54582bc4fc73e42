use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::audit::{AuditLogWriter, AuditSink};
use crate::budget::CostLedger;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{
    AuditAction, ConsultationStatus, EditHistoryEntry, Entity, Language, PipelineProgress,
    ReviewStatus, SoapNote, Transcript,
};
use crate::notegen::{
    LlmNoteGenerator, NoteGenerationEngine, NoteGenerator, NoteLlmClient, NoteLlmConfig,
    RuleBasedGenerator,
};
use crate::pipeline::{CreateConsultationInput, CreateReceipt, Orchestrator};
use crate::render::{document_filename, render_document, ClinicMetadata};
use crate::review::{ApproveOutcome, EditOutcome, ReviewStateMachine};
use crate::store::ConsultationStore;
use crate::transcription::{
    LocalTranscriber, LocalTranscriberConfig, RetryPolicy, SpeechApiConfig, SpeechApiProvider,
    TranscriptionAdapter, TranscriptionProvider,
};

/// Caller-facing view of one consultation; the shape follows the status.
/// A failed consultation exposes a retry-safe message and its id for
/// support correlation, never provider error text.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsultationView {
    Processing {
        id: Uuid,
        progress: PipelineProgress,
        created_at: DateTime<Utc>,
    },
    Review {
        id: Uuid,
        patient_name: Option<String>,
        language: Language,
        transcript: Transcript,
        entities: Vec<Entity>,
        note: SoapNote,
        codes: Vec<String>,
        review_status: ReviewStatus,
        edit_count: u32,
        cost: f64,
        created_at: DateTime<Utc>,
    },
    Completed {
        id: Uuid,
        patient_name: Option<String>,
        language: Language,
        transcript: Transcript,
        entities: Vec<Entity>,
        note: SoapNote,
        codes: Vec<String>,
        approved_by: Option<String>,
        approved_at: Option<DateTime<Utc>>,
        cost: f64,
        document_ref: Option<String>,
        created_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    },
    Failed {
        id: Uuid,
        message: String,
        support_ref: String,
        created_at: DateTime<Utc>,
    },
}

/// One row of a consultation listing
#[derive(Debug, Clone, Serialize)]
pub struct ConsultationSummary {
    pub id: Uuid,
    pub patient_name: Option<String>,
    pub language: Language,
    pub status: ConsultationStatus,
    pub created_at: DateTime<Utc>,
}

/// A rendered, downloadable document
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
}

/// The typed surface a transport layer calls: create, poll, edit,
/// approve, reject, export, list.
pub struct ConsultationService {
    orchestrator: Orchestrator,
    review: ReviewStateMachine,
    store: Arc<ConsultationStore>,
    audit: AuditLogWriter,
    ledger: Arc<CostLedger>,
}

impl ConsultationService {
    pub fn new(
        config: PipelineConfig,
        primary_transcriber: Arc<dyn TranscriptionProvider>,
        fallback_transcriber: Arc<dyn TranscriptionProvider>,
        primary_notegen: Arc<dyn NoteGenerator>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let store = Arc::new(ConsultationStore::new());
        let audit = AuditLogWriter::new(sink);
        let ledger = Arc::new(CostLedger::new(config.monthly_budget));

        let adapter = TranscriptionAdapter::new(
            primary_transcriber,
            fallback_transcriber,
            ledger.clone(),
            config.supported_languages.clone(),
            config.transcription_cost_per_minute,
            RetryPolicy {
                max_attempts: config.max_transcription_attempts,
                backoff: config.retry_backoff,
            },
        );
        let engine = NoteGenerationEngine::new(
            primary_notegen,
            Arc::new(RuleBasedGenerator::new()),
            ledger.clone(),
            config.note_generation_cost,
            config.max_note_attempts,
        );

        let orchestrator = Orchestrator::new(
            config,
            store.clone(),
            audit.clone(),
            Arc::new(adapter),
            Arc::new(engine),
        );
        let review = ReviewStateMachine::new(store.clone(), audit.clone());

        Self {
            orchestrator,
            review,
            store,
            audit,
            ledger,
        }
    }

    /// Wire up the live providers from environment configuration.
    pub fn with_live_providers(config: PipelineConfig, sink: Arc<dyn AuditSink>) -> Result<Self> {
        let timeout = config.request_timeout;
        let primary = SpeechApiProvider::new(SpeechApiConfig::from_env()?, timeout)?;
        let fallback = LocalTranscriber::new(LocalTranscriberConfig::default(), timeout)?;
        let notegen =
            LlmNoteGenerator::new(NoteLlmClient::new(NoteLlmConfig::from_env()?, timeout)?);

        Ok(Self::new(
            config,
            Arc::new(primary),
            Arc::new(fallback),
            Arc::new(notegen),
            sink,
        ))
    }

    /// `POST create-consultation`
    pub fn create(&self, input: CreateConsultationInput) -> Result<CreateReceipt> {
        self.orchestrator.create(input)
    }

    /// `GET consultation/{id}`: the polling surface
    pub fn get(&self, id: Uuid) -> Result<ConsultationView> {
        let c = self.store.get(id).ok_or(PipelineError::NotFound(id))?;

        let view = match c.status {
            ConsultationStatus::Processing => ConsultationView::Processing {
                id: c.id,
                progress: c.progress,
                created_at: c.created_at,
            },
            ConsultationStatus::Review => ConsultationView::Review {
                id: c.id,
                patient_name: c.patient_name,
                language: c.language,
                transcript: c.transcript.unwrap_or_else(empty_transcript),
                entities: c.entities,
                note: c.note.unwrap_or_else(|| SoapNote::new(vec![], vec![], vec![], vec![])),
                codes: c.codes,
                review_status: c.review.review_status,
                edit_count: c.review.edit_count,
                cost: c.cost,
                created_at: c.created_at,
            },
            ConsultationStatus::Completed => ConsultationView::Completed {
                id: c.id,
                patient_name: c.patient_name,
                language: c.language,
                transcript: c.transcript.unwrap_or_else(empty_transcript),
                entities: c.entities,
                note: c.note.unwrap_or_else(|| SoapNote::new(vec![], vec![], vec![], vec![])),
                codes: c.codes,
                approved_by: c.review.approved_by,
                approved_at: c.review.approved_at,
                cost: c.cost,
                document_ref: c.document_ref,
                created_at: c.created_at,
                completed_at: c.completed_at,
            },
            ConsultationStatus::Failed => ConsultationView::Failed {
                id: c.id,
                message: "Processing failed. Please retry the upload; quote the reference when contacting support.".to_string(),
                support_ref: c.id.to_string(),
                created_at: c.created_at,
            },
        };
        Ok(view)
    }

    /// `PUT edit`
    pub fn edit(
        &self,
        id: Uuid,
        editor: &str,
        note: SoapNote,
        reason: Option<String>,
    ) -> Result<EditOutcome> {
        self.review.edit(id, editor, note, reason)
    }

    /// `POST approve`
    pub fn approve(
        &self,
        id: Uuid,
        approver: &str,
        note: Option<SoapNote>,
    ) -> Result<ApproveOutcome> {
        self.review.approve(id, approver, note)
    }

    pub fn reject(&self, id: Uuid, reviewer: &str, reason: Option<String>) -> Result<()> {
        self.review.reject(id, reviewer, reason)
    }

    /// `GET document`: only valid once the consultation is completed.
    /// Rendering is deterministic, so repeated exports are byte-identical.
    pub fn document(
        &self,
        id: Uuid,
        requested_by: &str,
        clinic: Option<&ClinicMetadata>,
    ) -> Result<RenderedDocument> {
        let c = self.store.get(id).ok_or(PipelineError::NotFound(id))?;
        if c.status != ConsultationStatus::Completed {
            return Err(PipelineError::Validation(
                "documents are only available for completed consultations".to_string(),
            ));
        }
        let note = c.note.as_ref().ok_or_else(|| {
            PipelineError::Render("completed consultation has no note".to_string())
        })?;

        let bytes = render_document(note, clinic)?;
        let id_prefix: String = c.id.to_string().chars().take(8).collect();
        let filename = document_filename(c.patient_name.as_deref(), &id_prefix);

        self.audit.record(
            requested_by,
            AuditAction::Export,
            id,
            json!({ "document": filename }),
        )?;
        self.store.update(id, |record| {
            record.document_ref = Some(filename.clone());
        })?;

        Ok(RenderedDocument { bytes, filename })
    }

    /// `GET consultations`: most recent first
    pub fn list(
        &self,
        status: Option<ConsultationStatus>,
        limit: usize,
    ) -> Vec<ConsultationSummary> {
        self.store
            .list(status, limit)
            .into_iter()
            .map(|c| ConsultationSummary {
                id: c.id,
                patient_name: c.patient_name,
                language: c.language,
                status: c.status,
                created_at: c.created_at,
            })
            .collect()
    }

    pub fn edit_history(&self, id: Uuid) -> Vec<EditHistoryEntry> {
        self.store.history(id)
    }

    /// Wait for a consultation's pipeline task to finish
    pub async fn await_pipeline(&self, id: Uuid) {
        self.orchestrator.await_pipeline(id).await;
    }

    /// Shared cost accounting, exposed for monitoring
    pub fn ledger(&self) -> &CostLedger {
        &self.ledger
    }
}

fn empty_transcript() -> Transcript {
    Transcript {
        text: String::new(),
        confidence: 0.0,
        method: crate::models::ProviderMethod::Fallback,
        segments: Vec::new(),
    }
}
