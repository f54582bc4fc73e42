use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::audit::AuditLogWriter;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::models::{
    AudioMetadata, AuditAction, Consultation, ConsultationStatus, Language, StageProgress,
};
use crate::notegen::{NoteGenerationEngine, NoteRequest};
use crate::store::ConsultationStore;
use crate::transcription::{TranscriptionAdapter, TranscriptionRequest};

/// An uploaded recording plus its intake metadata
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub data: Vec<u8>,
    pub format: String,
    pub duration_secs: f64,
}

/// Input to [`Orchestrator::create`]
#[derive(Debug, Clone)]
pub struct CreateConsultationInput {
    pub user_id: String,
    pub patient_name: Option<String>,
    /// Raw language code from the caller; validated here
    pub language: String,
    pub audio: AudioUpload,
}

/// Returned by [`Orchestrator::create`] while the pipeline runs out of band
#[derive(Debug, Clone, Serialize)]
pub struct CreateReceipt {
    pub id: Uuid,
    pub status: ConsultationStatus,
    pub poll_ref: String,
}

/// Shared collaborators handed to each spawned pipeline task
#[derive(Clone)]
struct PipelineContext {
    store: Arc<ConsultationStore>,
    audit: AuditLogWriter,
    transcription: Arc<TranscriptionAdapter>,
    notegen: Arc<NoteGenerationEngine>,
}

/// Owns the end-to-end pipeline: validates intake, persists the record,
/// and runs transcription and note generation as one supervised task per
/// consultation.
///
/// `create` is bounded by validation plus persistence; it never waits on
/// a provider. The supervisor guarantees a terminal write, so no code
/// path leaves a consultation in `Processing` forever: every pipeline
/// resolves to `Review` or `Failed`.
pub struct Orchestrator {
    config: PipelineConfig,
    context: PipelineContext,
    tasks: Mutex<HashMap<Uuid, JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        store: Arc<ConsultationStore>,
        audit: AuditLogWriter,
        transcription: Arc<TranscriptionAdapter>,
        notegen: Arc<NoteGenerationEngine>,
    ) -> Self {
        Self {
            config,
            context: PipelineContext {
                store,
                audit,
                transcription,
                notegen,
            },
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Validate the upload, persist the consultation, and schedule its
    /// pipeline. Returns promptly with a poll reference.
    pub fn create(&self, input: CreateConsultationInput) -> Result<CreateReceipt> {
        let language = self.validate(&input)?;

        let id = Uuid::new_v4();
        let audio_meta = AudioMetadata {
            storage_path: format!("audio-files/{}.{}", id, input.audio.format),
            format: input.audio.format.clone(),
            byte_size: input.audio.data.len() as u64,
            duration_secs: input.audio.duration_secs,
        };
        let mut consultation = Consultation::new(
            input.user_id,
            input.patient_name.clone(),
            language,
            audio_meta,
        );
        consultation.id = id;
        self.context.store.insert(consultation);

        info!(consultation = %id, language = %language, "consultation created, scheduling pipeline");

        let context = self.context.clone();
        let request = TranscriptionRequest {
            audio: input.audio.data,
            format: input.audio.format,
            language,
            duration_secs: input.audio.duration_secs,
        };
        let patient_name = input.patient_name;
        let handle = tokio::spawn(async move {
            if let Err(err) = run_pipeline(&context, id, request, patient_name).await {
                error!(consultation = %id, "pipeline failed: {err}");
                mark_failed(&context, id, &err);
            }
        });
        self.tasks
            .lock()
            .expect("pipeline task registry poisoned")
            .insert(id, handle);

        Ok(CreateReceipt {
            id,
            status: ConsultationStatus::Processing,
            poll_ref: format!("/consultations/{id}"),
        })
    }

    /// Wait for a scheduled pipeline to finish. Used by tests and the CLI;
    /// pollers just read the store.
    pub async fn await_pipeline(&self, id: Uuid) {
        let handle = self
            .tasks
            .lock()
            .expect("pipeline task registry poisoned")
            .remove(&id);
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                error!(consultation = %id, "pipeline task panicked: {err}");
            }
        }
    }

    fn validate(&self, input: &CreateConsultationInput) -> Result<Language> {
        let language = Language::parse(&input.language).ok_or_else(|| {
            PipelineError::Validation(format!(
                "language must be one of {:?}, got '{}'",
                self.config
                    .supported_languages
                    .iter()
                    .map(Language::code)
                    .collect::<Vec<_>>(),
                input.language
            ))
        })?;
        if !self.config.is_language_supported(language) {
            return Err(PipelineError::Validation(format!(
                "language '{language}' is not enabled"
            )));
        }
        if !self.config.is_format_allowed(&input.audio.format) {
            return Err(PipelineError::Validation(format!(
                "audio format '{}' is not supported; use one of {:?}",
                input.audio.format, self.config.allowed_formats
            )));
        }
        if input.audio.duration_secs > self.config.max_audio_duration_secs {
            return Err(PipelineError::Validation(format!(
                "audio duration {:.0}s exceeds the {:.0}s limit",
                input.audio.duration_secs, self.config.max_audio_duration_secs
            )));
        }
        if input.audio.data.len() as u64 > self.config.max_audio_bytes {
            return Err(PipelineError::Validation(format!(
                "audio size {} bytes exceeds the {} byte limit",
                input.audio.data.len(),
                self.config.max_audio_bytes
            )));
        }
        Ok(language)
    }
}

/// Run the two pipeline stages for one consultation. Any error propagates
/// to the supervisor, which resolves the record to `Failed`.
async fn run_pipeline(
    context: &PipelineContext,
    id: Uuid,
    request: TranscriptionRequest,
    patient_name: Option<String>,
) -> Result<()> {
    context.store.update(id, |c| {
        c.progress.transcription = StageProgress::Processing;
    })?;

    info!(consultation = %id, "starting transcription");
    let transcription = context.transcription.transcribe(&request).await?;
    let transcript = transcription.transcript;
    info!(
        consultation = %id,
        method = ?transcript.method,
        chars = transcript.text.len(),
        "transcription completed"
    );

    context.store.update(id, |c| {
        c.transcript = Some(transcript.clone());
        c.progress.transcription = StageProgress::Completed;
        c.progress.note_generation = StageProgress::Processing;
    })?;

    info!(consultation = %id, "generating note");
    let note_request = NoteRequest {
        transcript: transcript.text.clone(),
        segments: transcript.segments.clone(),
        language: request.language,
        patient_name,
    };
    let generated = context.notegen.generate(&note_request).await?;
    info!(
        consultation = %id,
        method = ?generated.method,
        entities = generated.entities.len(),
        "note generated"
    );

    let total_cost = transcription.cost + generated.cost;

    // Audit before commit: a crash here leaves the consultation
    // processing for the supervisor, never reviewed without a record
    context.audit.record(
        "pipeline",
        AuditAction::Create,
        id,
        json!({
            "transcript_method": transcript.method,
            "note_method": generated.method,
            "cost": total_cost,
        }),
    )?;

    context.store.update(id, |c| {
        c.entities = generated.entities;
        c.note = Some(generated.note);
        c.codes = generated.codes;
        c.cost = total_cost;
        c.status = ConsultationStatus::Review;
        c.progress.note_generation = StageProgress::Completed;
    })?;

    info!(consultation = %id, cost = total_cost, "consultation ready for review");
    Ok(())
}

/// Terminal write for a failed pipeline. The audit entry is written
/// first; if even that fails we still persist the failure so the
/// consultation cannot sit in `Processing` forever.
fn mark_failed(context: &PipelineContext, id: Uuid, cause: &PipelineError) {
    if let Err(audit_err) = context.audit.record(
        "pipeline",
        AuditAction::Update,
        id,
        json!({ "status": "failed", "error": cause.to_string() }),
    ) {
        error!(consultation = %id, "audit write for failure also failed: {audit_err}");
    }

    let result = context.store.update(id, |c| {
        c.status = ConsultationStatus::Failed;
        c.error_detail = Some(cause.to_string());
        c.completed_at = Some(Utc::now());
    });
    if let Err(err) = result {
        error!(consultation = %id, "could not persist failure state: {err}");
    }
}
