use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SoapNote;

/// Consultation languages accepted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[serde(rename = "ta")]
    Tamil,
    #[serde(rename = "te")]
    Telugu,
}

impl Language {
    /// ISO 639-1 code used on provider wire formats
    pub fn code(&self) -> &'static str {
        match self {
            Language::Tamil => "ta",
            Language::Telugu => "te",
        }
    }

    /// English display name, used in prompts
    pub fn name(&self) -> &'static str {
        match self {
            Language::Tamil => "Tamil",
            Language::Telugu => "Telugu",
        }
    }

    pub fn parse(code: &str) -> Option<Language> {
        match code.trim().to_ascii_lowercase().as_str() {
            "ta" => Some(Language::Tamil),
            "te" => Some(Language::Telugu),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Top-level lifecycle state of a consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Processing,
    Review,
    Completed,
    Failed,
}

/// Editorial sub-state while a consultation sits in `Review`/`Completed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    PendingReview,
    UnderReview,
    Approved,
    Rejected,
}

/// Which provider produced a pipeline artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderMethod {
    Primary,
    Fallback,
}

/// Speaker role assigned to a diarized segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Clinician,
    Patient,
}

/// A speaker-tagged span of the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiarizedSegment {
    pub speaker: SpeakerRole,
    pub text: String,
    pub start_secs: f64,
    pub end_secs: f64,
}

/// Transcription output attached to a consultation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Provider-reported or heuristic confidence in [0, 1]
    pub confidence: f64,
    pub method: ProviderMethod,
    #[serde(default)]
    pub segments: Vec<DiarizedSegment>,
}

impl Transcript {
    /// Concatenated speech for one speaker role, empty if no diarization
    pub fn speech_for(&self, role: SpeakerRole) -> String {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .filter(|s| s.speaker == role)
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect();
        parts.join(" ")
    }

    pub fn has_diarization(&self) -> bool {
        !self.segments.is_empty()
    }
}

/// Category of an extracted clinical entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityCategory {
    Symptom,
    Medication,
    Diagnosis,
    Vital,
    Dosage,
    Procedure,
}

impl EntityCategory {
    /// Parse a provider-reported category label. Unknown labels return
    /// `None` so the caller can drop the entity rather than miscategorize.
    pub fn parse(label: &str) -> Option<EntityCategory> {
        match label.trim().to_ascii_lowercase().as_str() {
            "symptom" | "symptoms" => Some(EntityCategory::Symptom),
            "medication" | "medications" | "drug" => Some(EntityCategory::Medication),
            "diagnosis" | "diagnoses" => Some(EntityCategory::Diagnosis),
            "vital" | "vitals" | "vital_sign" => Some(EntityCategory::Vital),
            "dosage" | "dose" => Some(EntityCategory::Dosage),
            "procedure" | "procedures" => Some(EntityCategory::Procedure),
            _ => None,
        }
    }
}

/// A clinical entity extracted from the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub category: EntityCategory,
    /// Extraction confidence in [0, 1]
    pub confidence: f64,
    /// Producer of this entity ("llm", "lexicon", ...)
    pub source: String,
}

/// Per-stage progress surfaced while a consultation is `Processing`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageProgress {
    Pending,
    Processing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub transcription: StageProgress,
    pub note_generation: StageProgress,
}

impl Default for PipelineProgress {
    fn default() -> Self {
        Self {
            transcription: StageProgress::Pending,
            note_generation: StageProgress::Pending,
        }
    }
}

/// Reference to the externally stored audio blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMetadata {
    /// Storage path in the external bucket; the blob itself is not owned here
    pub storage_path: String,
    pub format: String,
    pub byte_size: u64,
    pub duration_secs: f64,
}

/// Editorial metadata for the review lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewMeta {
    pub review_status: ReviewStatus,
    pub edit_count: u32,
    pub last_editor: Option<String>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Default for ReviewMeta {
    fn default() -> Self {
        Self {
            review_status: ReviewStatus::PendingReview,
            edit_count: 0,
            last_editor: None,
            approved_by: None,
            approved_at: None,
        }
    }
}

/// The central aggregate: one uploaded consultation and everything the
/// pipeline and reviewers attach to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consultation {
    pub id: Uuid,
    pub user_id: String,
    pub patient_name: Option<String>,
    pub language: Language,
    pub audio: AudioMetadata,
    pub status: ConsultationStatus,
    pub progress: PipelineProgress,
    pub transcript: Option<Transcript>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    pub note: Option<SoapNote>,
    /// Derived diagnostic codes (ICD-10 style)
    #[serde(default)]
    pub codes: Vec<String>,
    pub review: ReviewMeta,
    /// Accumulated cost of external calls for this consultation
    pub cost: f64,
    pub document_ref: Option<String>,
    /// Internal failure detail; never surfaced to callers
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Consultation {
    pub fn new(
        user_id: String,
        patient_name: Option<String>,
        language: Language,
        audio: AudioMetadata,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            patient_name,
            language,
            audio,
            status: ConsultationStatus::Processing,
            progress: PipelineProgress::default(),
            transcript: None,
            entities: Vec::new(),
            note: None,
            codes: Vec::new(),
            review: ReviewMeta::default(),
            cost: 0.0,
            document_ref: None,
            error_detail: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Terminal states admit no further transitions in this subsystem
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            ConsultationStatus::Completed | ConsultationStatus::Failed
        )
    }
}
