pub mod client;
pub mod engine;
pub mod fallback;
pub mod llm;
pub mod prompts;
pub mod validation;

pub use client::*;
pub use engine::*;
pub use fallback::*;
pub use llm::*;
pub use prompts::*;
pub use validation::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{DiarizedSegment, Entity, Language, PlanItem, SoapNote};

/// Input to a note generator
#[derive(Debug, Clone)]
pub struct NoteRequest {
    pub transcript: String,
    /// Speaker-tagged segments when diarization succeeded
    pub segments: Vec<DiarizedSegment>,
    pub language: Language,
    pub patient_name: Option<String>,
}

/// Validated generator output
#[derive(Debug, Clone)]
pub struct NoteOutcome {
    pub entities: Vec<Entity>,
    pub note: SoapNote,
    pub codes: Vec<String>,
}

/// One note-generation strategy; the engine holds an ordered pair
/// (LLM primary, rule-based fallback).
#[async_trait]
pub trait NoteGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, request: &NoteRequest) -> Result<NoteOutcome>;
}

/// Entity as reported by the model, category still unparsed. Unknown
/// categories are dropped during validation, never guessed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftEntity {
    pub text: String,
    pub category: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Raw structured output from the model, before validation. The four
/// sections are optional here precisely so validation can reject a
/// response that omitted one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteDraft {
    #[serde(default)]
    pub entities: Vec<DraftEntity>,
    pub subjective: Option<Vec<String>>,
    pub objective: Option<Vec<String>>,
    pub assessment: Option<Vec<String>>,
    pub plan: Option<Vec<PlanItem>>,
    #[serde(default)]
    pub codes: Vec<String>,
}
