pub mod adapter;
pub mod local;
pub mod primary;

pub use adapter::*;
pub use local::*;
pub use primary::*;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DiarizedSegment, Language};

/// Audio handed to a transcription provider
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub audio: Vec<u8>,
    pub format: String,
    pub language: Language,
    pub duration_secs: f64,
}

/// Raw provider output before the adapter attaches method and cost
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub confidence: f64,
    pub segments: Vec<DiarizedSegment>,
}

/// One speech-to-text strategy. The adapter holds these as an ordered
/// list, so the fallback policy is data rather than exception control
/// flow.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<TranscriptionOutcome>;
}
