use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::{TranscriptionOutcome, TranscriptionProvider, TranscriptionRequest};
use crate::error::{PipelineError, Result};
use crate::models::{DiarizedSegment, SpeakerRole};

/// Configuration for the hosted speech-to-text API
#[derive(Debug, Clone)]
pub struct SpeechApiConfig {
    /// API key (from SPEECH_API_KEY env var)
    pub api_key: String,
    /// Application id sent alongside the key
    pub app_id: String,
    /// Endpoint for file transcription
    pub endpoint: String,
    /// Request speaker diarization
    pub diarization: bool,
}

impl SpeechApiConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("SPEECH_API_KEY").map_err(|_| {
            PipelineError::Validation("SPEECH_API_KEY environment variable not set".to_string())
        })?;
        let app_id = std::env::var("SPEECH_APP_ID").map_err(|_| {
            PipelineError::Validation("SPEECH_APP_ID environment variable not set".to_string())
        })?;

        Ok(Self {
            api_key,
            app_id,
            endpoint: "https://revapi.reverieinc.com/asr".to_string(),
            diarization: true,
        })
    }

    pub fn new(api_key: String, app_id: String, endpoint: String) -> Self {
        Self {
            api_key,
            app_id,
            endpoint,
            diarization: true,
        }
    }
}

/// Hosted speech-to-text provider
pub struct SpeechApiProvider {
    client: Client,
    config: SpeechApiConfig,
}

impl SpeechApiProvider {
    pub fn new(config: SpeechApiConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ExternalService(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TranscriptionProvider for SpeechApiProvider {
    fn name(&self) -> &'static str {
        "speech_api"
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<TranscriptionOutcome> {
        let file_name = format!("audio.{}", request.format);
        let part = Part::bytes(request.audio.clone()).file_name(file_name);
        let form = Form::new()
            .part("audio_file", part)
            .text("src_lang", request.language.code().to_string())
            .text("format", request.format.clone())
            .text("diarization", self.config.diarization.to_string());

        let response = self
            .client
            .post(&self.config.endpoint)
            .header("REV-API-KEY", &self.config.api_key)
            .header("REV-APP-ID", &self.config.app_id)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                PipelineError::ExternalService(format!("speech API request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ExternalService(format!(
                "speech API error: {status} - {body}"
            )));
        }

        let response: SpeechApiResponse = response.json().await.map_err(|e| {
            PipelineError::ExternalService(format!("failed to parse speech API response: {e}"))
        })?;

        Ok(TranscriptionOutcome {
            text: response.text.trim().to_string(),
            confidence: response.confidence.unwrap_or(0.0).clamp(0.0, 1.0),
            segments: response
                .segments
                .unwrap_or_default()
                .iter()
                .map(WireSegment::to_segment)
                .collect(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SpeechApiResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    segments: Option<Vec<WireSegment>>,
}

#[derive(Debug, Deserialize)]
struct WireSegment {
    #[serde(default)]
    speaker: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

impl WireSegment {
    /// The first diarized speaker is taken as the clinician; providers
    /// that label roles explicitly override the positional guess.
    fn to_segment(&self) -> DiarizedSegment {
        let label = self.speaker.to_ascii_lowercase();
        let speaker = if label.contains("speaker_00") || label.contains("doctor") {
            SpeakerRole::Clinician
        } else {
            SpeakerRole::Patient
        };
        DiarizedSegment {
            speaker,
            text: self.text.trim().to_string(),
            start_secs: self.start,
            end_secs: self.end,
        }
    }
}
