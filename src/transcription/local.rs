use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::{TranscriptionOutcome, TranscriptionProvider, TranscriptionRequest};
use crate::error::{PipelineError, Result};
use crate::models::Language;

/// Configuration for the locally hosted fallback transcriber
/// (a whisper.cpp-style server on the same machine)
#[derive(Debug, Clone)]
pub struct LocalTranscriberConfig {
    pub endpoint: String,
    /// Languages the local model can handle
    pub languages: Vec<Language>,
}

impl Default for LocalTranscriberConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8178/inference".to_string(),
            languages: vec![Language::Tamil, Language::Telugu],
        }
    }
}

/// Fallback transcriber backed by a local inference server. Costs nothing
/// per call and reports a heuristic confidence rather than a model score.
pub struct LocalTranscriber {
    client: Client,
    config: LocalTranscriberConfig,
}

impl LocalTranscriber {
    pub fn new(config: LocalTranscriberConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ExternalService(e.to_string()))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl TranscriptionProvider for LocalTranscriber {
    fn name(&self) -> &'static str {
        "local_transcriber"
    }

    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<TranscriptionOutcome> {
        if !self.config.languages.contains(&request.language) {
            return Err(PipelineError::ExternalService(format!(
                "fallback transcriber does not support language '{}'",
                request.language
            )));
        }

        let file_name = format!("audio.{}", request.format);
        let part = Part::bytes(request.audio.clone()).file_name(file_name);
        let form = Form::new()
            .part("file", part)
            .text("language", request.language.code().to_string())
            .text("response_format", "json");

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                PipelineError::ExternalService(format!("local transcriber unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(PipelineError::ExternalService(format!(
                "local transcriber error: {status}"
            )));
        }

        let response: LocalResponse = response.json().await.map_err(|e| {
            PipelineError::ExternalService(format!("failed to parse local transcriber response: {e}"))
        })?;

        let text = response.text.trim().to_string();
        let confidence = heuristic_confidence(&text);
        Ok(TranscriptionOutcome {
            text,
            confidence,
            segments: Vec::new(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LocalResponse {
    #[serde(default)]
    text: String,
}

/// The local server reports no score; estimate one from the output shape.
/// Silent or near-silent audio lands well below any review threshold.
fn heuristic_confidence(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    match words {
        0 => 0.05,
        1..=3 => 0.3,
        _ => 0.6,
    }
}
