use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::{TranscriptionProvider, TranscriptionRequest};
use crate::budget::CostLedger;
use crate::error::{PipelineError, Result};
use crate::models::{Language, ProviderMethod, Transcript};

/// Retry policy for the primary provider
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Base delay; attempt n waits base * 2^(n-1)
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Transcription with audit of cost and outcome
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub transcript: Transcript,
    pub cost: f64,
}

/// Wraps the primary and fallback speech-to-text providers behind one
/// call.
///
/// The primary is gated by the monthly budget (checked and reserved
/// atomically before any network traffic) and retried with exponential
/// backoff; the fallback runs locally, costs nothing, and is tried exactly
/// once. Call metrics land on the ledger for every attempt, whatever the
/// outcome.
pub struct TranscriptionAdapter {
    primary: Arc<dyn TranscriptionProvider>,
    fallback: Arc<dyn TranscriptionProvider>,
    ledger: Arc<CostLedger>,
    supported_languages: Vec<Language>,
    cost_per_minute: f64,
    retry: RetryPolicy,
}

impl TranscriptionAdapter {
    pub fn new(
        primary: Arc<dyn TranscriptionProvider>,
        fallback: Arc<dyn TranscriptionProvider>,
        ledger: Arc<CostLedger>,
        supported_languages: Vec<Language>,
        cost_per_minute: f64,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            ledger,
            supported_languages,
            cost_per_minute,
            retry,
        }
    }

    /// Estimated primary cost for a recording of the given length
    pub fn estimate_cost(&self, duration_secs: f64) -> f64 {
        (duration_secs / 60.0) * self.cost_per_minute
    }

    pub async fn transcribe(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult> {
        if !self.supported_languages.contains(&request.language) {
            return Err(PipelineError::Validation(format!(
                "language '{}' is not supported",
                request.language
            )));
        }

        let estimate = self.estimate_cost(request.duration_secs);
        match self.ledger.try_charge(estimate) {
            Ok(()) => {
                if let Some(result) = self.try_primary(request, estimate).await {
                    return Ok(result);
                }
                // All primary attempts failed; the reservation covered
                // calls that produced nothing billable
                self.ledger.refund(estimate);
            }
            Err(err) => {
                warn!("skipping primary transcription: {err}");
            }
        }

        self.try_fallback(request).await
    }

    async fn try_primary(
        &self,
        request: &TranscriptionRequest,
        cost: f64,
    ) -> Option<TranscriptionResult> {
        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                let delay = self.retry.backoff * 2u32.pow(attempt - 2);
                tokio::time::sleep(delay).await;
            }

            match self.primary.transcribe(request).await {
                Ok(outcome) => {
                    self.ledger.record_call(self.primary.name(), true);
                    info!(
                        provider = self.primary.name(),
                        attempt, "transcription succeeded"
                    );
                    return Some(TranscriptionResult {
                        transcript: build_transcript(outcome, ProviderMethod::Primary),
                        cost,
                    });
                }
                Err(err) => {
                    self.ledger.record_call(self.primary.name(), false);
                    warn!(
                        provider = self.primary.name(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        "transcription attempt failed: {err}"
                    );
                }
            }
        }
        None
    }

    async fn try_fallback(&self, request: &TranscriptionRequest) -> Result<TranscriptionResult> {
        match self.fallback.transcribe(request).await {
            Ok(outcome) => {
                self.ledger.record_call(self.fallback.name(), true);
                info!(provider = self.fallback.name(), "fallback transcription used");
                Ok(TranscriptionResult {
                    transcript: build_transcript(outcome, ProviderMethod::Fallback),
                    cost: 0.0,
                })
            }
            Err(err) => {
                self.ledger.record_call(self.fallback.name(), false);
                Err(PipelineError::ExternalService(format!(
                    "all transcription providers exhausted: {err}"
                )))
            }
        }
    }
}

/// Empty or silent audio yields an empty transcript with floor confidence
/// rather than an error; review will catch it.
fn build_transcript(
    outcome: super::TranscriptionOutcome,
    method: ProviderMethod,
) -> Transcript {
    let confidence = if outcome.text.is_empty() {
        0.05
    } else {
        outcome.confidence.clamp(0.0, 1.0)
    };
    Transcript {
        text: outcome.text,
        confidence,
        method,
        segments: outcome.segments,
    }
}
