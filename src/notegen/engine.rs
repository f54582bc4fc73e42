use std::sync::Arc;

use tracing::{info, warn};

use super::{NoteGenerator, NoteRequest};
use crate::budget::CostLedger;
use crate::error::Result;
use crate::models::{Entity, ProviderMethod, SoapNote};

/// Final product of note generation, with provenance and cost attached
#[derive(Debug, Clone)]
pub struct GeneratedNote {
    pub entities: Vec<Entity>,
    pub note: SoapNote,
    pub codes: Vec<String>,
    pub method: ProviderMethod,
    pub cost: f64,
}

/// Drives the primary LLM generator with bounded retry and falls back to
/// the rule-based generator when the primary cannot produce a valid
/// draft. The fallback is deterministic and costs nothing.
pub struct NoteGenerationEngine {
    primary: Arc<dyn NoteGenerator>,
    fallback: Arc<dyn NoteGenerator>,
    ledger: Arc<CostLedger>,
    cost_per_note: f64,
    max_attempts: u32,
}

impl NoteGenerationEngine {
    pub fn new(
        primary: Arc<dyn NoteGenerator>,
        fallback: Arc<dyn NoteGenerator>,
        ledger: Arc<CostLedger>,
        cost_per_note: f64,
        max_attempts: u32,
    ) -> Self {
        Self {
            primary,
            fallback,
            ledger,
            cost_per_note,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn generate(&self, request: &NoteRequest) -> Result<GeneratedNote> {
        for attempt in 1..=self.max_attempts {
            match self.primary.generate(request).await {
                Ok(outcome) => {
                    self.ledger.record_call(self.primary.name(), true);
                    info!(
                        provider = self.primary.name(),
                        attempt,
                        entities = outcome.entities.len(),
                        "note generated"
                    );
                    return Ok(GeneratedNote {
                        entities: outcome.entities,
                        note: outcome.note,
                        codes: outcome.codes,
                        method: ProviderMethod::Primary,
                        cost: self.cost_per_note,
                    });
                }
                Err(err) => {
                    self.ledger.record_call(self.primary.name(), false);
                    warn!(
                        provider = self.primary.name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        "note generation attempt failed: {err}"
                    );
                }
            }
        }

        let outcome = self.fallback.generate(request).await?;
        self.ledger.record_call(self.fallback.name(), true);
        info!(provider = self.fallback.name(), "fallback note generator used");
        Ok(GeneratedNote {
            entities: outcome.entities,
            note: outcome.note,
            codes: outcome.codes,
            method: ProviderMethod::Fallback,
            cost: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::PipelineError;
    use crate::models::Language;
    use crate::notegen::{NoteOutcome, RuleBasedGenerator};

    struct FailingGenerator {
        calls: AtomicU32,
    }

    #[async_trait]
    impl NoteGenerator for FailingGenerator {
        fn name(&self) -> &'static str {
            "failing_llm"
        }

        async fn generate(&self, _request: &NoteRequest) -> Result<NoteOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::ExternalService("model offline".to_string()))
        }
    }

    fn request() -> NoteRequest {
        NoteRequest {
            transcript: "Patient has fever. BP 130/85. Paracetamol 650mg prescribed.".to_string(),
            segments: vec![],
            language: Language::Tamil,
            patient_name: None,
        }
    }

    #[tokio::test]
    async fn test_primary_failure_falls_back_to_rules() {
        let primary = Arc::new(FailingGenerator {
            calls: AtomicU32::new(0),
        });
        let engine = NoteGenerationEngine::new(
            primary.clone(),
            Arc::new(RuleBasedGenerator::new()),
            Arc::new(CostLedger::new(100.0)),
            0.15,
            2,
        );

        let generated = engine.generate(&request()).await.unwrap();

        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
        assert_eq!(generated.method, ProviderMethod::Fallback);
        assert_eq!(generated.cost, 0.0);
        assert!(!generated.note.is_empty());
        assert!(!generated.entities.is_empty());
    }

    struct CannedGenerator;

    #[async_trait]
    impl NoteGenerator for CannedGenerator {
        fn name(&self) -> &'static str {
            "canned"
        }

        async fn generate(&self, _request: &NoteRequest) -> Result<NoteOutcome> {
            Ok(NoteOutcome {
                entities: vec![],
                note: SoapNote::new(
                    vec!["Fever for 3 days".to_string()],
                    vec![],
                    vec![],
                    vec![],
                ),
                codes: vec!["J02.9".to_string()],
            })
        }
    }

    #[tokio::test]
    async fn test_primary_success_carries_cost_and_method() {
        let engine = NoteGenerationEngine::new(
            Arc::new(CannedGenerator),
            Arc::new(RuleBasedGenerator::new()),
            Arc::new(CostLedger::new(100.0)),
            0.15,
            2,
        );

        let generated = engine.generate(&request()).await.unwrap();
        assert_eq!(generated.method, ProviderMethod::Primary);
        assert_eq!(generated.cost, 0.15);
        assert_eq!(generated.codes, vec!["J02.9".to_string()]);
    }
}
