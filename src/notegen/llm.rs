use async_trait::async_trait;

use super::{
    build_note_prompt, finalize_draft, validate_draft, NoteGenerator, NoteLlmClient, NoteOutcome,
    NoteRequest, SYSTEM_PROMPT,
};
use crate::error::{PipelineError, Result};

/// Primary note generator: one structured LLM round-trip, validated
/// before acceptance.
pub struct LlmNoteGenerator {
    client: NoteLlmClient,
}

impl LlmNoteGenerator {
    pub fn new(client: NoteLlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NoteGenerator for LlmNoteGenerator {
    fn name(&self) -> &'static str {
        "note_llm"
    }

    async fn generate(&self, request: &NoteRequest) -> Result<NoteOutcome> {
        let prompt = build_note_prompt(request);
        let draft = self.client.send_note_request(SYSTEM_PROMPT, &prompt).await?;

        let validation = validate_draft(&draft);
        if !validation.is_valid {
            return Err(PipelineError::ExternalService(format!(
                "note draft rejected: {}",
                validation.errors.join("; ")
            )));
        }

        Ok(finalize_draft(draft, self.name()))
    }
}
