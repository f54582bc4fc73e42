use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::NoteDraft;
use crate::error::{PipelineError, Result};

/// Configuration for the note-generation LLM client
#[derive(Debug, Clone)]
pub struct NoteLlmConfig {
    /// API key (from ANTHROPIC_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,
    /// Temperature (0-1, kept low for reproducible section assignment)
    pub temperature: f64,
    /// Maximum tokens in response
    pub max_tokens: u32,
}

impl NoteLlmConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
            PipelineError::Validation("ANTHROPIC_API_KEY environment variable not set".to_string())
        })?;

        Ok(Self {
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            temperature: 0.1,
            max_tokens: 4096,
        })
    }

    /// Create with custom settings
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            temperature: 0.1,
            max_tokens: 4096,
        }
    }
}

/// LLM API client for structured note generation
pub struct NoteLlmClient {
    client: Client,
    config: NoteLlmConfig,
}

impl NoteLlmClient {
    pub fn new(config: NoteLlmConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::ExternalService(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Request entities, the four SOAP sections, and derived codes in one
    /// forced tool-use round-trip.
    pub async fn send_note_request(&self, system: &str, user: &str) -> Result<NoteDraft> {
        let tool = Tool {
            name: "submit_note".to_string(),
            description: "Submit the structured clinical note with entities, SOAP sections, and diagnostic codes".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "entities": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "text": {"type": "string"},
                                "category": {
                                    "type": "string",
                                    "enum": ["symptom", "medication", "diagnosis", "vital", "dosage", "procedure"]
                                },
                                "confidence": {"type": "number"}
                            },
                            "required": ["text", "category"]
                        }
                    },
                    "subjective": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Patient complaints with duration, one finding per item"
                    },
                    "objective": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Vital signs, examination findings, test results"
                    },
                    "assessment": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Diagnoses in standard medical terminology"
                    },
                    "plan": {
                        "type": "array",
                        "items": {
                            "oneOf": [
                                {"type": "string"},
                                {
                                    "type": "object",
                                    "properties": {
                                        "medication": {"type": "string"},
                                        "dosage": {"type": "string"},
                                        "frequency": {"type": "string"}
                                    },
                                    "required": ["medication", "dosage", "frequency"]
                                }
                            ]
                        }
                    },
                    "codes": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "ICD-10 codes for the diagnoses"
                    }
                },
                "required": ["entities", "subjective", "objective", "assessment", "plan", "codes"]
            }),
        };

        let request = LlmToolRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: Some(self.config.temperature),
            system: Some(system.to_string()),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            tools: vec![tool],
            tool_choice: Some(ToolChoice {
                choice_type: "tool".to_string(),
                name: "submit_note".to_string(),
            }),
        };

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::ExternalService(format!("note LLM request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::ExternalService(format!(
                "note LLM error: {status} - {body}"
            )));
        }

        let response: LlmResponse = response.json().await.map_err(|e| {
            PipelineError::ExternalService(format!("failed to parse note LLM response: {e}"))
        })?;

        // Find the tool_use content block
        for content in &response.content {
            if content.content_type == "tool_use" && content.name.as_deref() == Some("submit_note")
            {
                if let Some(input) = &content.input {
                    let draft: NoteDraft = serde_json::from_value(input.clone()).map_err(|e| {
                        PipelineError::ExternalService(format!(
                            "tool input is not a valid note draft: {e}"
                        ))
                    })?;
                    return Ok(draft);
                }
            }
        }

        Err(PipelineError::ExternalService(
            "no tool_use response found".to_string(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct LlmToolRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct Tool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolChoice {
    #[serde(rename = "type")]
    choice_type: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct LlmResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_use_block_into_draft() {
        let json = r#"{
            "content": [{
                "type": "tool_use",
                "name": "submit_note",
                "input": {
                    "entities": [
                        {"text": "fever", "category": "symptom", "confidence": 0.95}
                    ],
                    "subjective": ["Fever for 3 days"],
                    "objective": ["BP 130/85 mmHg"],
                    "assessment": ["Acute pharyngitis"],
                    "plan": [{"medication": "Paracetamol", "dosage": "650mg", "frequency": "TID"}],
                    "codes": ["J02.9"]
                }
            }]
        }"#;

        let response: LlmResponse = serde_json::from_str(json).unwrap();
        let block = &response.content[0];
        assert_eq!(block.content_type, "tool_use");

        let draft: NoteDraft =
            serde_json::from_value(block.input.clone().unwrap()).unwrap();
        assert_eq!(draft.entities.len(), 1);
        assert_eq!(draft.entities[0].category, "symptom");
        assert_eq!(draft.subjective.as_deref(), Some(&["Fever for 3 days".to_string()][..]));
        assert_eq!(draft.codes, vec!["J02.9".to_string()]);
    }
}
