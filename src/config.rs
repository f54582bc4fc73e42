use std::time::Duration;

use crate::models::Language;

/// Tunables for the consultation pipeline.
///
/// Defaults mirror the production limits: 30-minute recordings, 50 MB
/// uploads, a 5000.0 monthly transcription budget at 0.50 per minute.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Languages accepted at intake
    pub supported_languages: Vec<Language>,
    /// Audio formats accepted at intake
    pub allowed_formats: Vec<String>,
    /// Maximum audio duration in seconds
    pub max_audio_duration_secs: f64,
    /// Maximum audio upload size in bytes
    pub max_audio_bytes: u64,
    /// Monthly cost cap for the primary transcription provider
    pub monthly_budget: f64,
    /// Primary transcription cost per audio minute
    pub transcription_cost_per_minute: f64,
    /// Flat cost attributed to one LLM note generation
    pub note_generation_cost: f64,
    /// Timeout applied to every external provider call
    pub request_timeout: Duration,
    /// Attempts against the primary transcription provider
    pub max_transcription_attempts: u32,
    /// Base delay for exponential backoff between retries
    pub retry_backoff: Duration,
    /// Attempts against the primary note generator before falling back
    pub max_note_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            supported_languages: vec![Language::Tamil, Language::Telugu],
            allowed_formats: vec![
                "mp3".to_string(),
                "wav".to_string(),
                "webm".to_string(),
            ],
            max_audio_duration_secs: 30.0 * 60.0,
            max_audio_bytes: 50 * 1024 * 1024,
            monthly_budget: 5000.0,
            transcription_cost_per_minute: 0.50,
            note_generation_cost: 0.15,
            request_timeout: Duration::from_secs(60),
            max_transcription_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            max_note_attempts: 2,
        }
    }
}

impl PipelineConfig {
    pub fn is_language_supported(&self, language: Language) -> bool {
        self.supported_languages.contains(&language)
    }

    pub fn is_format_allowed(&self, format: &str) -> bool {
        let format = format.to_ascii_lowercase();
        self.allowed_formats.iter().any(|f| *f == format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_audio_duration_secs, 1800.0);
        assert_eq!(config.max_audio_bytes, 52_428_800);
        assert!(config.is_language_supported(Language::Tamil));
        assert!(config.is_format_allowed("MP3"));
        assert!(!config.is_format_allowed("flac"));
    }
}
