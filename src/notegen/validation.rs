use tracing::warn;

use super::{NoteDraft, NoteOutcome};
use crate::models::{Entity, EntityCategory, SoapNote};

/// Validation result for a note draft
#[derive(Debug, Clone)]
pub struct DraftValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Validate a draft returned by the model: all four sections must be
/// present (empty is fine). Entity and code quality is handled in
/// [`finalize_draft`], which drops rather than rejects.
pub fn validate_draft(draft: &NoteDraft) -> DraftValidation {
    let mut errors = Vec::new();

    for (name, section) in [
        ("subjective", &draft.subjective),
        ("objective", &draft.objective),
        ("assessment", &draft.assessment),
    ] {
        if section.is_none() {
            errors.push(format!("section '{name}' is missing"));
        }
    }
    if draft.plan.is_none() {
        errors.push("section 'plan' is missing".to_string());
    }

    DraftValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}

/// Convert a validated draft into a [`NoteOutcome`].
///
/// Entities with unrecognized categories and codes that do not look like
/// diagnostic codes are dropped with a warning; nothing is ever
/// re-categorized on the model's behalf.
pub fn finalize_draft(draft: NoteDraft, source: &str) -> NoteOutcome {
    let mut entities = Vec::new();
    for raw in draft.entities {
        match EntityCategory::parse(&raw.category) {
            Some(category) => entities.push(Entity {
                text: raw.text,
                category,
                confidence: raw.confidence.unwrap_or(0.8).clamp(0.0, 1.0),
                source: source.to_string(),
            }),
            None => {
                warn!(
                    category = %raw.category,
                    text = %raw.text,
                    "dropping entity with unknown category"
                );
            }
        }
    }

    let mut codes = Vec::new();
    for code in draft.codes {
        let code = code.trim().to_string();
        if looks_like_diagnostic_code(&code) {
            codes.push(code);
        } else {
            warn!(%code, "dropping malformed diagnostic code");
        }
    }

    let note = SoapNote::new(
        draft.subjective.unwrap_or_default(),
        draft.objective.unwrap_or_default(),
        draft.assessment.unwrap_or_default(),
        draft.plan.unwrap_or_default(),
    );

    NoteOutcome {
        entities,
        note,
        codes,
    }
}

/// ICD-10 shape: an uppercase letter, two digits, optional dotted suffix
fn looks_like_diagnostic_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() < 3 {
        return false;
    }
    if !bytes[0].is_ascii_uppercase() || !bytes[1].is_ascii_digit() || !bytes[2].is_ascii_digit() {
        return false;
    }
    match bytes.get(3) {
        None => true,
        Some(b'.') => bytes[4..].iter().all(|b| b.is_ascii_alphanumeric()) && bytes.len() > 4,
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> NoteDraft {
        serde_json::from_str(
            r#"{
                "entities": [
                    {"text": "fever", "category": "symptom"},
                    {"text": "sneezing", "category": "observation"}
                ],
                "subjective": ["Fever for 3 days"],
                "objective": [],
                "assessment": ["Acute pharyngitis"],
                "plan": ["Rest and fluids"],
                "codes": ["J02.9", "not-a-code"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_complete_draft_is_valid() {
        let validation = validate_draft(&complete_draft());
        assert!(validation.is_valid);
        assert!(validation.errors.is_empty());
    }

    #[test]
    fn test_missing_section_is_invalid() {
        let draft: NoteDraft = serde_json::from_str(
            r#"{"subjective": [], "objective": [], "plan": []}"#,
        )
        .unwrap();

        let validation = validate_draft(&draft);
        assert!(!validation.is_valid);
        assert_eq!(validation.errors, vec!["section 'assessment' is missing"]);
    }

    #[test]
    fn test_finalize_drops_unknown_categories_and_codes() {
        let outcome = finalize_draft(complete_draft(), "llm");

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].text, "fever");
        assert_eq!(outcome.entities[0].source, "llm");
        assert_eq!(outcome.codes, vec!["J02.9".to_string()]);
        assert_eq!(outcome.note.subjective, vec!["Fever for 3 days".to_string()]);
    }

    #[test]
    fn test_diagnostic_code_shapes() {
        assert!(looks_like_diagnostic_code("J02"));
        assert!(looks_like_diagnostic_code("J02.9"));
        assert!(looks_like_diagnostic_code("A00.0"));
        assert!(!looks_like_diagnostic_code("j02"));
        assert!(!looks_like_diagnostic_code("J0"));
        assert!(!looks_like_diagnostic_code("J02."));
        assert!(!looks_like_diagnostic_code("J029x-"));
    }
}
