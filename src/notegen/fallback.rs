use async_trait::async_trait;

use super::{NoteGenerator, NoteOutcome, NoteRequest};
use crate::error::Result;
use crate::models::{Entity, EntityCategory, Language, PlanItem, SoapNote};

/// Curated clinical terms for one language: (source term, English form)
#[derive(Debug, Clone)]
pub struct TermLexicon {
    pub symptoms: Vec<(&'static str, &'static str)>,
    pub medications: Vec<(&'static str, &'static str)>,
}

impl TermLexicon {
    pub fn for_language(language: Language) -> Self {
        match language {
            Language::Tamil => Self {
                symptoms: vec![
                    ("காய்ச்சல்", "fever"),
                    ("தலைவலி", "headache"),
                    ("இருமல்", "cough"),
                    ("வயிற்று வலி", "abdominal pain"),
                    ("தொண்டை வலி", "sore throat"),
                    ("மயக்கம்", "dizziness"),
                    ("fever", "fever"),
                    ("cough", "cough"),
                    ("headache", "headache"),
                ],
                medications: vec![
                    ("பாராசிட்டமால்", "Paracetamol"),
                    ("அமோக்சிசிலின்", "Amoxicillin"),
                    ("paracetamol", "Paracetamol"),
                    ("amoxicillin", "Amoxicillin"),
                ],
            },
            Language::Telugu => Self {
                symptoms: vec![
                    ("జ్వరం", "fever"),
                    ("తలనొప్పి", "headache"),
                    ("దగ్గు", "cough"),
                    ("కడుపు నొప్పి", "abdominal pain"),
                    ("గొంతు నొప్పి", "sore throat"),
                    ("fever", "fever"),
                    ("cough", "cough"),
                    ("headache", "headache"),
                ],
                medications: vec![
                    ("పారాసెటమాల్", "Paracetamol"),
                    ("అమోక్సిసిలిన్", "Amoxicillin"),
                    ("paracetamol", "Paracetamol"),
                    ("amoxicillin", "Amoxicillin"),
                ],
            },
        }
    }
}

/// Deterministic rule/dictionary note generator. Used when the LLM path
/// is unavailable or returns an invalid draft; never fails.
#[derive(Debug, Default)]
pub struct RuleBasedGenerator;

impl RuleBasedGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_note(&self, request: &NoteRequest) -> NoteOutcome {
        let lexicon = TermLexicon::for_language(request.language);
        let transcript = &request.transcript;
        let lowered = transcript.to_lowercase();

        let mut entities = Vec::new();
        let mut subjective = Vec::new();
        let mut plan: Vec<PlanItem> = Vec::new();

        for (term, english) in &lexicon.symptoms {
            if contains_term(transcript, &lowered, term)
                && !entities_contain(&entities, english)
            {
                entities.push(lexicon_entity(english, EntityCategory::Symptom));
                subjective.push(format!("Reports {english}"));
            }
        }

        for (term, english) in &lexicon.medications {
            if contains_term(transcript, &lowered, term)
                && !entities_contain(&entities, english)
            {
                entities.push(lexicon_entity(english, EntityCategory::Medication));
                plan.push(PlanItem::Prescription {
                    medication: english.to_string(),
                    dosage: String::new(),
                    frequency: String::new(),
                });
            }
        }

        let mut objective = Vec::new();
        if let Some(bp) = find_blood_pressure(transcript) {
            entities.push(lexicon_entity(&format!("BP {bp}"), EntityCategory::Vital));
            objective.push(format!("Blood pressure {bp} mmHg"));
        }
        if let Some(temp) = find_temperature(transcript) {
            entities.push(lexicon_entity(
                &format!("Temperature {temp}F"),
                EntityCategory::Vital,
            ));
            objective.push(format!("Temperature {temp}F"));
        }
        for dosage in find_dosages(transcript) {
            entities.push(lexicon_entity(&dosage, EntityCategory::Dosage));
        }

        if subjective.is_empty() && !transcript.trim().is_empty() {
            subjective.push("Chief complaint not identified from transcript".to_string());
        }
        if objective.is_empty() {
            objective.push(
                "Objective findings not documented in consultation. Clinical examination recommended."
                    .to_string(),
            );
        }
        let assessment = vec!["Assessment pending clinician review".to_string()];
        if !plan.is_empty() {
            plan.push(PlanItem::Text("Follow-up if symptoms persist".to_string()));
        }

        NoteOutcome {
            entities,
            note: SoapNote::new(subjective, objective, assessment, plan),
            codes: Vec::new(),
        }
    }
}

#[async_trait]
impl NoteGenerator for RuleBasedGenerator {
    fn name(&self) -> &'static str {
        "rule_based"
    }

    async fn generate(&self, request: &NoteRequest) -> Result<NoteOutcome> {
        Ok(self.generate_note(request))
    }
}

fn lexicon_entity(text: &str, category: EntityCategory) -> Entity {
    Entity {
        text: text.to_string(),
        category,
        confidence: 0.8,
        source: "lexicon".to_string(),
    }
}

fn entities_contain(entities: &[Entity], text: &str) -> bool {
    entities.iter().any(|e| e.text.eq_ignore_ascii_case(text))
}

/// ASCII terms match case-insensitively; source-script terms match as-is
fn contains_term(transcript: &str, lowered: &str, term: &str) -> bool {
    if term.is_ascii() {
        lowered.contains(term)
    } else {
        transcript.contains(term)
    }
}

/// First `<systolic>/<diastolic>` pair in the transcript
fn find_blood_pressure(text: &str) -> Option<String> {
    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_ascii_digit() && c != '/');
        if let Some((systolic, diastolic)) = word.split_once('/') {
            let sys_ok = systolic.len() >= 2 && systolic.chars().all(|c| c.is_ascii_digit());
            let dia_ok = diastolic.len() >= 2 && diastolic.chars().all(|c| c.is_ascii_digit());
            if sys_ok && dia_ok {
                return Some(format!("{systolic}/{diastolic}"));
            }
        }
    }
    None
}

/// A plausible body temperature followed by an F marker ("101 F", "98.6F")
fn find_temperature(text: &str) -> Option<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    for (i, word) in words.iter().enumerate() {
        let (number, suffix) = split_leading_number(word);
        if number.is_empty() {
            continue;
        }
        let followed_by_f = suffix.eq_ignore_ascii_case("f")
            || (suffix.is_empty()
                && words
                    .get(i + 1)
                    .is_some_and(|next| next.eq_ignore_ascii_case("f")));
        if !followed_by_f {
            continue;
        }
        if let Ok(value) = number.parse::<f64>() {
            if (90.0..=110.0).contains(&value) {
                return Some(number.to_string());
            }
        }
    }
    None
}

/// Dosage tokens like "650mg", "500 mg", "5ml"
fn find_dosages(text: &str) -> Vec<String> {
    let units = ["mg", "ml", "g"];
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut found = Vec::new();

    for (i, word) in words.iter().enumerate() {
        let (number, suffix) = split_leading_number(word);
        if number.is_empty() {
            continue;
        }
        let unit = if units.contains(&suffix.to_ascii_lowercase().as_str()) {
            Some(suffix.to_ascii_lowercase())
        } else if suffix.is_empty() {
            words
                .get(i + 1)
                .map(|next| next.trim_end_matches('.').to_ascii_lowercase())
                .filter(|next| units.contains(&next.as_str()))
        } else {
            None
        };
        if let Some(unit) = unit {
            found.push(format!("{number}{unit}"));
        }
    }
    found
}

fn split_leading_number(word: &str) -> (&str, &str) {
    let end = word
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit() && *c != '.')
        .map(|(i, _)| i)
        .unwrap_or(word.len());
    let (number, suffix) = word.split_at(end);
    (number.trim_end_matches('.'), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(transcript: &str, language: Language) -> NoteRequest {
        NoteRequest {
            transcript: transcript.to_string(),
            segments: vec![],
            language,
            patient_name: None,
        }
    }

    #[test]
    fn test_tamil_terms_are_extracted() {
        let generator = RuleBasedGenerator::new();
        let outcome = generator.generate_note(&request(
            "நோயாளிக்கு காய்ச்சல் மற்றும் தலைவலி உள்ளது. BP 120/80. பாராசிட்டமால் 500mg கொடுக்கவும்.",
            Language::Tamil,
        ));

        let symptoms: Vec<&str> = outcome
            .entities
            .iter()
            .filter(|e| e.category == EntityCategory::Symptom)
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(symptoms, vec!["fever", "headache"]);

        assert!(outcome
            .entities
            .iter()
            .any(|e| e.category == EntityCategory::Medication && e.text == "Paracetamol"));
        assert!(outcome
            .entities
            .iter()
            .any(|e| e.category == EntityCategory::Vital && e.text == "BP 120/80"));
        assert!(outcome
            .entities
            .iter()
            .any(|e| e.category == EntityCategory::Dosage && e.text == "500mg"));

        assert_eq!(outcome.note.subjective[0], "Reports fever");
        assert!(outcome.note.plan.iter().any(|p| matches!(
            p,
            PlanItem::Prescription { medication, .. } if medication == "Paracetamol"
        )));
        assert!(outcome.codes.is_empty());
    }

    #[test]
    fn test_english_keywords_match_case_insensitively() {
        let generator = RuleBasedGenerator::new();
        let outcome = generator.generate_note(&request(
            "Patient has Fever and COUGH for two days",
            Language::Telugu,
        ));

        assert_eq!(outcome.note.subjective.len(), 2);
        assert!(outcome.note.subjective.contains(&"Reports fever".to_string()));
        assert!(outcome.note.subjective.contains(&"Reports cough".to_string()));
    }

    #[test]
    fn test_vitals_parsing() {
        assert_eq!(
            find_blood_pressure("BP was 130/85 today"),
            Some("130/85".to_string())
        );
        assert_eq!(find_blood_pressure("no vitals"), None);
        // Date-like tokens are not blood pressure
        assert_eq!(find_blood_pressure("seen 3/4 times"), None);

        assert_eq!(find_temperature("temperature 101 F"), Some("101".to_string()));
        assert_eq!(find_temperature("temp 98.6F recorded"), Some("98.6".to_string()));
        assert_eq!(find_temperature("fever of 200 F"), None);
    }

    #[test]
    fn test_dosage_parsing() {
        assert_eq!(
            find_dosages("Paracetamol 650mg and syrup 5 ml"),
            vec!["650mg".to_string(), "5ml".to_string()]
        );
        assert!(find_dosages("no numbers here").is_empty());
    }

    #[test]
    fn test_sections_are_never_absent() {
        let generator = RuleBasedGenerator::new();
        let outcome = generator.generate_note(&request("short unrelated text", Language::Tamil));

        assert!(!outcome.note.subjective.is_empty());
        assert!(!outcome.note.objective.is_empty());
        assert!(!outcome.note.assessment.is_empty());
        assert!(!outcome.note.is_empty());
    }
}
