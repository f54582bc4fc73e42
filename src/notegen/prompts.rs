use crate::models::SpeakerRole;

use super::NoteRequest;

/// System prompt for the note LLM (non-negotiable documentation rules)
pub const SYSTEM_PROMPT: &str = r#"You are an expert medical scribe converting doctor-patient consultations into professional, structured SOAP (Subjective, Objective, Assessment, Plan) notes.

You MUST follow these rules:

1. All output must be in English only. Translate every source-language term; do not include source-language text or terms in brackets.
2. Use standard medical terminology and document medications with dosage, frequency (TID/BD/OD/SOS), and duration.
3. Every one of the four sections must be present. If a section has no findings, submit it as an empty list; never invent findings that contradict the transcript.
4. If the transcript mentions symptoms but no examination, note that objective findings were not documented and recommend clinical examination.
5. Derive ICD-10 codes only for diagnoses you actually state in the assessment.
6. Do not extract an entity unless you can assign it one of the provided categories.

Submit the note with the submit_note tool. Do not reply with prose."#;

/// Build the user prompt for one consultation
pub fn build_note_prompt(request: &NoteRequest) -> String {
    let mut prompt = String::new();

    prompt.push_str(&format!(
        "Convert this {} doctor-patient consultation into a structured SOAP note in English.\n\n",
        request.language.name()
    ));

    if let Some(patient) = &request.patient_name {
        prompt.push_str(&format!("Patient: {}\n\n", patient));
    }

    if request.segments.is_empty() {
        prompt.push_str("## Full Transcript\n");
        prompt.push_str(&request.transcript);
        prompt.push('\n');
    } else {
        // Speaker-separated context produces better section assignment
        prompt.push_str("## Clinician's Speech\n");
        push_speech(&mut prompt, request, SpeakerRole::Clinician);
        prompt.push_str("\n## Patient's Speech\n");
        push_speech(&mut prompt, request, SpeakerRole::Patient);
    }

    prompt.push_str("\n## Instructions\n");
    prompt.push_str("Extract clinical entities, write the four SOAP sections, and derive ICD-10 codes.\n");
    prompt.push_str("Each section is a list of short findings, one finding per item.\n");
    prompt.push_str("Plan items for prescriptions must be structured objects with medication, dosage, and frequency.\n");

    prompt
}

fn push_speech(prompt: &mut String, request: &NoteRequest, role: SpeakerRole) {
    let mut wrote = false;
    for segment in request.segments.iter().filter(|s| s.speaker == role) {
        let text = segment.text.trim();
        if !text.is_empty() {
            prompt.push_str(text);
            prompt.push('\n');
            wrote = true;
        }
    }
    if !wrote {
        prompt.push_str("(none)\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiarizedSegment, Language};

    #[test]
    fn test_prompt_without_diarization_uses_full_transcript() {
        let request = NoteRequest {
            transcript: "patient reports fever".to_string(),
            segments: vec![],
            language: Language::Tamil,
            patient_name: None,
        };

        let prompt = build_note_prompt(&request);
        assert!(prompt.contains("Tamil"));
        assert!(prompt.contains("## Full Transcript"));
        assert!(prompt.contains("patient reports fever"));
        assert!(!prompt.contains("## Clinician's Speech"));
    }

    #[test]
    fn test_prompt_with_diarization_separates_speakers() {
        let request = NoteRequest {
            transcript: "full text".to_string(),
            segments: vec![
                DiarizedSegment {
                    speaker: SpeakerRole::Clinician,
                    text: "how long have you had it".to_string(),
                    start_secs: 0.0,
                    end_secs: 2.0,
                },
                DiarizedSegment {
                    speaker: SpeakerRole::Patient,
                    text: "three days".to_string(),
                    start_secs: 2.0,
                    end_secs: 3.0,
                },
            ],
            language: Language::Telugu,
            patient_name: Some("Priya".to_string()),
        };

        let prompt = build_note_prompt(&request);
        assert!(prompt.contains("Patient: Priya"));
        assert!(prompt.contains("## Clinician's Speech\nhow long have you had it"));
        assert!(prompt.contains("## Patient's Speech\nthree days"));
    }
}
