use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::SoapNote;
use crate::normalize::normalize;

/// Clinic identification embedded in rendered documents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicMetadata {
    pub clinic_name: String,
    pub practitioner: Option<String>,
    pub address: Option<String>,
    pub registration: Option<String>,
}

/// Render a note into a downloadable document.
///
/// Every section is passed through the bullet normalizer and emitted under
/// a fixed heading order, so identical note + metadata always produce
/// byte-identical output. The document is built entirely in memory; a
/// failure returns [`PipelineError::Render`] with no partial artifact.
pub fn render_document(note: &SoapNote, clinic: Option<&ClinicMetadata>) -> Result<Vec<u8>> {
    if note.is_empty() {
        return Err(PipelineError::Render(
            "note has no content in any section".to_string(),
        ));
    }

    let mut doc = String::new();
    doc.push_str("MEDICAL CONSULTATION NOTE\n");
    doc.push_str("=========================\n\n");

    if let Some(clinic) = clinic {
        doc.push_str(&clinic.clinic_name);
        doc.push('\n');
        if let Some(practitioner) = &clinic.practitioner {
            doc.push_str(practitioner);
            doc.push('\n');
        }
        if let Some(address) = &clinic.address {
            doc.push_str(address);
            doc.push('\n');
        }
        if let Some(registration) = &clinic.registration {
            doc.push_str("Reg. ");
            doc.push_str(registration);
            doc.push('\n');
        }
        doc.push('\n');
    }

    push_section(&mut doc, "Subjective", &note.subjective);
    push_section(&mut doc, "Objective", &note.objective);
    push_section(&mut doc, "Assessment", &note.assessment);
    let plan_lines: Vec<String> = note.plan.iter().map(|p| p.to_line()).collect();
    push_section(&mut doc, "Plan", &plan_lines);

    Ok(doc.into_bytes())
}

/// Suggested download filename, stable per consultation
pub fn document_filename(patient_name: Option<&str>, id_prefix: &str) -> String {
    let patient = patient_name
        .map(sanitize_name)
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| "consultation".to_string());
    format!("consultation_{}_{}.md", patient, id_prefix)
}

fn push_section<S: AsRef<str>>(doc: &mut String, heading: &str, lines: &[S]) {
    doc.push_str("## ");
    doc.push_str(heading);
    doc.push('\n');

    let joined = lines
        .iter()
        .map(|l| l.as_ref())
        .collect::<Vec<_>>()
        .join("\n");
    let bulleted = normalize(&joined);
    if bulleted.is_empty() {
        doc.push_str("- None recorded\n");
    } else {
        doc.push_str(&bulleted);
        doc.push('\n');
    }
    doc.push('\n');
}

fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanItem;

    fn sample_note() -> SoapNote {
        SoapNote::new(
            vec!["Fever for 3 days - Cough".to_string()],
            vec!["BP 130/85 mmHg".to_string()],
            vec!["Acute pharyngitis".to_string()],
            vec![
                PlanItem::Prescription {
                    medication: "Paracetamol".to_string(),
                    dosage: "650mg".to_string(),
                    frequency: "three times daily".to_string(),
                },
                PlanItem::Text("Follow-up in 3 days".to_string()),
            ],
        )
    }

    fn sample_clinic() -> ClinicMetadata {
        ClinicMetadata {
            clinic_name: "Arogya Clinic".to_string(),
            practitioner: Some("Dr. S. Rao".to_string()),
            address: None,
            registration: Some("TN/2020/1234".to_string()),
        }
    }

    #[test]
    fn test_render_is_deterministic() {
        let note = sample_note();
        let clinic = sample_clinic();
        let first = render_document(&note, Some(&clinic)).unwrap();
        let second = render_document(&note, Some(&clinic)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_render_normalizes_sections() {
        let note = sample_note();
        let bytes = render_document(&note, None).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("## Subjective\n- Fever for 3 days\n- Cough"));
        assert!(text.contains("- Paracetamol 650mg, three times daily"));
    }

    #[test]
    fn test_render_embeds_clinic() {
        let note = sample_note();
        let bytes = render_document(&note, Some(&sample_clinic())).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains("Arogya Clinic"));
        assert!(text.contains("Dr. S. Rao"));
        assert!(text.contains("Reg. TN/2020/1234"));
    }

    #[test]
    fn test_empty_note_is_a_render_error() {
        let empty = SoapNote::new(vec![], vec![], vec![], vec![]);
        assert!(matches!(
            render_document(&empty, None),
            Err(PipelineError::Render(_))
        ));
    }

    #[test]
    fn test_written_document_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consultation.md");

        let bytes = render_document(&sample_note(), Some(&sample_clinic())).unwrap();
        std::fs::write(&path, &bytes).unwrap();

        let read_back = std::fs::read(&path).unwrap();
        assert_eq!(read_back, bytes);
    }

    #[test]
    fn test_document_filename() {
        assert_eq!(
            document_filename(Some("Priya K"), "1a2b3c4d"),
            "consultation_Priya_K_1a2b3c4d.md"
        );
        assert_eq!(
            document_filename(None, "1a2b3c4d"),
            "consultation_consultation_1a2b3c4d.md"
        );
    }
}
