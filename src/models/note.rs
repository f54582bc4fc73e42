use serde::{Deserialize, Serialize};

/// One line of the plan section: either free text or a structured
/// prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlanItem {
    Prescription {
        medication: String,
        dosage: String,
        frequency: String,
    },
    Text(String),
}

impl PlanItem {
    /// Render as a single plan line. Prescriptions use commas rather than
    /// dashes so the bullet normalizer never splits them.
    pub fn to_line(&self) -> String {
        match self {
            PlanItem::Prescription {
                medication,
                dosage,
                frequency,
            } => {
                let mut line = medication.clone();
                if !dosage.is_empty() {
                    line.push(' ');
                    line.push_str(dosage);
                }
                if !frequency.is_empty() {
                    line.push_str(", ");
                    line.push_str(frequency);
                }
                line
            }
            PlanItem::Text(text) => text.clone(),
        }
    }
}

/// A clinical note structured into the four SOAP sections, plus its
/// rendered canonical markdown form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapNote {
    #[serde(default)]
    pub subjective: Vec<String>,
    #[serde(default)]
    pub objective: Vec<String>,
    #[serde(default)]
    pub assessment: Vec<String>,
    #[serde(default)]
    pub plan: Vec<PlanItem>,
    /// Canonical text form, regenerated whenever the sections change
    #[serde(default)]
    pub markdown: String,
}

impl SoapNote {
    pub fn new(
        subjective: Vec<String>,
        objective: Vec<String>,
        assessment: Vec<String>,
        plan: Vec<PlanItem>,
    ) -> Self {
        let mut note = Self {
            subjective,
            objective,
            assessment,
            plan,
            markdown: String::new(),
        };
        note.markdown = note.render_markdown();
        note
    }

    /// Whether every section is empty
    pub fn is_empty(&self) -> bool {
        self.subjective.is_empty()
            && self.objective.is_empty()
            && self.assessment.is_empty()
            && self.plan.is_empty()
    }

    /// Build the canonical markdown form from the sections
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        render_section(&mut out, "Subjective", &self.subjective);
        render_section(&mut out, "Objective", &self.objective);
        render_section(&mut out, "Assessment", &self.assessment);
        let plan_lines: Vec<String> = self.plan.iter().map(|p| p.to_line()).collect();
        render_section(&mut out, "Plan", &plan_lines);
        out.trim_end().to_string()
    }

    /// Refresh the cached markdown after section edits
    pub fn refresh_markdown(&mut self) {
        self.markdown = self.render_markdown();
    }
}

fn render_section<S: AsRef<str>>(out: &mut String, heading: &str, lines: &[S]) {
    out.push_str("## ");
    out.push_str(heading);
    out.push('\n');
    if lines.is_empty() {
        out.push_str("- None recorded\n");
    } else {
        for line in lines {
            out.push_str("- ");
            out.push_str(line.as_ref());
            out.push('\n');
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_item_wire_forms() {
        let json = r#"["Rest and fluids", {"medication": "Paracetamol", "dosage": "650mg", "frequency": "three times daily"}]"#;
        let items: Vec<PlanItem> = serde_json::from_str(json).unwrap();

        assert_eq!(items[0], PlanItem::Text("Rest and fluids".to_string()));
        assert_eq!(
            items[1],
            PlanItem::Prescription {
                medication: "Paracetamol".to_string(),
                dosage: "650mg".to_string(),
                frequency: "three times daily".to_string(),
            }
        );
    }

    #[test]
    fn test_prescription_line_avoids_dashes() {
        let item = PlanItem::Prescription {
            medication: "Paracetamol".to_string(),
            dosage: "650mg".to_string(),
            frequency: "three times daily for 3 days".to_string(),
        };
        assert_eq!(item.to_line(), "Paracetamol 650mg, three times daily for 3 days");
        assert!(!item.to_line().contains(" - "));
    }

    #[test]
    fn test_markdown_has_all_four_sections() {
        let note = SoapNote::new(
            vec!["Fever for 3 days".to_string()],
            vec![],
            vec!["Acute pharyngitis".to_string()],
            vec![PlanItem::Text("Follow-up in 3 days".to_string())],
        );

        let markdown = note.render_markdown();
        assert!(markdown.contains("## Subjective"));
        assert!(markdown.contains("## Objective"));
        assert!(markdown.contains("## Assessment"));
        assert!(markdown.contains("## Plan"));
        assert!(markdown.contains("- Fever for 3 days"));
        assert!(markdown.contains("- None recorded"));
        assert_eq!(note.markdown, markdown);
    }

    #[test]
    fn test_is_empty() {
        let empty = SoapNote::new(vec![], vec![], vec![], vec![]);
        assert!(empty.is_empty());
        let note = SoapNote::new(vec!["x".to_string()], vec![], vec![], vec![]);
        assert!(!note.is_empty());
    }
}
