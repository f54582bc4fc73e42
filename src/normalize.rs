//! Canonical bullet structuring for note sections.
//!
//! Provider output and reviewer edits arrive as anything from tidy bullet
//! lists to flat `"A - B - C"` strings. Rendering needs one shape, and
//! reprocessing must be safe, so `normalize` is idempotent:
//! `normalize(normalize(x)) == normalize(x)` for every input.

const BULLET_MARKERS: [&str; 3] = ["- ", "* ", "\u{2022} "];

/// Convert loosely delimited section text into one bullet per line.
///
/// Lines that already start with a bullet marker pass through unchanged.
/// Other lines are split on hyphen delimiters that have whitespace on both
/// sides, except between two digits: `"10 - 14 days"` and `"120 - 80"` are
/// dosage/range expressions, not item boundaries, and in-word hyphens
/// (`"follow-up"`, `"co-amoxiclav"`) are never touched. Trailing separator
/// periods are trimmed from each item.
pub fn normalize(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_bulleted(line) {
            out.push(line.to_string());
            continue;
        }
        for segment in split_segments(line) {
            out.push(format!("- {}", segment));
        }
    }

    out.join("\n")
}

fn is_bulleted(line: &str) -> bool {
    BULLET_MARKERS.iter().any(|m| line.starts_with(m))
}

/// Split one flat line into item segments on delimiter hyphens.
fn split_segments(line: &str) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '-' && is_delimiter(&chars, i) {
            push_segment(&mut segments, &current);
            current.clear();
            i += 1;
            continue;
        }
        current.push(chars[i]);
        i += 1;
    }
    push_segment(&mut segments, &current);

    if segments.is_empty() {
        // Nothing but separators; keep the trimmed line as a single item
        let cleaned = clean_segment(line);
        if !cleaned.is_empty() {
            segments.push(cleaned);
        }
    }

    segments
}

/// A hyphen is a delimiter only with whitespace on both sides, and never
/// between two digits (numeric ranges stay intact).
fn is_delimiter(chars: &[char], idx: usize) -> bool {
    let before_ws = idx > 0 && chars[idx - 1].is_whitespace();
    let after_ws = idx + 1 < chars.len() && chars[idx + 1].is_whitespace();
    if !before_ws || !after_ws {
        return false;
    }

    let prev = chars[..idx].iter().rev().find(|c| !c.is_whitespace());
    let next = chars[idx + 1..].iter().find(|c| !c.is_whitespace());
    if let (Some(p), Some(n)) = (prev, next) {
        if p.is_ascii_digit() && n.is_ascii_digit() {
            return false;
        }
    }

    true
}

fn push_segment(segments: &mut Vec<String>, raw: &str) {
    let cleaned = clean_segment(raw);
    if !cleaned.is_empty() {
        segments.push(cleaned);
    }
}

fn clean_segment(raw: &str) -> String {
    let cleaned = raw.trim().trim_end_matches('.').trim();
    // A run of separators with no content is not an item
    if cleaned.chars().all(|c| c == '-' || c.is_whitespace()) {
        return String::new();
    }
    cleaned.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_idempotent(input: &str) {
        let once = normalize(input);
        assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
    }

    #[test]
    fn test_flat_string_becomes_bullets() {
        let input = "Fever for 3 days - Cough - Mild headache.";
        assert_eq!(
            normalize(input),
            "- Fever for 3 days\n- Cough\n- Mild headache"
        );
        assert_idempotent(input);
    }

    #[test]
    fn test_already_bulleted_passes_through() {
        let input = "- Fever for 3 days\n- Cough";
        assert_eq!(normalize(input), input);
        assert_idempotent(input);
    }

    #[test]
    fn test_star_and_dot_markers_pass_through() {
        let input = "* Fever\n\u{2022} Cough";
        assert_eq!(normalize(input), input);
        assert_idempotent(input);
    }

    #[test]
    fn test_in_word_hyphens_are_kept() {
        let input = "Follow-up in 3 days with co-amoxiclav";
        assert_eq!(normalize(input), "- Follow-up in 3 days with co-amoxiclav");
        assert_idempotent(input);
    }

    #[test]
    fn test_numeric_ranges_are_not_split() {
        let input = "Reassess in 10 - 14 days";
        assert_eq!(normalize(input), "- Reassess in 10 - 14 days");
        assert_idempotent(input);

        let input = "BP recorded 120 - 80";
        assert_eq!(normalize(input), "- BP recorded 120 - 80");
        assert_idempotent(input);
    }

    #[test]
    fn test_period_dash_separator() {
        let input = "Rest advised. - Fluids encouraged.";
        assert_eq!(normalize(input), "- Rest advised\n- Fluids encouraged");
        assert_idempotent(input);
    }

    #[test]
    fn test_mixed_bulleted_and_flat_lines() {
        let input = "- Fever for 3 days\nCough - Sore throat";
        assert_eq!(
            normalize(input),
            "- Fever for 3 days\n- Cough\n- Sore throat"
        );
        assert_idempotent(input);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n  \n"), "");
        assert_idempotent("");
    }

    #[test]
    fn test_separator_only_line() {
        assert_eq!(normalize(" - "), "");
        assert_idempotent(" - ");
    }
}
