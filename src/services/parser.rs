//! Section splitting and reconstruction.
//!
//! `reconstruct(&split_sections(text)) == text` for any input: line terminators
//! (including `\r\n`) stay inside the raw line text.

use crate::models::{IniLine, Section};

/// Split raw file text into sections.
///
/// A trimmed line that starts with `[` and ends with `]` opens a new section.
/// Everything before the first header lands in the preamble section.
pub fn split_sections(content: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section::preamble();

    for raw in content.split_inclusive('\n') {
        if is_header(raw) {
            sections.push(std::mem::replace(&mut current, Section::new(raw)));
            continue;
        }
        current.lines.push(IniLine::parse(raw));
    }

    sections.push(current);
    sections
}

fn is_header(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']')
}

/// Render sections back to file text.
pub fn reconstruct(sections: &[Section]) -> String {
    sections.iter().map(Section::to_text).collect()
}

/// Index of the section titled `title` (brackets excluded, case-insensitive).
pub fn find_section(sections: &[Section], title: &str) -> Option<usize> {
    sections.iter().position(|s| s.has_title(title))
}

/// Indices of every section declaring `hash`.
pub fn sections_with_hash(sections: &[Section], hash: &str) -> Vec<usize> {
    sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.declares_hash(hash))
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "; Merged Mod\n\
                          [Constants]\n\
                          global persist $swapvar = 0\n\
                          \n\
                          [TextureOverrideKafkaBodyBlend]\n\
                          hash = 4babbbd9\n\
                          run = CommandListKafkaBody\n";

    #[test]
    fn test_split_sections() {
        let sections = split_sections(SAMPLE);

        assert_eq!(sections.len(), 3);
        assert!(sections[0].is_preamble);
        assert_eq!(sections[0].lines.len(), 1);
        assert_eq!(sections[1].title(), Some("Constants"));
        assert_eq!(sections[2].hash(), Some("4babbbd9"));
        assert_eq!(sections[2].value_of("run"), Some("CommandListKafkaBody"));
    }

    #[test]
    fn test_round_trip_exact() {
        assert_eq!(reconstruct(&split_sections(SAMPLE)), SAMPLE);

        let crlf = "[A]\r\nhash = 1\r\n\r\n  [B]  \r\nx=y";
        assert_eq!(reconstruct(&split_sections(crlf)), crlf);

        assert_eq!(reconstruct(&split_sections("")), "");
    }

    #[test]
    fn test_find_helpers() {
        let sections = split_sections(SAMPLE);
        assert_eq!(find_section(&sections, "constants"), Some(1));
        assert_eq!(find_section(&sections, "CommandListKafkaBody"), None);
        assert_eq!(sections_with_hash(&sections, "4babbbd9"), vec![2]);
    }
}
