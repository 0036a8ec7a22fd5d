use crate::models::IniLine;
use crate::services::parser::{reconstruct, split_sections};

/// Re-indent a fixed file: one tab per conditional depth, `if`/`elif`/`else`
/// one level out, no indentation on headers, exactly one blank line after every
/// section.
pub fn normalize_indentation(content: &str) -> String {
    let mut sections = split_sections(content);

    for section in sections.iter_mut() {
        if !section.is_preamble {
            section.name = section.name.trim_start().to_string();
        }

        let mut depth: usize = 0;
        for line in section.lines.iter_mut() {
            if line.norm_key().is_empty() {
                continue;
            }

            if line.key_starts_with("if") {
                depth += 1;
            } else if line.key_starts_with("endif") {
                depth = depth.saturating_sub(1);
            }

            let level = if line.is_branch_start() {
                depth.saturating_sub(1)
            } else {
                depth
            };
            let key = format!("{}{}", "\t".repeat(level), line.key.trim_start());
            line.set_key(key);
        }

        if section.is_preamble && section.lines.iter().all(IniLine::is_blank) {
            section.lines.clear();
            continue;
        }
        section.ensure_trailing_newline();
        section.trim_trailing_blank();
        section.lines.push(IniLine::blank());
    }

    reconstruct(&sections)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_conditions_are_tab_indented() {
        let input = "  [CommandListKafka]\n\
                     if $swapvar == 0\n\
                     vb0 = A\n\
                     if DRAW_TYPE == 1\n\
                           draw = 10, 0\n\
                     endif\n\
                     else\n\
                     vb0 = B\n\
                     endif\n\n\n";

        assert_eq!(
            normalize_indentation(input),
            "[CommandListKafka]\n\
             if $swapvar == 0\n\
             \tvb0 = A\n\
             \tif DRAW_TYPE == 1\n\
             \t\tdraw = 10, 0\n\
             \tendif\n\
             else\n\
             \tvb0 = B\n\
             endif\n\n"
        );
    }

    #[test]
    fn test_each_section_gets_one_blank_line() {
        let input = "; header comment\n[A]\nx = 1\n[B]\ny = 2";
        assert_eq!(normalize_indentation(input), "; header comment\n\n[A]\nx = 1\n\n[B]\ny = 2\n\n");
    }

    #[test]
    fn test_normalization_is_stable() {
        let input = "[A]\nif $a == 1\n    x = 1\nelif $a == 2\n  x = 2\nendif\n";
        let once = normalize_indentation(input);
        assert_eq!(normalize_indentation(&once), once);
    }
}
