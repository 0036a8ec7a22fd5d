//! Section/line model for mod `.ini` files.
//!
//! Raw text is kept verbatim (line terminators included) so an untouched model
//! renders back to the exact input. All matching goes through the normalized
//! (trimmed, lower-cased) fields.

/// One line of a mod `.ini` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IniLine {
    /// Raw key text. For bare lines this is the whole line including its terminator.
    pub key: String,
    /// Raw value text including the line terminator. Empty for bare lines.
    pub value: String,
    /// True when the line split into exactly one `key=value` pair
    pub is_pair: bool,
    norm_key: String,
    norm_value: String,
}

impl IniLine {
    /// Classify a raw line. Exactly one `=` yields a pair, anything else a bare line.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => Self::pair(key, value),
            _ => Self::bare(raw),
        }
    }

    pub fn pair(key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        Self {
            norm_key: normalize(&key),
            norm_value: normalize(&value),
            key,
            value,
            is_pair: true,
        }
    }

    pub fn bare(text: impl Into<String>) -> Self {
        let key = text.into();
        Self {
            norm_key: normalize(&key),
            norm_value: String::new(),
            key,
            value: String::new(),
            is_pair: false,
        }
    }

    /// Blank separator line
    pub fn blank() -> Self {
        Self::bare("\n")
    }

    pub fn norm_key(&self) -> &str {
        &self.norm_key
    }

    pub fn norm_value(&self) -> &str {
        &self.norm_value
    }

    /// Trimmed value with original casing (resource names keep their case).
    pub fn trimmed_value(&self) -> &str {
        self.value.trim()
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.norm_key == key.trim().to_lowercase()
    }

    pub fn key_starts_with(&self, prefix: &str) -> bool {
        self.norm_key.starts_with(&prefix.trim().to_lowercase())
    }

    pub fn is_blank(&self) -> bool {
        !self.is_pair && self.key.trim().is_empty()
    }

    /// Normalized value of a `hash = ...` line.
    pub fn hash_value(&self) -> Option<&str> {
        (self.is_pair && self.norm_key == "hash").then_some(self.norm_value.as_str())
    }

    /// Opens a conditional branch (`if`, `elif`, `else`, `elseif`).
    pub fn is_branch_start(&self) -> bool {
        self.key_starts_with("if") || self.key_starts_with("elif") || self.key_starts_with("else")
    }

    /// Vertex count from a `draw = N, 0` line.
    pub fn draw_vertex_count(&self) -> Option<u32> {
        if !self.is_pair || !self.value.contains(',') {
            return None;
        }
        self.value.split(',').next()?.trim().parse().ok()
    }

    /// Exact text of the line as it appears in the file.
    pub fn text(&self) -> String {
        if self.is_pair {
            format!("{}={}", self.key, self.value)
        } else {
            self.key.clone()
        }
    }

    /// Replace the raw key, keeping the normalized form in sync.
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
        self.norm_key = normalize(&self.key);
    }

    /// Replace the raw value, keeping the normalized form in sync.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.norm_value = normalize(&self.value);
    }

    /// Disabled copy of this line (`;` prefix)
    pub fn commented(&self) -> Self {
        let mut line = self.clone();
        line.set_key(format!(";{}", self.key));
        line
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// A `[Header]` block of lines. The preamble holds everything before the first header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Raw header line including brackets and terminator; empty for the preamble.
    pub name: String,
    pub lines: Vec<IniLine>,
    pub is_preamble: bool,
}

impl Section {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: Vec::new(),
            is_preamble: false,
        }
    }

    pub fn preamble() -> Self {
        Self {
            name: String::new(),
            lines: Vec::new(),
            is_preamble: true,
        }
    }

    /// Header text between the brackets, or `None` for the preamble and commented headers.
    pub fn title(&self) -> Option<&str> {
        let trimmed = self.name.trim();
        trimmed.strip_prefix('[')?.strip_suffix(']')
    }

    pub fn has_title(&self, title: &str) -> bool {
        self.title()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(title.trim()))
    }

    pub fn title_starts_with(&self, prefix: &str) -> bool {
        self.title()
            .is_some_and(|t| t.to_lowercase().starts_with(&prefix.trim().to_lowercase()))
    }

    /// Header for log messages
    pub fn display_name(&self) -> &str {
        self.name.trim()
    }

    /// First `hash = ...` value of the section.
    pub fn hash(&self) -> Option<&str> {
        self.lines.iter().find_map(IniLine::hash_value)
    }

    pub fn declares_hash(&self, hash: &str) -> bool {
        self.lines.iter().any(|line| line.hash_value() == Some(hash))
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.lines.iter().any(|line| line.has_key(key))
    }

    /// Trimmed value of the first line with the given key.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.lines
            .iter()
            .find(|line| line.is_pair && line.has_key(key))
            .map(IniLine::trimmed_value)
    }

    pub fn push_line(&mut self, raw: &str) {
        self.lines.push(IniLine::parse(raw));
    }

    /// Append a block of text (one line per `\n`), followed by a single blank line.
    pub fn push_text(&mut self, text: &str) {
        self.trim_trailing_blank();
        self.ensure_trailing_newline();
        for raw in text.lines() {
            self.lines.push(IniLine::parse(&format!("{raw}\n")));
        }
        self.trim_trailing_blank();
        self.lines.push(IniLine::blank());
    }

    /// Replace the whole body with the given text block.
    pub fn replace_body(&mut self, text: &str) {
        self.lines.clear();
        self.push_text(text);
    }

    pub fn trim_trailing_blank(&mut self) {
        while self.lines.last().is_some_and(IniLine::is_blank) {
            self.lines.pop();
        }
    }

    /// Make sure the last line is terminated so text can be appended after it.
    pub fn ensure_trailing_newline(&mut self) {
        match self.lines.last_mut() {
            Some(line) if !line.text().ends_with('\n') => {
                if line.is_pair {
                    let value = format!("{}\n", line.value);
                    line.set_value(value);
                } else {
                    let key = format!("{}\n", line.key);
                    line.set_key(key);
                }
            }
            None if !self.is_preamble && !self.name.ends_with('\n') => self.name.push('\n'),
            _ => {}
        }
    }

    /// Lines of the section whose key matches `key`.
    pub fn lines_with_key<'s>(&'s self, key: &'s str) -> impl Iterator<Item = &'s IniLine> + 's {
        self.lines.iter().filter(move |line| line.is_pair && line.has_key(key))
    }

    /// Disable the header and every line with a `;` prefix.
    pub fn comment_out(&mut self) {
        self.trim_trailing_blank();
        if !self.is_preamble {
            self.name = format!(";{}", self.name);
        }
        self.lines = self.lines.iter().map(IniLine::commented).collect();
        self.lines.push(IniLine::blank());
    }

    /// Render the section exactly as it would appear in the file.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.name.len() + self.lines.len() * 24);
        if !self.is_preamble {
            out.push_str(&self.name);
        }
        for line in &self.lines {
            out.push_str(&line.text());
        }
        out
    }
}

/// One branch of an if/elif/else chain inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlBlock {
    pub lines: Vec<IniLine>,
}

impl ControlBlock {
    pub fn new(lines: Vec<IniLine>) -> Self {
        Self { lines }
    }

    /// The `if`/`elif`/`else` line that opens the branch, if any.
    pub fn condition(&self) -> Option<&IniLine> {
        self.lines.first().filter(|line| line.is_branch_start())
    }

    pub fn to_text(&self) -> String {
        self.lines.iter().map(IniLine::text).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pair_line() {
        let line = IniLine::parse("  Hash = ABCdef12\n");
        assert!(line.is_pair);
        assert_eq!(line.norm_key(), "hash");
        assert_eq!(line.norm_value(), "abcdef12");
        assert_eq!(line.hash_value(), Some("abcdef12"));
        assert_eq!(line.text(), "  Hash = ABCdef12\n");
    }

    #[test]
    fn test_parse_bare_lines() {
        let cond = IniLine::parse("if $swapvar == 0\n");
        assert!(!cond.is_pair);
        assert!(cond.key_starts_with("if"));
        assert!(cond.is_branch_start());

        let comment = IniLine::parse("; vb0 = Foo\n");
        assert!(comment.is_pair);
        assert!(!comment.has_key("vb0"));
        assert!(comment.hash_value().is_none());

        assert!(IniLine::parse("\r\n").is_blank());
    }

    #[test]
    fn test_draw_vertex_count() {
        assert_eq!(IniLine::parse("draw = 1234, 0\n").draw_vertex_count(), Some(1234));
        assert_eq!(IniLine::parse("draw = 1234\n").draw_vertex_count(), None);
        assert_eq!(IniLine::parse("draw = x, 0\n").draw_vertex_count(), None);
    }

    #[test]
    fn test_section_titles() {
        let section = Section::new("[TextureOverrideKafkaBodyPosition]\n");
        assert_eq!(section.title(), Some("TextureOverrideKafkaBodyPosition"));
        assert!(section.title_starts_with("textureoverride"));
        assert!(section.has_title("textureoverridekafkabodyposition"));

        let disabled = Section::new(";[TextureOverrideKafkaBodyPosition]\n");
        assert_eq!(disabled.title(), None);
        assert!(!disabled.title_starts_with("textureoverride"));
    }

    #[test]
    fn test_comment_out_section() {
        let mut section = Section::new("[TextureOverrideA]\n");
        section.push_line("hash = 12345678\n");
        section.push_line("\n");
        section.comment_out();

        assert_eq!(section.to_text(), ";[TextureOverrideA]\n;hash = 12345678\n\n");
        assert!(section.hash().is_none());
    }

    #[test]
    fn test_push_text_adds_single_separator() {
        let mut section = Section::new("[A]\n");
        section.push_line("x = 1\n");
        section.push_line("\n");
        section.push_line("\n");
        section.push_text("y = 2\nz = 3\n\n");

        assert_eq!(section.to_text(), "[A]\nx = 1\ny = 2\nz = 3\n\n");
    }

    #[test]
    fn test_ensure_trailing_newline() {
        let mut section = Section::new("[A]\n");
        section.push_line("x = 1");
        section.ensure_trailing_newline();
        assert_eq!(section.to_text(), "[A]\nx = 1\n");

        let mut empty = Section::new("[B]");
        empty.ensure_trailing_newline();
        assert_eq!(empty.to_text(), "[B]\n");
    }
}
