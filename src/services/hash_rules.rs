//! Hash rule interpreter.
//!
//! Every hash declared in the file is pushed onto a work stack. Popping a hash runs
//! its rule from the game table once; upgrades push their target hash so chains like
//! v1 -> v2 -> v3 resolve in a single pass. The visited set only grows and the table
//! is finite, so the loop always ends.

use crate::models::{Action, IniLine, RuleTable, Section};
use regex::Regex;
use std::collections::HashSet;

/// Per-file interpreter state. Never shared between files.
#[derive(Debug, Default, Clone)]
pub struct EngineState {
    stack: Vec<String>,
    visited: HashSet<String>,
}

impl EngineState {
    pub fn seeded(hashes: Vec<String>) -> Self {
        Self {
            stack: hashes,
            visited: HashSet::new(),
        }
    }

    /// Hash was queued or already processed in this run
    pub fn has_seen(&self, hash: &str) -> bool {
        self.visited.contains(hash) || self.stack.iter().any(|h| h == hash)
    }

    pub fn push(&mut self, hash: String) {
        self.stack.push(hash);
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }
}

/// Control flow after one action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
    /// The hash was upgraded; later actions of the rule work on the new hash.
    Retarget(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashUpgrade {
    pub from: String,
    pub to: String,
    pub lines: usize,
}

/// What the interpreter did to one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleReport {
    pub upgrades: Vec<HashUpgrade>,
    /// Hashes whose sections were commented out
    pub commented: Vec<String>,
    /// Hashes whose sections were duplicated
    pub multiplied: Vec<String>,
    /// Hashes declared by newly added sections
    pub added: Vec<String>,
    /// Index buffer hashes that got the skin texture check
    pub skin_checks: Vec<String>,
    /// Hashes with a rule where nothing applied
    pub no_upgrade: Vec<String>,
    /// Actions the engine recognises but does not apply
    pub unsupported: Vec<String>,
    /// Number of hashes popped from the work stack
    pub iterations: usize,
}

impl RuleReport {
    pub fn changed(&self) -> bool {
        self.mutation_count() > 0
    }

    fn mutation_count(&self) -> usize {
        self.upgrades.len()
            + self.commented.len()
            + self.multiplied.len()
            + self.added.len()
            + self.skin_checks.len()
    }
}

/// Applies a game's [`RuleTable`] to a parsed file.
pub struct HashRuleEngine<'a> {
    table: &'a RuleTable,
    /// Matches a plain hexadecimal hash value
    hex_pattern: Regex,
}

impl<'a> HashRuleEngine<'a> {
    pub fn new(table: &'a RuleTable) -> Self {
        Self {
            table,
            hex_pattern: Regex::new(r"^[0-9a-f]+$").expect("Invalid hash regex"),
        }
    }

    /// Every hexadecimal `hash = ...` value in the file, in file order.
    pub fn collect_hashes(&self, sections: &[Section]) -> Vec<String> {
        sections
            .iter()
            .flat_map(|s| s.lines.iter())
            .filter_map(IniLine::hash_value)
            .filter(|h| self.hex_pattern.is_match(h))
            .map(str::to_string)
            .collect()
    }

    /// Run the table against the file until the work stack is empty.
    pub fn run(&self, sections: Vec<Section>) -> (Vec<Section>, RuleReport) {
        let mut state = EngineState::seeded(self.collect_hashes(&sections));
        let mut report = RuleReport::default();
        let mut sections = sections;

        while let Some(hash) = state.stack.pop() {
            report.iterations += 1;

            if !state.visited.insert(hash.clone()) {
                tracing::trace!("Skipping {}: already checked", hash);
                continue;
            }

            match self.table.actions_for(&hash) {
                Some(actions) => {
                    tracing::debug!("Upgrading {}", hash);
                    sections = self.execute(&hash, actions, sections, &mut state, &mut report);
                }
                None => tracing::trace!("Skipping {}: no upgrade available", hash),
            }
        }

        tracing::debug!(
            "Hash rules finished after {} iterations: {} upgrades, {} sections commented",
            report.iterations,
            report.upgrades.len(),
            report.commented.len()
        );

        (sections, report)
    }

    fn execute(
        &self,
        hash: &str,
        actions: &[Action],
        mut sections: Vec<Section>,
        state: &mut EngineState,
        report: &mut RuleReport,
    ) -> Vec<Section> {
        let before = report.mutation_count();
        let mut active = hash.to_string();

        for action in actions {
            let (next, flow) = self.apply(action, &active, sections, state, report);
            sections = next;
            match flow {
                Flow::Continue => {}
                Flow::Stop => break,
                Flow::Retarget(to) => active = to,
            }
        }

        let only_info = actions.iter().all(|a| matches!(a, Action::Info(_)));
        if report.mutation_count() == before && !only_info {
            tracing::debug!("Skipping {}: no upgrade available", hash);
            report.no_upgrade.push(hash.to_string());
        }

        sections
    }

    /// Apply one action for `hash`, returning the new section list.
    pub fn apply(
        &self,
        action: &Action,
        hash: &str,
        sections: Vec<Section>,
        state: &mut EngineState,
        report: &mut RuleReport,
    ) -> (Vec<Section>, Flow) {
        match action {
            Action::Info(message) => {
                tracing::info!("{}: {}", hash, message);
                (sections, Flow::Continue)
            }

            Action::UpgradeHash { to } => {
                let sections = self.upgrade(hash, to, sections, state, report);
                (sections, Flow::Retarget(to.to_lowercase()))
            }

            Action::UpgradeSharedHash {
                to,
                required_siblings,
                description,
            } => {
                if required_siblings.iter().any(|h| state.has_seen(&h.to_lowercase())) {
                    tracing::info!("{}: {}", hash, description);
                    let sections = self.upgrade(hash, to, sections, state, report);
                    (sections, Flow::Retarget(to.to_lowercase()))
                } else {
                    tracing::debug!("{}: no sibling hash of '{}' present", hash, description);
                    (sections, Flow::Continue)
                }
            }

            Action::CommentOut => {
                let (sections, count) = comment_out_hash(sections, hash);
                if count > 0 {
                    tracing::info!("Commented out {} section(s) declaring {}", count, hash);
                    report.commented.push(hash.to_string());
                }
                (sections, Flow::Continue)
            }

            Action::CheckHashAbsent { hash: other } => {
                let other = other.to_lowercase();
                let present = state.has_seen(&other) || sections.iter().any(|s| s.declares_hash(&other));
                if present {
                    tracing::debug!("{}: {} already present, rule done", hash, other);
                    (sections, Flow::Stop)
                } else {
                    (sections, Flow::Continue)
                }
            }

            Action::MultiplySection { titles, hashes } => {
                let (sections, added) = multiply_section(sections, hash, titles, hashes);
                if !added.is_empty() {
                    tracing::info!("Split section with {} into {} sections", hash, added.len() + 1);
                    report.multiplied.push(hash.to_string());
                    for new_hash in added {
                        state.push(new_hash);
                    }
                }
                (sections, Flow::Continue)
            }

            Action::UpgradeElseComment { to, missing } => {
                if missing.iter().any(|h| state.has_seen(&h.to_lowercase())) {
                    let (sections, count) = comment_out_hash(sections, hash);
                    if count > 0 {
                        tracing::info!("{} replaced by a newer section, commenting it out", hash);
                        report.commented.push(hash.to_string());
                    }
                    (sections, Flow::Continue)
                } else {
                    let sections = self.upgrade(hash, to, sections, state, report);
                    (sections, Flow::Retarget(to.to_lowercase()))
                }
            }

            Action::AddSkinTextureCheck => {
                let (sections, count) = add_skin_texture_check(sections, hash);
                if count > 0 {
                    tracing::info!("Added `run = CommandListSkinTexture` to {} section(s) of {}", count, hash);
                    report.skin_checks.push(hash.to_string());
                } else {
                    tracing::debug!("{}: skin texture check already present", hash);
                }
                (sections, Flow::Continue)
            }

            Action::AddSectionIfMissing { hashes, title, content } => {
                let Some(new_hash) = self.missing_equivalent(hashes, &sections, state) else {
                    tracing::debug!("{}: [TextureOverride{}] already present", hash, title);
                    return (sections, Flow::Continue);
                };
                let (sections, added) = add_section_after(sections, hash, title, &new_hash, |_| {
                    content.lines().map(str::to_string).collect()
                });
                if added {
                    tracing::info!("Added [TextureOverride{}] with {}", title, new_hash);
                    report.added.push(new_hash.clone());
                    state.push(new_hash);
                }
                (sections, Flow::Continue)
            }

            Action::MultiplySectionIfMissing { hashes, title } => {
                let Some(new_hash) = self.missing_equivalent(hashes, &sections, state) else {
                    tracing::debug!("{}: [TextureOverride{}] already present", hash, title);
                    return (sections, Flow::Continue);
                };
                let (sections, added) = add_section_after(sections, hash, title, &new_hash, body_without_hash);
                if added {
                    tracing::info!("Copied section with {} as [TextureOverride{}] with {}", hash, title, new_hash);
                    report.multiplied.push(new_hash.clone());
                    state.push(new_hash);
                }
                (sections, Flow::Continue)
            }

            Action::DuplicateIndexedSection { .. }
            | Action::ConvertBufferFormat { .. }
            | Action::ShrinkTexcoordColor { .. }
            | Action::RemapTexcoord { .. }
            | Action::RemapBlendIndices { .. }
            | Action::TransferIndexedSections { .. } => {
                tracing::warn!(
                    "{}: '{}' is not supported, please verify this part manually",
                    hash,
                    action.kind()
                );
                report.unsupported.push(format!("{}:{}", hash, action.kind()));
                (sections, Flow::Continue)
            }
        }
    }

    /// First of `hashes` when none of them is part of the file yet.
    fn missing_equivalent(&self, hashes: &[String], sections: &[Section], state: &EngineState) -> Option<String> {
        let hashes: Vec<String> = hashes.iter().map(|h| h.to_lowercase()).collect();
        let present = hashes
            .iter()
            .any(|h| state.has_seen(h) || sections.iter().any(|s| s.declares_hash(h)));
        if present { None } else { hashes.into_iter().next() }
    }

    fn upgrade(
        &self,
        from: &str,
        to: &str,
        sections: Vec<Section>,
        state: &mut EngineState,
        report: &mut RuleReport,
    ) -> Vec<Section> {
        let to = to.to_lowercase();
        let (sections, lines) = swap_hash(sections, from, &to);
        if lines > 0 {
            tracing::info!("Upgraded {} -> {} ({} line(s))", from, to, lines);
            report.upgrades.push(HashUpgrade {
                from: from.to_string(),
                to: to.clone(),
                lines,
            });
        }
        state.push(to);
        sections
    }
}

/// Rewrite `hash = old` lines to `hash = new`, leaving the old line commented out
/// right below it.
pub fn swap_hash(sections: Vec<Section>, old: &str, new: &str) -> (Vec<Section>, usize) {
    let mut count = 0;
    let sections = sections
        .into_iter()
        .map(|mut section| {
            if !section.declares_hash(old) {
                return section;
            }
            let mut lines = Vec::with_capacity(section.lines.len() + 1);
            for line in section.lines {
                if line.hash_value() == Some(old) {
                    lines.push(hash_line_like(&line, new));
                    lines.push(line.commented());
                    count += 1;
                } else {
                    lines.push(line);
                }
            }
            section.lines = lines;
            section
        })
        .collect();
    (sections, count)
}

/// `hash = <hash>` with the indentation of `template` and a guaranteed terminator.
fn hash_line_like(template: &IniLine, hash: &str) -> IniLine {
    let indent: String = template.key.chars().take_while(|c| c.is_whitespace()).collect();
    let newline = if template.value.ends_with("\r\n") { "\r\n" } else { "\n" };
    IniLine::pair(format!("{indent}hash "), format!(" {hash}{newline}"))
}

fn comment_out_hash(sections: Vec<Section>, hash: &str) -> (Vec<Section>, usize) {
    let mut count = 0;
    let sections = sections
        .into_iter()
        .map(|mut section| {
            if section.declares_hash(hash) {
                section.comment_out();
                count += 1;
            }
            section
        })
        .collect();
    (sections, count)
}

fn is_override(section: &Section) -> bool {
    section.title_starts_with("TextureOverride") || section.title_starts_with("ShaderOverride")
}

fn is_skin_texture_run(line: &IniLine) -> bool {
    line.is_pair && line.has_key("run") && line.norm_value() == "commandlistskintexture"
}

/// Insert `run = CommandListSkinTexture` into the index buffer overrides of `hash`.
///
/// Sections with `match_first_index` get it right after that line. Without any indexed
/// section the plain override gets it after its hash line.
fn add_skin_texture_check(mut sections: Vec<Section>, hash: &str) -> (Vec<Section>, usize) {
    let targets: Vec<usize> = sections
        .iter()
        .enumerate()
        .filter(|(_, s)| is_override(s) && s.declares_hash(hash))
        .map(|(i, _)| i)
        .collect();
    let indexed: Vec<usize> = targets
        .iter()
        .copied()
        .filter(|&i| sections[i].has_key("match_first_index"))
        .collect();

    let (patch, anchor) = if indexed.is_empty() {
        (targets.into_iter().take(1).collect::<Vec<_>>(), "hash")
    } else {
        (indexed, "match_first_index")
    };

    let mut count = 0;
    for index in patch {
        let section = &mut sections[index];
        if section.lines.iter().any(is_skin_texture_run) {
            continue;
        }
        let Some(at) = section.lines.iter().position(|l| l.is_pair && l.has_key(anchor)) else {
            continue;
        };
        let newline = if section.lines[at].value.ends_with("\r\n") { "\r\n" } else { "\n" };
        if !section.lines[at].value.ends_with('\n') {
            let value = format!("{}{}", section.lines[at].value, newline);
            section.lines[at].set_value(value);
        }
        section
            .lines
            .insert(at + 1, IniLine::parse(&format!("run = CommandListSkinTexture{newline}")));
        count += 1;
    }
    (sections, count)
}

/// Body lines of a section without its hash and `match_first_index` lines.
fn body_without_hash(section: &Section) -> Vec<String> {
    section
        .lines
        .iter()
        .filter(|l| !(l.is_pair && (l.has_key("hash") || l.has_key("match_first_index"))))
        .map(|l| l.text().trim_end_matches(['\r', '\n']).to_string())
        .collect()
}

/// Insert `[TextureOverride<title>]` declaring `new_hash` right after the first override
/// declaring `hash`. The body comes from `body`, given that override.
fn add_section_after(
    mut sections: Vec<Section>,
    hash: &str,
    title: &str,
    new_hash: &str,
    body: impl FnOnce(&Section) -> Vec<String>,
) -> (Vec<Section>, bool) {
    let Some(index) = sections.iter().position(|s| is_override(s) && s.declares_hash(hash)) else {
        tracing::debug!("No override declares {}, nothing to add", hash);
        return (sections, false);
    };

    let mut text = format!("hash = {new_hash}\n");
    for line in body(&sections[index]) {
        text.push_str(&line);
        text.push('\n');
    }
    let mut section = Section::new(format!("[TextureOverride{title}]\n"));
    section.push_text(&text);

    let anchor = &mut sections[index];
    anchor.ensure_trailing_newline();
    if !anchor.lines.last().is_some_and(IniLine::is_blank) {
        anchor.lines.push(IniLine::blank());
    }
    sections.insert(index + 1, section);
    (sections, true)
}

/// Replace the first section declaring `hash` with one copy per title/hash pair.
/// Returns the hashes introduced by the copies.
fn multiply_section(
    sections: Vec<Section>,
    hash: &str,
    titles: &[String],
    hashes: &[String],
) -> (Vec<Section>, Vec<String>) {
    let Some(index) = sections.iter().position(|s| s.declares_hash(hash)) else {
        return (sections, Vec::new());
    };
    if titles.is_empty() || titles.len() != hashes.len() {
        tracing::warn!("Malformed multiply rule for {}: titles and hashes differ", hash);
        return (sections, Vec::new());
    }

    let template = sections[index].clone();
    let newline = if template.name.ends_with("\r\n") { "\r\n" } else { "\n" };
    let copies: Vec<Section> = titles
        .iter()
        .zip(hashes)
        .map(|(title, new_hash)| {
            let new_hash = new_hash.to_lowercase();
            let mut copy = template.clone();
            copy.name = format!("[TextureOverride{title}]{newline}");
            for line in copy.lines.iter_mut() {
                if line.hash_value() == Some(hash) {
                    *line = hash_line_like(line, &new_hash);
                }
            }
            copy
        })
        .collect();

    let added = hashes
        .iter()
        .map(|h| h.to_lowercase())
        .filter(|h| h != hash)
        .collect();

    let mut out = Vec::with_capacity(sections.len() + copies.len());
    for (i, section) in sections.into_iter().enumerate() {
        if i == index {
            out.extend(copies.iter().cloned());
        } else {
            out.push(section);
        }
    }
    (out, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::parser::{reconstruct, split_sections};

    fn table() -> RuleTable {
        RuleTable::empty("test")
            .with_rule(
                "aaaa0001",
                vec![
                    Action::Info("v1 -> v2".to_string()),
                    Action::UpgradeHash { to: "aaaa0002".to_string() },
                ],
            )
            .with_rule("aaaa0002", vec![Action::UpgradeHash { to: "AAAA0003".to_string() }])
            .with_rule("dead0001", vec![Action::CommentOut])
    }

    #[test]
    fn test_collect_hashes_ignores_comments_and_non_hex() {
        let table = table();
        let engine = HashRuleEngine::new(&table);
        let sections = split_sections("[A]\nhash = aaaa0001\n;hash = bbbb0001\n[B]\nhash = $var\n");
        assert_eq!(engine.collect_hashes(&sections), vec!["aaaa0001".to_string()]);
    }

    #[test]
    fn test_upgrade_chain_resolves_transitively() {
        let table = table();
        let engine = HashRuleEngine::new(&table);
        let (sections, report) = engine.run(split_sections("[TextureOverrideA]\nhash = aaaa0001\n"));

        assert_eq!(
            reconstruct(&sections),
            "[TextureOverrideA]\nhash = aaaa0003\n;hash = aaaa0002\n;hash = aaaa0001\n"
        );
        assert_eq!(report.upgrades.len(), 2);
        assert_eq!(report.upgrades[1].to, "aaaa0003");
    }

    #[test]
    fn test_swap_keeps_indentation_and_adds_terminator() {
        let sections = split_sections("[A]\n\thash = abcd\n[B]\nhash = abcd");
        let (sections, count) = swap_hash(sections, "abcd", "ef01");

        assert_eq!(count, 2);
        assert_eq!(reconstruct(&sections), "[A]\n\thash = ef01\n;\thash = abcd\n[B]\nhash = ef01\n;hash = abcd");
    }

    #[test]
    fn test_comment_out_rule() {
        let table = table();
        let engine = HashRuleEngine::new(&table);
        let (sections, report) = engine.run(split_sections("[TextureOverrideExtra]\nhash = dead0001\n\n[B]\nx = 1\n"));

        assert_eq!(reconstruct(&sections), ";[TextureOverrideExtra]\n;hash = dead0001\n\n[B]\nx = 1\n");
        assert_eq!(report.commented, vec!["dead0001".to_string()]);
    }

    #[test]
    fn test_shared_hash_requires_sibling() {
        let table = RuleTable::empty("test").with_rule(
            "5a5a5a5a",
            vec![Action::UpgradeSharedHash {
                to: "6b6b6b6b".to_string(),
                required_siblings: vec!["c0c0c0c0".to_string()],
                description: "Head draw".to_string(),
            }],
        );
        let engine = HashRuleEngine::new(&table);

        let input = "[TextureOverrideHead]\nhash = 5a5a5a5a\n";
        let (sections, report) = engine.run(split_sections(input));
        assert_eq!(reconstruct(&sections), input);
        assert_eq!(report.no_upgrade, vec!["5a5a5a5a".to_string()]);

        let with_sibling = "[TextureOverrideBody]\nhash = c0c0c0c0\n[TextureOverrideHead]\nhash = 5a5a5a5a\n";
        let (sections, report) = engine.run(split_sections(with_sibling));
        assert!(reconstruct(&sections).contains("hash = 6b6b6b6b\n;hash = 5a5a5a5a\n"));
        assert!(report.no_upgrade.is_empty());
    }

    #[test]
    fn test_multiply_section_guarded_by_check() {
        let table = RuleTable::empty("test").with_rule(
            "5a3bee9a",
            vec![
                Action::CheckHashAbsent { hash: "94a5b64e".to_string() },
                Action::MultiplySection {
                    titles: vec!["FaceBlend".to_string(), "FaceBlend_Extra".to_string()],
                    hashes: vec!["5a3bee9a".to_string(), "94a5b64e".to_string()],
                },
            ],
        );
        let engine = HashRuleEngine::new(&table);

        let (sections, report) = engine.run(split_sections("[TextureOverrideFace]\nhash = 5a3bee9a\nvb2 = R\n\n"));
        let text = reconstruct(&sections);
        assert_eq!(
            text,
            "[TextureOverrideFaceBlend]\nhash = 5a3bee9a\nvb2 = R\n\n[TextureOverrideFaceBlend_Extra]\nhash = 94a5b64e\nvb2 = R\n\n"
        );
        assert_eq!(report.multiplied.len(), 1);

        let (again, report) = engine.run(split_sections(&text));
        assert_eq!(reconstruct(&again), text);
        assert!(!report.changed());
    }

    #[test]
    fn test_upgrade_else_comment() {
        let table = RuleTable::empty("test").with_rule(
            "1111aaaa",
            vec![Action::UpgradeElseComment {
                to: "2222bbbb".to_string(),
                missing: vec!["2222bbbb".to_string()],
            }],
        );
        let engine = HashRuleEngine::new(&table);

        let (sections, _) = engine.run(split_sections("[A]\nhash = 1111aaaa\n"));
        assert!(reconstruct(&sections).starts_with("[A]\nhash = 2222bbbb\n"));

        let (sections, report) = engine.run(split_sections("[A]\nhash = 1111aaaa\n[B]\nhash = 2222bbbb\n"));
        assert!(reconstruct(&sections).starts_with(";[A]\n;hash = 1111aaaa\n"));
        assert_eq!(report.commented, vec!["1111aaaa".to_string()]);
    }

    #[test]
    fn test_unsupported_actions_are_reported() {
        let table = RuleTable::empty("test").with_rule(
            "9de080b0",
            vec![Action::ConvertBufferFormat {
                operation: "convert_format".to_string(),
                format: "<BBBBeeee -> <BBBBffff".to_string(),
            }],
        );
        let engine = HashRuleEngine::new(&table);
        let input = "[A]\nhash = 9de080b0\n";
        let (sections, report) = engine.run(split_sections(input));

        assert_eq!(reconstruct(&sections), input);
        assert_eq!(report.unsupported, vec!["9de080b0:convert_buffer_format".to_string()]);
    }

    #[test]
    fn test_actions_after_upgrade_use_new_hash() {
        let table = RuleTable::empty("test").with_rule(
            "dddd0001",
            vec![
                Action::UpgradeHash { to: "dddd0002".to_string() },
                Action::ShrinkTexcoordColor { version: "1.2".to_string() },
            ],
        );
        let engine = HashRuleEngine::new(&table);
        let (sections, report) = engine.run(split_sections("[TextureOverrideHair]\nhash = dddd0001\n"));

        assert!(reconstruct(&sections).contains("hash = dddd0002\n;hash = dddd0001\n"));
        assert_eq!(report.unsupported, vec!["dddd0002:shrink_texcoord_color".to_string()]);
    }

    #[test]
    fn test_add_missing_index_buffer_section() {
        let table = RuleTable::empty("test")
            .with_rule(
                "aaaa1111",
                vec![Action::AddSectionIfMissing {
                    hashes: vec!["bbbb2222".to_string()],
                    title: "Part.IB".to_string(),
                    content: "match_priority = 0\n".to_string(),
                }],
            )
            .with_rule("bbbb2222", vec![Action::AddSkinTextureCheck]);
        let engine = HashRuleEngine::new(&table);

        let input = "[TextureOverridePartA.Diffuse]\nhash = aaaa1111\nthis = ResourceDiffuse\n";
        let (sections, report) = engine.run(split_sections(input));
        let text = reconstruct(&sections);
        assert_eq!(
            text,
            "[TextureOverridePartA.Diffuse]\nhash = aaaa1111\nthis = ResourceDiffuse\n\n\
             [TextureOverridePart.IB]\nhash = bbbb2222\nrun = CommandListSkinTexture\nmatch_priority = 0\n\n"
        );
        assert_eq!(report.added, vec!["bbbb2222".to_string()]);
        assert_eq!(report.skin_checks, vec!["bbbb2222".to_string()]);

        let (again, report) = engine.run(split_sections(&text));
        assert_eq!(reconstruct(&again), text);
        assert!(!report.changed());
    }

    #[test]
    fn test_multiply_missing_resolution_copies_body() {
        let table = RuleTable::empty("test")
            .with_rule(
                "cccc0001",
                vec![Action::MultiplySectionIfMissing {
                    hashes: vec!["cccc0002".to_string(), "cccc0003".to_string()],
                    title: "BodyA.Diffuse.2048".to_string(),
                }],
            )
            .with_rule(
                "cccc0002",
                vec![Action::MultiplySectionIfMissing {
                    hashes: vec!["cccc0001".to_string()],
                    title: "BodyA.Diffuse.1024".to_string(),
                }],
            );
        let engine = HashRuleEngine::new(&table);

        let input = "[TextureOverrideBodyA.Diffuse.1024]\nhash = cccc0001\nmatch_first_index = 0\n\
                     this = ResourceBodyDiffuse\n\n[Other]\nx = 1\n";
        let (sections, report) = engine.run(split_sections(input));
        let text = reconstruct(&sections);
        assert_eq!(
            text,
            "[TextureOverrideBodyA.Diffuse.1024]\nhash = cccc0001\nmatch_first_index = 0\n\
             this = ResourceBodyDiffuse\n\n\
             [TextureOverrideBodyA.Diffuse.2048]\nhash = cccc0002\nthis = ResourceBodyDiffuse\n\n\
             [Other]\nx = 1\n"
        );
        assert_eq!(report.multiplied, vec!["cccc0002".to_string()]);

        let (again, report) = engine.run(split_sections(&text));
        assert_eq!(reconstruct(&again), text);
        assert!(!report.changed());
    }

    #[test]
    fn test_skin_texture_check_prefers_indexed_sections() {
        let table = RuleTable::empty("test").with_rule("eeee0001", vec![Action::AddSkinTextureCheck]);
        let engine = HashRuleEngine::new(&table);

        let input = "[TextureOverrideBodyIB]\nhash = eeee0001\nhandling = skip\n\n\
                     [TextureOverrideBodyA]\nhash = eeee0001\nmatch_first_index = 0\nib = ResourceBodyAIB\n\n\
                     [TextureOverrideBodyB]\nhash = eeee0001\nmatch_first_index = 1200\n\
                     run = CommandListSkinTexture\nib = ResourceBodyBIB\n";
        let (sections, report) = engine.run(split_sections(input));

        let expected = input.replace(
            "match_first_index = 0\n",
            "match_first_index = 0\nrun = CommandListSkinTexture\n",
        );
        assert_eq!(reconstruct(&sections), expected);
        assert_eq!(report.skin_checks, vec!["eeee0001".to_string()]);
    }

    #[test]
    fn test_cycle_terminates() {
        let table = RuleTable::empty("test")
            .with_rule("a1", vec![Action::UpgradeHash { to: "b2".to_string() }])
            .with_rule("b2", vec![Action::UpgradeHash { to: "a1".to_string() }]);
        let engine = HashRuleEngine::new(&table);

        let (_, report) = engine.run(split_sections("[A]\nhash = a1\n"));
        let found = 1;
        assert!(report.iterations <= table.rules.len() + found + 1);
    }
}
