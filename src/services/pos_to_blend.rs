//! Converts legacy position overrides into blend overrides.
//!
//! A `[TextureOverride...Position]` section hooking the position hash of a known
//! part is rewritten to hook the part's blend hash instead, with the position
//! buffer and draw call guarded by `if DRAW_TYPE == 1`. Merge mods keep their
//! buffers inside a CommandList; there every branch of the list is rewritten.

use crate::models::{ControlBlock, IniLine, RuleTable, Section};
use crate::services::control_flow::{join_blocks, split_blocks};
use crate::services::errors::TransformError;
use crate::services::parser::find_section;

/// Key of the guard line every converted override carries
const CONVERTED_MARKER: &str = "if draw_type == 1";

/// Outcome of one pass over a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PosToBlendReport {
    /// `(old header, new header)` of converted sections
    pub converted: Vec<(String, String)>,
    /// Position overrides disabled because the blend override already exists
    pub commented: Vec<String>,
    /// CommandLists whose branches were rewritten
    pub command_lists: Vec<String>,
    /// Parts left unmodified
    pub skipped: Vec<TransformError>,
}

impl PosToBlendReport {
    pub fn changed(&self) -> bool {
        !self.converted.is_empty() || !self.commented.is_empty()
    }
}

/// Buffers pulled out of a position override or CommandList branch
#[derive(Debug, Default)]
struct DrawParts {
    position: Option<String>,
    blend: Option<String>,
    vertex_count: Option<u32>,
    command_list: Option<String>,
    rest: Vec<IniLine>,
}

impl DrawParts {
    fn extract<'l>(lines: impl IntoIterator<Item = &'l IniLine>) -> Self {
        let mut parts = DrawParts::default();
        for line in lines {
            if line.has_key("handling") || line.has_key("hash") {
                continue;
            }
            if line.is_pair && line.has_key("vb0") {
                parts.position = Some(line.trimmed_value().to_string());
            } else if line.is_pair && line.has_key("vb2") {
                parts.blend = Some(line.trimmed_value().to_string());
            } else if line.is_pair && line.has_key("draw") {
                if let Some(count) = line.draw_vertex_count().filter(|c| *c > 0) {
                    parts.vertex_count = Some(count);
                }
            } else if line.is_pair && line.has_key("run") && line.norm_value().starts_with("commandlist") {
                parts.command_list = Some(line.trimmed_value().to_string());
            } else {
                parts.rest.push(line.clone());
            }
        }
        parts
    }

    /// Guarded draw body, or the name of the first missing field.
    fn guarded_body(&self) -> Result<String, &'static str> {
        let blend = self.blend.as_deref().ok_or("vb2")?;
        let position = self.position.as_deref().ok_or("vb0")?;
        let vertex_count = self.vertex_count.ok_or("draw")?;

        let mut rest: String = self.rest.iter().map(IniLine::text).collect();
        if !rest.is_empty() && !rest.ends_with('\n') {
            rest.push('\n');
        }

        Ok(format!(
            "handling = skip\n\
             vb2 = {blend}\n\
             if DRAW_TYPE == 1\n    \
             vb0 = {position}\n    \
             draw = {vertex_count}, 0\n\
             endif\n\
             {rest}"
        ))
    }
}

/// Rewrites position overrides using a game's hash trios.
pub struct PositionToBlendTransform<'a> {
    table: &'a RuleTable,
}

impl<'a> PositionToBlendTransform<'a> {
    pub fn new(table: &'a RuleTable) -> Self {
        Self { table }
    }

    /// Convert every position override of the file.
    pub fn apply(&self, sections: Vec<Section>) -> (Vec<Section>, PosToBlendReport) {
        let mut sections = sections;
        let mut report = PosToBlendReport::default();
        let mut in_merge_mod = false;

        for index in 0..sections.len() {
            let section = &sections[index];
            if !section.title_starts_with("textureoverride") {
                continue;
            }
            let Some(hash) = section.hash().map(str::to_string) else {
                continue;
            };
            if self.table.trio_by_position(&hash).is_none() {
                continue;
            }
            if is_converted(&section.lines) {
                tracing::debug!("{} is already a blend override", section.display_name());
                continue;
            }

            let header = section.display_name().to_string();
            if self.table.shared_positions.contains_key(&hash) {
                tracing::warn!("{} uses a position hash shared by several parts, please verify the result", header);
            }
            let Some(blend_hash) = self.table.blend_for_position(&hash, &section.name) else {
                tracing::warn!("{}: could not tell which part this is. Skipping part...", header);
                report.skipped.push(TransformError::MissingField {
                    section: header,
                    field: "part keyword",
                });
                continue;
            };

            let duplicate = sections
                .iter()
                .enumerate()
                .any(|(other, s)| other != index && s.declares_hash(&blend_hash));
            if duplicate {
                tracing::warn!(
                    "{} already has a blend override, commenting out this section. Skipping part...",
                    header
                );
                let mut disabled = sections[index].clone();
                disabled.comment_out();
                sections[index] = disabled;
                report.commented.push(header);
                continue;
            }

            let parts = DrawParts::extract(&sections[index].lines);

            if let Some(command_list) = parts.command_list.as_deref() {
                tracing::info!("Found {} in {}, checking for a merge mod", command_list, header);
                match self.convert_command_list(&sections, command_list) {
                    Ok((list_index, list)) => {
                        sections[list_index] = list;
                        let parent = retarget(&sections[index], &blend_hash);
                        report.converted.push((header, parent.display_name().to_string()));
                        report.command_lists.push(command_list.to_string());
                        sections[index] = parent;
                        in_merge_mod = true;
                        tracing::info!("Patched {} with blend hash {}", command_list, blend_hash);
                    }
                    Err(err) => {
                        tracing::warn!("{} doesn't have a valid format: {}. Skipping...", header, err);
                        report.skipped.push(err);
                    }
                }
                continue;
            }

            if in_merge_mod {
                tracing::warn!("{} is in a merge mod but has no CommandList. Skipping part...", header);
                report.skipped.push(TransformError::MissingField {
                    section: header,
                    field: "run = CommandList",
                });
                continue;
            }

            match parts.guarded_body() {
                Ok(body) => {
                    let mut converted = Section::new(sections[index].name.replacen("Position", "Blend", 1));
                    converted.replace_body(&format!("hash = {blend_hash}\n{body}"));
                    tracing::info!(
                        "Patched {}({}) -> {}({})",
                        header,
                        hash,
                        converted.display_name(),
                        blend_hash
                    );
                    report.converted.push((header, converted.display_name().to_string()));
                    sections[index] = converted;
                }
                Err(field) => {
                    tracing::warn!("Missing {} in {}. Skipping part...", field, header);
                    report.skipped.push(TransformError::MissingField { section: header, field });
                }
            }
        }

        (sections, report)
    }

    /// Rewrite each branch of a merge-mod CommandList. Returns the index of the list
    /// and its replacement.
    fn convert_command_list(&self, sections: &[Section], name: &str) -> Result<(usize, Section), TransformError> {
        let index = find_section(sections, name).ok_or_else(|| TransformError::MissingSection(name.to_string()))?;
        let list = &sections[index];

        let blocks = split_blocks(&list.lines);
        if blocks.len() <= 1 {
            return Err(TransformError::NotAMergeMod(name.to_string()));
        }

        let mut patched = 0;
        let blocks: Vec<ControlBlock> = blocks
            .into_iter()
            .map(|block| {
                let Some(condition) = block.condition() else {
                    return block;
                };
                if is_converted(&block.lines[1..]) {
                    return block;
                }
                let parts = DrawParts::extract(&block.lines[1..]);
                match parts.guarded_body() {
                    Ok(body) => {
                        patched += 1;
                        let text = format!("{}\n{}", condition.text().trim(), body);
                        let mut lines: Vec<IniLine> =
                            text.lines().map(|raw| IniLine::parse(&format!("{raw}\n"))).collect();
                        while lines.last().is_some_and(IniLine::is_blank) {
                            lines.pop();
                        }
                        ControlBlock::new(lines)
                    }
                    Err(field) => {
                        tracing::warn!(
                            "Missing {} in a {} branch, branch left unchanged",
                            field,
                            name
                        );
                        block
                    }
                }
            })
            .collect();

        if patched == 0 {
            return Err(TransformError::MissingField {
                section: name.to_string(),
                field: "vb0/vb2/draw",
            });
        }

        let mut rewritten = Section::new(list.name.clone());
        rewritten.lines = join_blocks(blocks);
        rewritten.ensure_trailing_newline();
        rewritten.trim_trailing_blank();
        rewritten.lines.push(IniLine::blank());
        Ok((index, rewritten))
    }
}

fn is_converted(lines: &[IniLine]) -> bool {
    lines.iter().any(|line| line.key_starts_with(CONVERTED_MARKER))
}

/// Merge-mod parent override pointed at the blend hash.
fn retarget(section: &Section, blend_hash: &str) -> Section {
    let mut parent = section.clone();
    parent.name = parent.name.replacen("Position", "Blend", 1);
    for line in parent.lines.iter_mut().filter(|line| line.hash_value().is_some()) {
        let newline = if line.value.ends_with("\r\n") { "\r\n" } else { "\n" };
        line.set_value(format!(" {blend_hash}{newline}"));
    }
    parent
}
