//! Batched pose fix.
//!
//! Blend overrides of known parts get compute-shader buffer references so the game
//! can batch pose updates. Normal mods are patched in place. Merge mods keep their
//! buffers in a CommandList, so every branch of the list gets its own references
//! and the draw override is rebuilt around the same branches.
//!
//! A file that already contains `$\SRMI\vertcount` anywhere is left alone.

use crate::models::{CommandListCandidate, IniLine, ModelData, Resource, RuleTable, Section};
use crate::services::control_flow::split_blocks;
use crate::services::errors::TransformError;
use crate::services::fs::ModFileSystem;
use crate::services::parser::{find_section, split_sections};
use camino::Utf8Path;
use std::collections::HashSet;
use std::io;

/// Key written into every patched blend override
const PATCHED_MARKER: &str = "$\\SRMI\\vertcount";

/// Bytes per vertex of a position buffer
const POSITION_STRIDE: u64 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseFixMode {
    Normal,
    Merge,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoseFixReport {
    pub mode: Option<PoseFixMode>,
    pub already_patched: bool,
    /// Headers of existing sections that were patched
    pub patched: Vec<String>,
    /// Headers of sections added to the file
    pub generated: Vec<String>,
    pub skipped: Vec<TransformError>,
}

impl PoseFixReport {
    pub fn changed(&self) -> bool {
        !self.patched.is_empty() || !self.generated.is_empty()
    }
}

/// Buffers referenced by one CommandList branch
struct BranchBuffers {
    position: String,
    blend: String,
    vertex_count: u32,
}

impl BranchBuffers {
    fn extract(lines: &[IniLine]) -> Option<Self> {
        let mut position = None;
        let mut blend = None;
        let mut vertex_count = None;
        for line in lines.iter().filter(|line| line.is_pair) {
            if line.has_key("vb0") {
                position = Some(line.trimmed_value().to_string());
            } else if line.has_key("vb2") {
                blend = Some(line.trimmed_value().to_string());
            } else if line.has_key("draw") {
                vertex_count = line.draw_vertex_count().filter(|c| *c > 0);
            }
        }
        Some(Self {
            position: position?,
            blend: blend?,
            vertex_count: vertex_count?,
        })
    }
}

/// Applies the batched pose fix to one parsed file.
pub struct BatchedPoseFix<'a> {
    table: &'a RuleTable,
    fs: &'a dyn ModFileSystem,
    /// Directory of the file, used to size raw buffers
    mod_dir: Option<&'a Utf8Path>,
}

impl<'a> BatchedPoseFix<'a> {
    pub fn new(table: &'a RuleTable, fs: &'a dyn ModFileSystem, mod_dir: Option<&'a Utf8Path>) -> Self {
        Self { table, fs, mod_dir }
    }

    pub fn apply(&self, sections: Vec<Section>) -> (Vec<Section>, PoseFixReport) {
        let mut report = PoseFixReport::default();

        if sections.iter().any(|s| s.has_key(PATCHED_MARKER)) {
            tracing::info!("File already has Batched Pose Fix applied. Skipping...");
            report.already_patched = true;
            return (sections, report);
        }

        let blend_sections: Vec<usize> = sections
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                s.lines
                    .iter()
                    .filter_map(IniLine::hash_value)
                    .any(|h| self.table.is_blend_hash(h))
            })
            .map(|(i, _)| i)
            .collect();

        if blend_sections.is_empty() {
            tracing::debug!("No blend override needs batched pose patching");
            return (sections, report);
        }

        let candidates: Vec<CommandListCandidate> = blend_sections
            .iter()
            .map(|&i| self.candidate(&sections, &sections[i]))
            .collect();

        let merge_mod = candidates.iter().all(|c| !c.has_vb0 && c.command_list.is_some());
        let sections = if merge_mod {
            report.mode = Some(PoseFixMode::Merge);
            self.apply_merge(sections, candidates, &mut report)
        } else {
            report.mode = Some(PoseFixMode::Normal);
            self.apply_normal(sections, &blend_sections, &mut report)
        };

        (sections, report)
    }

    fn candidate(&self, sections: &[Section], section: &Section) -> CommandListCandidate {
        let mut candidate = CommandListCandidate::default();
        for line in &section.lines {
            if let Some(hash) = line.hash_value() {
                if let Some((_, trio)) = self.table.trio_by_blend(hash) {
                    candidate.draw_hash = trio.draw.clone();
                    candidate.blend_hash = hash.to_string();
                }
            } else if line.is_pair && line.has_key("vb0") {
                candidate.has_vb0 = true;
            } else if line.is_pair && line.has_key("run") && line.norm_value().starts_with("commandlist") {
                candidate.command_list = find_section(sections, line.trimmed_value());
            }
        }
        candidate
    }

    fn apply_merge(
        &self,
        mut sections: Vec<Section>,
        candidates: Vec<CommandListCandidate>,
        report: &mut PoseFixReport,
    ) -> Vec<Section> {
        let mut resources = String::from("[Constants]\nglobal $_blend_\n\n");
        let mut declared: HashSet<String> = HashSet::new();
        let mut new_draw_sections: Vec<(String, Section)> = Vec::new();
        let mut patched_any = false;

        for candidate in candidates {
            let Some(list_index) = candidate.command_list else {
                continue;
            };
            let list = &sections[list_index];
            let list_title = list.title().unwrap_or_default().trim().to_string();

            let blocks = split_blocks(&list.lines);
            if blocks.len() <= 1 {
                tracing::warn!("{} doesn't have if/else blocks. Invalid merge mod, skipping...", list_title);
                report.skipped.push(TransformError::NotAMergeMod(list_title));
                continue;
            }

            let draw_name = format!("Resource{}DrawCS", candidate.draw_hash);
            let mut list_lines: Vec<IniLine> = Vec::new();
            let mut draw_branches = String::new();
            let mut position_stride = 40;
            let mut max_vertex_count = 0;

            for block in blocks {
                let condition = block.condition().map(IniLine::text);
                let Some(buffers) = BranchBuffers::extract(&block.lines) else {
                    if condition.is_some() {
                        tracing::warn!("Missing resource values in a {} branch, branch left unchanged", list_title);
                        report.skipped.push(TransformError::MissingField {
                            section: list_title.clone(),
                            field: "vb0/vb2/draw",
                        });
                    }
                    list_lines.extend(block.lines);
                    continue;
                };

                max_vertex_count = max_vertex_count.max(buffers.vertex_count);
                let mut lines = block.lines;
                append_text(
                    &mut lines,
                    &format!(
                        "    if DRAW_TYPE == 8\n        \
                         Resource\\SRMI\\PositionBuffer = ref {}CS\n        \
                         Resource\\SRMI\\BlendBuffer = ref {}CS\n        \
                         $\\SRMI\\vertcount = {}\n    \
                         endif\n",
                        buffers.position, buffers.blend, buffers.vertex_count
                    ),
                );
                list_lines.extend(lines);

                let position = resource_named(&sections, &buffers.position);
                let blend = resource_named(&sections, &buffers.blend);
                let (position, blend) = match (position, blend) {
                    (Ok(position), Ok(blend)) => (position, blend),
                    (Err(err), _) | (_, Err(err)) => {
                        tracing::warn!("Missing resource sections for {}: {}", list_title, err);
                        report.skipped.push(err);
                        continue;
                    }
                };
                position_stride = position.stride;
                for view in [position.structured_view(), blend.structured_view()] {
                    if declared.insert(view.name.to_lowercase()) && find_section(&sections, &view.name).is_none() {
                        resources.push_str(&view.declaration());
                        resources.push('\n');
                    }
                }

                if let Some(condition) = condition {
                    draw_branches.push_str(condition.trim_end());
                    draw_branches.push('\n');
                    draw_branches.push_str(&draw_guard(&draw_name));
                }
            }

            if max_vertex_count == 0 {
                tracing::warn!("No branch of {} references pose buffers, skipping...", list_title);
                continue;
            }

            if declared.insert(draw_name.to_lowercase()) {
                resources.push_str(&draw_buffer_declaration(&draw_name, max_vertex_count));
                resources.push('\n');
            }

            let mut list = Section::new(sections[list_index].name.clone());
            list.lines = list_lines;
            list.ensure_trailing_newline();
            list.trim_trailing_blank();
            list.lines.push(IniLine::blank());
            tracing::info!("Patched {} with Batched Pose Fix", list.display_name());
            report.patched.push(list.display_name().to_string());
            sections[list_index] = list;

            let mut draw_body = format!(
                "hash = {}\noverride_vertex_count = {}\noverride_byte_stride = {}\n{}",
                candidate.draw_hash, max_vertex_count, position_stride, draw_branches
            );
            if draw_branches.trim_start().starts_with("if") {
                draw_body.push_str("endif\n");
            }

            match sections.iter().position(|s| s.declares_hash(&candidate.draw_hash)) {
                Some(index) => {
                    sections[index].replace_body(&draw_body);
                    tracing::info!("Patched {} draw override with Batched Pose Fix", sections[index].display_name());
                    report.patched.push(sections[index].display_name().to_string());
                }
                None => {
                    let mut draw = Section::new(format!("[TextureOverride{}Draw]\n", candidate.draw_hash));
                    draw.replace_body(&draw_body);
                    tracing::info!("Generated {} with Batched Pose Fix applied", draw.display_name());
                    report.generated.push(draw.display_name().to_string());
                    new_draw_sections.push((candidate.blend_hash.clone(), draw));
                }
            }

            if let Some(index) = sections.iter().position(|s| s.declares_hash(&candidate.blend_hash)) {
                let run_target = list_title.to_lowercase();
                let rest: String = sections[index]
                    .lines
                    .iter()
                    .filter(|line| line.hash_value() != Some(candidate.blend_hash.as_str()))
                    .filter(|line| !(line.is_pair && line.has_key("run") && line.norm_value() == run_target))
                    .map(IniLine::text)
                    .collect();
                let body = format!(
                    "hash = {blend}\n\
                     run = {list}\n\
                     {draw} = copy {draw}\n\
                     if DRAW_TYPE == 8\n    \
                     Resource\\SRMI\\DrawBuffer = ref {draw}\n\
                     elif DRAW_TYPE != 1\n    \
                     $_blend_ = 2\n\
                     endif\n\
                     {rest}",
                    blend = candidate.blend_hash,
                    list = list_title,
                    draw = draw_name,
                );
                sections[index].replace_body(&body);
                tracing::info!(
                    "Patched {} with hash {} with Batched Pose Fix",
                    sections[index].display_name(),
                    candidate.blend_hash
                );
                report.patched.push(sections[index].display_name().to_string());
            }

            patched_any = true;
        }

        for (blend_hash, draw) in new_draw_sections {
            let at = sections
                .iter()
                .position(|s| s.declares_hash(&blend_hash))
                .map_or(sections.len(), |i| i + 1);
            sections.insert(at, draw);
        }

        if patched_any {
            report.generated.extend(append_generated(&mut sections, &resources));
        }
        sections
    }

    fn apply_normal(&self, mut sections: Vec<Section>, blend_sections: &[usize], report: &mut PoseFixReport) -> Vec<Section> {
        let mut models = Vec::new();
        for &index in blend_sections {
            match self.gather_model(&sections, &sections[index]) {
                Ok(model) => models.push(model),
                Err(err) => {
                    tracing::warn!("{}: {}. Skipping part...", sections[index].display_name(), err);
                    report.skipped.push(err);
                }
            }
        }

        check_consumed(&sections, &mut models);

        for section in sections.iter_mut() {
            if !section.title_starts_with("textureoverride") {
                continue;
            }
            let Some(hash) = section.hash().map(str::to_string) else {
                continue;
            };
            let stride = section
                .value_of("override_byte_stride")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(40);

            for model in models.iter_mut().filter(|m| !m.fully_consumed()) {
                let draw_name = model.draw_resource_name();

                if model.ref_blend_hash == hash && !model.blend_consumed {
                    section.push_text(&format!(
                        "{draw} = copy {draw}\n\
                         if DRAW_TYPE == 8\n    \
                         Resource\\SRMI\\PositionBuffer = ref {pos}\n    \
                         Resource\\SRMI\\BlendBuffer = ref {blend}\n    \
                         Resource\\SRMI\\DrawBuffer = ref {draw}\n    \
                         $\\SRMI\\vertcount = {count}\n\
                         elif DRAW_TYPE != 1\n    \
                         $_blend_ = 2\n\
                         endif\n",
                        draw = draw_name,
                        pos = model.pos_resource.name,
                        blend = model.blend_resource.name,
                        count = model.vertex_count,
                    ));
                    tracing::info!("{} Batched Pose Fix applied to blend override", section.display_name());
                    report.patched.push(section.display_name().to_string());
                    model.blend_consumed = true;
                } else if model.ref_draw_hash == hash && !model.draw_consumed {
                    if stride == 1 {
                        match self.vertex_count_from_file(&model.pos_resource.filename) {
                            Ok(count) => model.vertex_count = count,
                            Err(err) => {
                                tracing::warn!(
                                    "Missing position buffer {} for {}: {}. Skipping...",
                                    model.pos_resource.filename,
                                    section.display_name(),
                                    err
                                );
                                report.skipped.push(TransformError::MissingField {
                                    section: section.display_name().to_string(),
                                    field: "position buffer file",
                                });
                                continue;
                            }
                        }
                    }

                    section.lines.retain(|line| {
                        !(line.is_pair && (line.has_key("override_byte_stride") || line.has_key("override_vertex_count")))
                    });
                    section.push_text(&format!(
                        "override_vertex_count = {}\noverride_byte_stride = {}\n{}",
                        model.vertex_count,
                        stride,
                        draw_guard(&draw_name)
                    ));
                    tracing::info!("{} Batched Pose Fix applied to draw override", section.display_name());
                    report.patched.push(section.display_name().to_string());
                    model.draw_consumed = true;
                }
            }
        }

        let mut resources = String::new();
        for model in models.iter_mut().filter(|m| !m.res_consumed) {
            resources.push_str(&draw_buffer_declaration(&model.draw_resource_name(), model.vertex_count));
            resources.push('\n');
            resources.push_str(&model.pos_resource.declaration());
            resources.push('\n');
            resources.push_str(&model.blend_resource.declaration());
            resources.push('\n');
            model.res_consumed = true;
        }

        if !resources.is_empty() {
            tracing::info!("Resource sections added for Batched Pose Fix");
            let text = format!(
                "[Constants]\nglobal $_blend_ = 0\n\n\
                 ; -------------------- Auto-generated CS resources --------------------\n\n\
                 {resources}"
            );
            report.generated.extend(append_generated(&mut sections, &text));
        }

        sections
    }

    fn gather_model(&self, sections: &[Section], section: &Section) -> Result<ModelData, TransformError> {
        let header = section.display_name().to_string();
        let missing = |field| TransformError::MissingField {
            section: header.clone(),
            field,
        };

        let blend_hash = section
            .lines
            .iter()
            .filter_map(IniLine::hash_value)
            .find(|h| self.table.is_blend_hash(h))
            .ok_or_else(|| missing("hash"))?;
        let position_ref = section.value_of("vb0").ok_or_else(|| missing("vb0"))?;
        let blend_ref = section.value_of("vb2").ok_or_else(|| missing("vb2"))?;
        let vertex_count = section
            .lines_with_key("draw")
            .find_map(IniLine::draw_vertex_count)
            .unwrap_or(1);

        let position = resource_named(sections, position_ref)?;
        let blend = resource_named(sections, blend_ref)?;
        let (part, trio) = self.table.trio_by_blend(blend_hash).ok_or_else(|| missing("known blend hash"))?;

        Ok(ModelData::new(
            part,
            blend.structured_view(),
            position.structured_view(),
            trio.draw.clone(),
            blend_hash,
            vertex_count,
        ))
    }

    /// Vertex count of a legacy layout, derived from the position buffer size.
    fn vertex_count_from_file(&self, filename: &str) -> io::Result<u32> {
        let dir = self
            .mod_dir
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "mod directory unknown"))?;
        let path = dir.join(filename.replace('\\', "/"));
        let len = self.fs.file_len(&path)?;
        Ok(u32::try_from(len.div_ceil(POSITION_STRIDE)).unwrap_or(u32::MAX))
    }
}

/// Mark models whose blend, draw or resource parts were patched by an earlier run.
fn check_consumed(sections: &[Section], models: &mut [ModelData]) {
    for model in models.iter_mut() {
        if sections
            .iter()
            .any(|s| s.declares_hash(&model.ref_blend_hash) && s.has_key(PATCHED_MARKER))
        {
            tracing::info!("Blend override {} already patched. Skipping...", model.ref_blend_hash);
            model.blend_consumed = true;
        }

        let draw_patched = sections.iter().any(|s| {
            s.declares_hash(&model.ref_draw_hash)
                && s.lines.iter().any(|line| {
                    line.norm_key().contains("draw_type != 8") && line.norm_key().contains("draw_type != 1")
                })
        });
        if draw_patched {
            tracing::info!("Draw override {} already patched. Skipping...", model.ref_draw_hash);
            model.draw_consumed = true;
        }

        if find_section(sections, &model.pos_resource.name).is_some() {
            tracing::info!("{} already exists. Skipping resource creation...", model.pos_resource.name);
            model.res_consumed = true;
        }
    }
}

/// The single resource section titled `name`.
fn resource_named(sections: &[Section], name: &str) -> Result<Resource, TransformError> {
    let mut matches = sections.iter().filter(|s| s.has_title(name));
    let section = matches
        .next()
        .ok_or_else(|| TransformError::MissingSection(name.to_string()))?;
    if matches.next().is_some() {
        return Err(TransformError::AmbiguousSection(name.to_string()));
    }

    Ok(Resource::new(
        section.title().unwrap_or(name).trim(),
        section.value_of("type").unwrap_or("Buffer"),
        section.value_of("filename").unwrap_or_default(),
        section.value_of("stride").and_then(|v| v.parse().ok()).unwrap_or(0),
    ))
}

fn draw_guard(draw_name: &str) -> String {
    format!(
        "if DRAW_TYPE != 8 && DRAW_TYPE != 1 && $_blend_ > 0\n    \
         $_blend_ = $_blend_ - 1\n    \
         this = ref {draw_name}\n\
         endif\n"
    )
}

fn draw_buffer_declaration(name: &str, vertex_count: u32) -> String {
    format!(
        "[{name}]\ntype = RWStructuredBuffer\narray = {vertex_count}\ndata = R32_FLOAT 1 2 3 4 5 6 7 8 9 10\n"
    )
}

/// Append text lines to a branch, after its trailing blank lines are dropped.
fn append_text(lines: &mut Vec<IniLine>, text: &str) {
    while lines.last().is_some_and(IniLine::is_blank) {
        lines.pop();
    }
    if let Some(last) = lines.last_mut() {
        if !last.text().ends_with('\n') {
            if last.is_pair {
                let value = format!("{}\n", last.value);
                last.set_value(value);
            } else {
                let key = format!("{}\n", last.key);
                last.set_key(key);
            }
        }
    }
    lines.extend(text.lines().map(|raw| IniLine::parse(&format!("{raw}\n"))));
}

/// Parse generated text and append its sections, each followed by one blank line.
/// Returns the headers that were added.
fn append_generated(sections: &mut Vec<Section>, text: &str) -> Vec<String> {
    if let Some(last) = sections.last_mut() {
        last.ensure_trailing_newline();
        last.trim_trailing_blank();
        last.lines.push(IniLine::blank());
    }

    let mut added = Vec::new();
    for mut section in split_sections(text) {
        if section.is_preamble && section.lines.iter().all(IniLine::is_blank) {
            continue;
        }
        section.trim_trailing_blank();
        section.lines.push(IniLine::blank());
        added.push(section.display_name().to_string());
        sections.push(section);
    }
    added
}
