use crate::models::{FixOptions, RuleTable};
use crate::services::fs::ModFileSystem;
use crate::services::hash_rules::{HashRuleEngine, RuleReport};
use crate::services::indentation::normalize_indentation;
use crate::services::parser::{reconstruct, split_sections};
use crate::services::pos_to_blend::{PosToBlendReport, PositionToBlendTransform};
use crate::services::pose_fix::{BatchedPoseFix, PoseFixReport};
use camino::Utf8Path;

/// What each pass did to one file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixReport {
    pub rules: RuleReport,
    pub pos_to_blend: PosToBlendReport,
    /// `None` when the pose fix was skipped by configuration
    pub pose_fix: Option<PoseFixReport>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutput {
    pub text: String,
    /// Output differs from the input
    pub changed: bool,
    pub report: FixReport,
}

/// Runs every pass over the text of one file.
///
/// Hash rules first, then the position to blend conversion, then the batched pose
/// fix. Indentation is normalized only when one of them changed something, so an
/// untouched file comes back byte-identical.
pub struct FixPipeline<'a> {
    table: &'a RuleTable,
    fs: &'a dyn ModFileSystem,
    options: FixOptions,
}

impl<'a> FixPipeline<'a> {
    pub fn new(table: &'a RuleTable, fs: &'a dyn ModFileSystem, options: FixOptions) -> Self {
        Self { table, fs, options }
    }

    /// Fix one file's text. `mod_dir` is the directory holding the file; it is only
    /// needed to size raw buffers for the pose fix.
    pub fn run(&self, content: &str, mod_dir: Option<&Utf8Path>) -> FixOutput {
        let sections = split_sections(content);

        let (sections, rules) = HashRuleEngine::new(self.table).run(sections);
        let (sections, pos_to_blend) = PositionToBlendTransform::new(self.table).apply(sections);

        let (sections, pose_fix) = if self.options.skip_batched_pose {
            tracing::debug!("Skipping Batched Pose Fix");
            (sections, None)
        } else {
            let (sections, report) = BatchedPoseFix::new(self.table, self.fs, mod_dir).apply(sections);
            (sections, Some(report))
        };

        let mut text = reconstruct(&sections);
        let changed = text != content;
        if changed && self.options.normalize_indentation {
            text = normalize_indentation(&text);
        }

        FixOutput {
            text,
            changed,
            report: FixReport {
                rules,
                pos_to_blend,
                pose_fix,
            },
        }
    }
}
