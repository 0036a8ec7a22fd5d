//! Services module - the patch engine for mod `.ini` files.
//!
//! Everything here works on text and on the [`ModFileSystem`] capability, with no
//! knowledge of the CLI or of where the settings came from.
//!
//! # Components
//!
//! - [`parser`]: splits a file into sections and rebuilds the exact text
//! - [`control_flow`]: splits a section body into its top-level `if`/`elif`/`else` branches
//! - [`HashRuleEngine`]: runs the per-game hash rules until no new hash turns up
//! - [`PositionToBlendTransform`]: turns legacy position overrides into blend overrides
//! - [`BatchedPoseFix`]: adds the compute-shader buffers used by batched posing
//! - [`FixPipeline`]: the passes above in order, plus indentation cleanup
//! - [`FileMutator`]: backup, write and restore of files and whole `Mods` trees
//! - [`autofix`]: hook run after a mod archive is extracted
//!
//! # Usage Example
//!
//! ```ignore
//! use modfix::games::GameRegistry;
//! use modfix::services::{BatchMode, FileMutator, StdFileSystem};
//!
//! let registry = GameRegistry::builtin()?;
//! let table = registry.resolve("hsr")?;
//! let mutator = FileMutator::new(&StdFileSystem, table, FixOptions::default());
//! let summary = mutator.run(Utf8Path::new("Mods/Kafka"), BatchMode::Upgrade)?;
//! ```
//!
//! Transform passes never fail the whole file: a part that cannot be patched is
//! logged, recorded in the pass report, and left as it was.

pub mod autofix;
pub mod control_flow;
pub mod errors;
pub mod file_mutator;
pub mod fs;
pub mod hash_rules;
pub mod indentation;
pub mod parser;
pub mod pipeline;
pub mod pos_to_blend;
pub mod pose_fix;

pub use autofix::{on_mod_extracted, on_mod_extracted_with};
pub use errors::{FixError, TransformError};
pub use file_mutator::{BatchMode, BatchSummary, FileMutator, RestoreOutcome, UpgradeOutcome};
pub use fs::{DirEntry, ModFileSystem, StdFileSystem};
pub use hash_rules::{HashRuleEngine, RuleReport};
pub use pipeline::{FixOutput, FixPipeline, FixReport};
pub use pos_to_blend::{PosToBlendReport, PositionToBlendTransform};
pub use pose_fix::{BatchedPoseFix, PoseFixMode, PoseFixReport};
