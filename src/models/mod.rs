//! Data models for the mod fixer.
//!
//! - [`IniLine`], [`Section`], [`ControlBlock`]: lossless model of a mod `.ini` file
//! - [`RuleTable`], [`Action`], [`HashTrio`]: static per-game upgrade tables
//! - [`ModelData`], [`Resource`], [`CommandListCandidate`]: batched pose fix bookkeeping
//! - [`UserConfig`], [`FixSettings`], [`FixOptions`]: settings loaded from `ModFix Config.yaml`
//!
//! Every structure except the settings and rule tables lives for one file only.

pub mod config;
pub mod ini;
pub mod pose;
pub mod rules;

pub use config::{FixOptions, FixSettings, UserConfig};
pub use ini::{ControlBlock, IniLine, Section};
pub use pose::{CommandListCandidate, ModelData, Resource};
pub use rules::{Action, HashTrio, PositionVariant, RuleTable};
