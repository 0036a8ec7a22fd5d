use serde::{Deserialize, Serialize};

/// User configuration from `ModFix Config.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(rename = "Fix_Settings", default)]
    pub fix_settings: FixSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixSettings {
    /// Run the fixer on every freshly extracted mod
    #[serde(rename = "Auto Fix", default)]
    pub auto_fix: bool,

    #[serde(rename = "Skip Batched Pose", default)]
    pub skip_batched_pose: bool,

    #[serde(rename = "Recursive", default = "default_true")]
    pub recursive: bool,

    /// Require the `Mods` folder / sibling `Core` layout for directory runs
    #[serde(rename = "Check Directory", default = "default_true")]
    pub check_directory: bool,

    #[serde(rename = "Normalize Indentation", default = "default_true")]
    pub normalize_indentation: bool,

    #[serde(rename = "Default Game", default = "default_game")]
    pub default_game: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for FixSettings {
    fn default() -> Self {
        Self {
            auto_fix: false,
            skip_batched_pose: false,
            recursive: true,
            check_directory: true,
            normalize_indentation: true,
            default_game: default_game(),
            debug_mode: false,
        }
    }
}

impl FixSettings {
    /// Pipeline switches derived from the settings
    pub fn fix_options(&self) -> FixOptions {
        FixOptions {
            skip_batched_pose: self.skip_batched_pose,
            recursive: self.recursive,
            check_directory: self.check_directory,
            normalize_indentation: self.normalize_indentation,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_game() -> String {
    "hsr".to_string()
}

/// Switches for one fixer invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    pub skip_batched_pose: bool,
    pub recursive: bool,
    pub check_directory: bool,
    pub normalize_indentation: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        FixSettings::default().fix_options()
    }
}
