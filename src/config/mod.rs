use crate::models::{RuleTable, UserConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Configuration manager for the fixer's YAML files.
///
/// Manages:
/// - User config (`ModFix Config.yaml`): the `Fix_Settings` block
/// - Extra rule tables (`rules/*.yaml`): tables added on top of the embedded ones
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
    rules_dir: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "ModFix Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join("ModFix Config.yaml"),
            rules_dir: config_dir.join("rules"),
            config_dir,
        })
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Load every `*.yaml` table from the `rules` folder, sorted by file name.
    ///
    /// A missing folder is not an error. A table that fails to parse is.
    pub fn load_rule_tables(&self) -> Result<Vec<RuleTable>> {
        if !self.rules_dir.is_dir() {
            tracing::debug!("No extra rule tables in {}", self.rules_dir);
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        for entry in self
            .rules_dir
            .read_dir_utf8()
            .with_context(|| format!("Failed to read rules directory: {}", self.rules_dir))?
        {
            let entry = entry
                .with_context(|| format!("Failed to read rules directory: {}", self.rules_dir))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("yaml")) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();

        let mut tables = Vec::with_capacity(paths.len());
        for path in paths {
            let file_contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read rule table: {}", path))?;
            let table = RuleTable::from_yaml(&file_contents)
                .with_context(|| format!("Failed to parse rule table: {}", path))?;

            tracing::info!(
                "Loaded rule table {} v{} from {}",
                table.game,
                table.version,
                path
            );
            tables.push(table);
        }

        Ok(tables)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn rules_dir(&self) -> &Utf8Path {
        &self.rules_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let manager = ConfigManager::new(&config_path).unwrap();
        (manager, temp_dir)
    }

    #[test]
    fn test_missing_user_config_gives_defaults() {
        let (manager, _temp_dir) = create_test_config_manager();
        let config = manager.load_user_config().unwrap();
        assert!(!config.fix_settings.auto_fix);
        assert_eq!(config.fix_settings.default_game, "hsr");
    }

    #[test]
    fn test_load_save_user_config() {
        let (manager, _temp_dir) = create_test_config_manager();

        let mut config = UserConfig::default();
        config.fix_settings.auto_fix = true;
        config.fix_settings.default_game = "zzz".to_string();
        manager.save_user_config(&config).unwrap();

        let loaded = manager.load_user_config().unwrap();
        assert!(loaded.fix_settings.auto_fix);
        assert_eq!(loaded.fix_settings.default_game, "zzz");
    }

    #[test]
    fn test_no_rules_dir_gives_no_tables() {
        let (manager, _temp_dir) = create_test_config_manager();
        assert!(manager.load_rule_tables().unwrap().is_empty());
    }

    #[test]
    fn test_load_rule_tables() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::create_dir_all(manager.rules_dir()).unwrap();
        fs::write(
            manager.rules_dir().join("gi.yaml"),
            "game: gi\ntitle: Genshin Impact\nversion: \"5.0\"\nrules:\n  \"aaaa0001\":\n    - upgrade_hash: { to: \"bbbb0002\" }\n",
        )
        .unwrap();
        fs::write(manager.rules_dir().join("notes.txt"), "not a table").unwrap();

        let tables = manager.load_rule_tables().unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].game, "gi");
        assert!(tables[0].actions_for("aaaa0001").is_some());
    }

    #[test]
    fn test_broken_rule_table_is_an_error() {
        let (manager, _temp_dir) = create_test_config_manager();
        fs::create_dir_all(manager.rules_dir()).unwrap();
        fs::write(manager.rules_dir().join("broken.yaml"), "game: [").unwrap();

        let err = manager.load_rule_tables().unwrap_err();
        assert!(err.to_string().contains("Failed to parse rule table"));
    }
}
