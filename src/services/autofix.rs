//! Hook for mod managers: fix a mod right after its archive was extracted.

use crate::games::GameRegistry;
use crate::models::FixSettings;
use crate::services::errors::FixError;
use crate::services::file_mutator::{BatchMode, BatchSummary, FileMutator};
use crate::services::fs::{ModFileSystem, StdFileSystem};
use camino::Utf8Path;

/// Upgrade every `.ini` below a freshly extracted mod directory.
///
/// Does nothing and returns `Ok(None)` when auto-fix is disabled in the settings.
/// The rule table is picked by `game_tag`, falling back to the configured default
/// game when the archive carried no tag.
///
/// # Arguments
/// * `dir` - Directory the mod was extracted to
/// * `game_tag` - Game tag reported by the host application, if any
/// * `settings` - `Fix_Settings` from the user config
/// * `registry` - Rule tables to choose from
pub fn on_mod_extracted(
    dir: &Utf8Path,
    game_tag: Option<&str>,
    settings: &FixSettings,
    registry: &GameRegistry,
) -> Result<Option<BatchSummary>, FixError> {
    on_mod_extracted_with(&StdFileSystem, dir, game_tag, settings, registry)
}

/// [`on_mod_extracted`] over a caller-supplied filesystem
pub fn on_mod_extracted_with(
    fs: &dyn ModFileSystem,
    dir: &Utf8Path,
    game_tag: Option<&str>,
    settings: &FixSettings,
    registry: &GameRegistry,
) -> Result<Option<BatchSummary>, FixError> {
    if !settings.auto_fix {
        tracing::debug!("Auto fix disabled, leaving {} as extracted", dir);
        return Ok(None);
    }

    let tag = game_tag
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(settings.default_game.as_str());
    let table = registry.resolve(tag)?;
    tracing::info!("Auto fixing {} with the {} table (v{})", dir, table.title, table.version);

    let mutator = FileMutator::new(fs, table, settings.fix_options());
    let summary = mutator.run(dir, BatchMode::Upgrade)?;
    mutator.metrics().log_summary();

    Ok(Some(summary))
}
