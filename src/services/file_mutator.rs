//! Applies the fix pipeline to files on disk.
//!
//! The original file is always renamed to a `DISABLED_BACKUP_<unixtime>.<name>.ini`
//! backup before the fixed text is written, so every rewrite can be undone with
//! [`FileMutator::restore`].

use crate::metrics::FixMetrics;
use crate::models::{FixOptions, RuleTable};
use crate::services::errors::FixError;
use crate::services::fs::ModFileSystem;
use crate::services::pipeline::FixPipeline;
use camino::{Utf8Path, Utf8PathBuf};
use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Prefix of every backup file
pub const BACKUP_PREFIX: &str = "DISABLED_BACKUP_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Upgrade,
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Upgraded { backup: Utf8PathBuf },
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored { backup: Utf8PathBuf },
    NoBackup,
}

impl fmt::Display for RestoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreOutcome::Restored { backup } => write!(f, "restored from {}", backup),
            RestoreOutcome::NoBackup => write!(f, "no backup found"),
        }
    }
}

/// Per-file results of a file or directory run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub upgraded: Vec<Utf8PathBuf>,
    pub unchanged: usize,
    pub restored: Vec<Utf8PathBuf>,
    pub missing_backup: usize,
    /// Failed files with the error message
    pub failed: Vec<(Utf8PathBuf, String)>,
}

impl BatchSummary {
    pub fn files_seen(&self) -> usize {
        self.upgraded.len() + self.unchanged + self.restored.len() + self.missing_backup + self.failed.len()
    }
}

/// Reads, fixes, backs up and writes mod files.
pub struct FileMutator<'a> {
    fs: &'a dyn ModFileSystem,
    table: &'a RuleTable,
    options: FixOptions,
    metrics: FixMetrics,
}

impl<'a> FileMutator<'a> {
    pub fn new(fs: &'a dyn ModFileSystem, table: &'a RuleTable, options: FixOptions) -> Self {
        Self {
            fs,
            table,
            options,
            metrics: FixMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &FixMetrics {
        &self.metrics
    }

    /// Upgrade or restore a single `.ini` file or every `.ini` file below a directory.
    ///
    /// Directory upgrades check the `Mods`/`Core` layout first unless disabled in
    /// the options. Failures of individual files inside a directory are collected in
    /// the summary; a failing single file is returned as an error.
    pub fn run(&self, path: &Utf8Path, mode: BatchMode) -> Result<BatchSummary, FixError> {
        // Restoring a single file only needs its backup
        let single_restore = mode == BatchMode::Restore && is_ini(path);
        if !single_restore && !self.fs.exists(path) {
            return Err(FixError::PathNotFound(path.to_path_buf()));
        }

        if self.fs.is_dir(path) {
            if mode == BatchMode::Upgrade && self.options.check_directory {
                check_mods_layout(self.fs, path)?;
            }
            return self.process_directory(path, mode);
        }

        if !is_ini(path) {
            return Err(FixError::NotAnIniFile(path.to_path_buf()));
        }

        let mut summary = BatchSummary::default();
        match mode {
            BatchMode::Upgrade => match self.upgrade(path)? {
                UpgradeOutcome::Upgraded { .. } => summary.upgraded.push(path.to_path_buf()),
                UpgradeOutcome::Unchanged => summary.unchanged += 1,
            },
            BatchMode::Restore => match self.restore(path)? {
                RestoreOutcome::Restored { .. } => summary.restored.push(path.to_path_buf()),
                RestoreOutcome::NoBackup => summary.missing_backup += 1,
            },
        }
        Ok(summary)
    }

    /// Fix one file. The file is only touched when the pipeline changed its text.
    pub fn upgrade(&self, path: &Utf8Path) -> Result<UpgradeOutcome, FixError> {
        match self.try_upgrade(path) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::error!("Error occurred: {}", err);
                tracing::error!("No changes have been applied to {}!", path);
                self.metrics.record_failed();
                Err(err)
            }
        }
    }

    fn try_upgrade(&self, path: &Utf8Path) -> Result<UpgradeOutcome, FixError> {
        if !self.fs.is_file(path) {
            return Err(FixError::PathNotFound(path.to_path_buf()));
        }

        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| FixError::UnsupportedFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        tracing::info!("Fixing {}", path);
        let start = Instant::now();
        let output = FixPipeline::new(self.table, self.fs, self.options).run(&content, path.parent());
        self.metrics.record_fix_time(start.elapsed());

        if !output.changed {
            tracing::info!("No changes applied to {}", path);
            self.metrics.record_unchanged();
            return Ok(UpgradeOutcome::Unchanged);
        }

        let backup = self.backup_path(path)?;
        self.fs.rename(path, &backup).map_err(|e| FixError::io(path, e))?;
        tracing::info!("Created backup {}", backup);

        self.fs.write(path, &output.text).map_err(|e| FixError::io(path, e))?;
        tracing::info!("Updates applied to {}", path);
        self.metrics.record_upgraded();

        Ok(UpgradeOutcome::Upgraded { backup })
    }

    /// Put the newest backup of `path` back in place. A missing backup is reported,
    /// not treated as an error.
    pub fn restore(&self, path: &Utf8Path) -> Result<RestoreOutcome, FixError> {
        let (dir, stem) = split_path(path)?;
        let entries = self.fs.list_dir(&dir).map_err(|e| FixError::io(dir.clone(), e))?;

        let newest = entries
            .into_iter()
            .filter(|entry| entry.is_file && is_backup_of(&entry.name, &stem))
            .map(|entry| {
                let modified = self.fs.modified(&entry.path).unwrap_or(UNIX_EPOCH);
                (modified, entry.path)
            })
            .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let Some((_, backup)) = newest else {
            tracing::info!("No backup found for {}. Skipping...", path);
            self.metrics.record_missing_backup();
            return Ok(RestoreOutcome::NoBackup);
        };

        if self.fs.exists(path) {
            self.fs.remove_file(path).map_err(|e| FixError::io(path, e))?;
            tracing::info!("Removed {}", path);
        }
        self.fs.rename(&backup, path).map_err(|e| FixError::io(backup.clone(), e))?;
        tracing::info!("Restored {} from {}", path, backup);
        self.metrics.record_restored();

        Ok(RestoreOutcome::Restored { backup })
    }

    /// Walk a directory and upgrade or restore every `.ini` file in it.
    ///
    /// Entries whose name contains `DESKTOP` and `.ini` files starting with
    /// `DISABLED` are skipped. Subdirectories are walked when the options say so.
    pub fn process_directory(&self, dir: &Utf8Path, mode: BatchMode) -> Result<BatchSummary, FixError> {
        if !self.fs.exists(dir) {
            return Err(FixError::PathNotFound(dir.to_path_buf()));
        }
        if !self.fs.is_dir(dir) {
            return Err(FixError::NotADirectory(dir.to_path_buf()));
        }

        let mut summary = BatchSummary::default();
        self.walk(dir, mode, &mut summary)?;
        Ok(summary)
    }

    fn walk(&self, dir: &Utf8Path, mode: BatchMode, summary: &mut BatchSummary) -> Result<(), FixError> {
        let entries = self.fs.list_dir(dir).map_err(|e| FixError::io(dir, e))?;

        for entry in entries {
            let upper = entry.name.to_uppercase();
            if upper.contains("DESKTOP") {
                continue;
            }
            if upper.starts_with("DISABLED") && is_ini(&entry.path) {
                continue;
            }

            if entry.is_dir {
                if !self.options.recursive {
                    continue;
                }
                if let Err(err) = self.walk(&entry.path, mode, summary) {
                    tracing::error!("Failed to read {}: {}", entry.path, err);
                    summary.failed.push((entry.path.clone(), err.to_string()));
                }
                continue;
            }

            if !entry.is_file || !is_ini(&entry.path) {
                continue;
            }

            tracing::info!("Found .ini file: {}", entry.path);
            match mode {
                BatchMode::Upgrade => match self.upgrade(&entry.path) {
                    Ok(UpgradeOutcome::Upgraded { .. }) => summary.upgraded.push(entry.path),
                    Ok(UpgradeOutcome::Unchanged) => summary.unchanged += 1,
                    Err(err) => summary.failed.push((entry.path, err.to_string())),
                },
                BatchMode::Restore => match self.restore(&entry.path) {
                    Ok(RestoreOutcome::Restored { .. }) => summary.restored.push(entry.path),
                    Ok(RestoreOutcome::NoBackup) => summary.missing_backup += 1,
                    Err(err) => {
                        tracing::error!("Error restoring {}: {}", entry.path, err);
                        self.metrics.record_failed();
                        summary.failed.push((entry.path, err.to_string()));
                    }
                },
            }
        }

        Ok(())
    }

    /// Unused backup path for `path`, with a `_<n>` suffix on the timestamp when a
    /// backup from the same second already exists.
    fn backup_path(&self, path: &Utf8Path) -> Result<Utf8PathBuf, FixError> {
        let (dir, stem) = split_path(path)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut candidate = dir.join(backup_file_name(&stem, stamp, 0));
        let mut counter = 0;
        while self.fs.exists(&candidate) {
            counter += 1;
            candidate = dir.join(backup_file_name(&stem, stamp, counter));
        }
        Ok(candidate)
    }
}

/// `DISABLED_BACKUP_<stamp>[_<n>].<stem>.ini`
pub fn backup_file_name(stem: &str, stamp: u64, counter: u32) -> String {
    if counter == 0 {
        format!("{BACKUP_PREFIX}{stamp}.{stem}.ini")
    } else {
        format!("{BACKUP_PREFIX}{stamp}_{counter}.{stem}.ini")
    }
}

/// True when `file_name` is a backup of `<stem>.ini` created by [`FileMutator`].
pub fn is_backup_of(file_name: &str, stem: &str) -> bool {
    let Some(rest) = file_name.strip_prefix(BACKUP_PREFIX) else {
        return false;
    };
    let Some((stamp, original)) = rest.split_once('.') else {
        return false;
    };

    let mut parts = stamp.split('_');
    let valid_stamp = parts
        .next()
        .is_some_and(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
        && parts.all(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()));

    valid_stamp && original.eq_ignore_ascii_case(&format!("{stem}.ini"))
}

/// Topmost `Mods` ancestor of `path`, which must have a sibling `Core` directory.
pub fn check_mods_layout(fs: &dyn ModFileSystem, path: &Utf8Path) -> Result<Utf8PathBuf, FixError> {
    let mods = path
        .ancestors()
        .filter(|a| a.file_name().is_some_and(|n| n.eq_ignore_ascii_case("mods")))
        .last()
        .ok_or_else(|| FixError::OutsideModsFolder(path.to_path_buf()))?;

    let core = mods.parent().unwrap_or_else(|| Utf8Path::new("")).join("Core");
    if !fs.is_dir(&core) {
        return Err(FixError::CoreNotFound(core));
    }

    Ok(mods.to_path_buf())
}

fn is_ini(path: &Utf8Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("ini"))
}

fn split_path(path: &Utf8Path) -> Result<(Utf8PathBuf, String), FixError> {
    let stem = path
        .file_stem()
        .filter(|_| is_ini(path))
        .ok_or_else(|| FixError::NotAnIniFile(path.to_path_buf()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    Ok((dir.to_path_buf(), stem.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Action;
    use crate::services::fs::{DirEntry, MockModFileSystem};
    use mockall::Sequence;
    use std::io;

    fn table() -> RuleTable {
        RuleTable::empty("test").with_rule("aaaa0001", vec![Action::UpgradeHash { to: "bbbb0002".to_string() }])
    }

    #[test]
    fn test_backup_names() {
        assert_eq!(backup_file_name("Kafka", 1700000000, 0), "DISABLED_BACKUP_1700000000.Kafka.ini");
        assert_eq!(backup_file_name("Kafka", 1700000000, 2), "DISABLED_BACKUP_1700000000_2.Kafka.ini");

        assert!(is_backup_of("DISABLED_BACKUP_1700000000.Kafka.ini", "Kafka"));
        assert!(is_backup_of("DISABLED_BACKUP_1700000000_2.Kafka.ini", "Kafka"));
        assert!(!is_backup_of("DISABLED_BACKUP_1700000000.OtherKafka.ini", "Kafka"));
        assert!(!is_backup_of("DISABLED_BACKUP_1700000000.Kafka.ini.bak", "Kafka"));
        assert!(!is_backup_of("DISABLED_BACKUP_.Kafka.ini", "Kafka"));
        assert!(!is_backup_of("DISABLED_Kafka.ini", "Kafka"));
    }

    #[test]
    fn test_backup_is_created_before_write() {
        let table = table();
        let mut fs = MockModFileSystem::new();
        let mut seq = Sequence::new();

        fs.expect_is_file().returning(|_| true);
        fs.expect_exists().returning(|_| false);
        fs.expect_read_to_string()
            .returning(|_| Ok("[TextureOverrideA]\nhash = aaaa0001\n".to_string()));
        fs.expect_rename()
            .withf(|from, to| {
                from.as_str() == "Mods/Kafka/Kafka.ini"
                    && to.parent().is_some_and(|p| p.as_str() == "Mods/Kafka")
                    && to.file_name().is_some_and(|n| is_backup_of(n, "Kafka"))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        fs.expect_write()
            .withf(|path, contents| path.as_str() == "Mods/Kafka/Kafka.ini" && contents.contains("hash = bbbb0002"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let mutator = FileMutator::new(&fs, &table, FixOptions::default());
        let outcome = mutator.upgrade(Utf8Path::new("Mods/Kafka/Kafka.ini")).unwrap();

        assert!(matches!(outcome, UpgradeOutcome::Upgraded { .. }));
        assert_eq!(mutator.metrics().files_upgraded.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unreadable_file_is_never_touched() {
        let table = table();
        let mut fs = MockModFileSystem::new();
        fs.expect_is_file().returning(|_| true);
        fs.expect_read_to_string()
            .returning(|_| Err(io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")));
        fs.expect_rename().never();
        fs.expect_write().never();

        let mutator = FileMutator::new(&fs, &table, FixOptions::default());
        let err = mutator.upgrade(Utf8Path::new("Mods/Kafka/Kafka.ini")).unwrap_err();

        assert!(matches!(err, FixError::UnsupportedFormat { .. }));
        assert_eq!(mutator.metrics().files_failed.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[test]
    fn test_unchanged_file_is_not_written() {
        let table = table();
        let mut fs = MockModFileSystem::new();
        fs.expect_is_file().returning(|_| true);
        fs.expect_read_to_string()
            .returning(|_| Ok("[TextureOverrideA]\nhash = cccc0003\n".to_string()));
        fs.expect_rename().never();
        fs.expect_write().never();

        let mutator = FileMutator::new(&fs, &table, FixOptions::default());
        assert_eq!(
            mutator.upgrade(Utf8Path::new("Kafka.ini")).unwrap(),
            UpgradeOutcome::Unchanged
        );
    }

    #[test]
    fn test_restore_when_current_file_is_gone() {
        let table = table();
        let mut fs = MockModFileSystem::new();
        fs.expect_is_dir().returning(|_| false);
        fs.expect_exists().returning(|_| false);
        fs.expect_list_dir().returning(|_| {
            Ok(vec![DirEntry {
                name: "DISABLED_BACKUP_1700000000.Kafka.ini".to_string(),
                path: Utf8PathBuf::from("Mods/Kafka/DISABLED_BACKUP_1700000000.Kafka.ini"),
                is_dir: false,
                is_file: true,
            }])
        });
        fs.expect_modified().returning(|_| Ok(UNIX_EPOCH));
        fs.expect_remove_file().never();
        fs.expect_rename()
            .withf(|from, to| {
                from.as_str() == "Mods/Kafka/DISABLED_BACKUP_1700000000.Kafka.ini" && to.as_str() == "Mods/Kafka/Kafka.ini"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mutator = FileMutator::new(&fs, &table, FixOptions::default());
        let summary = mutator.run(Utf8Path::new("Mods/Kafka/Kafka.ini"), BatchMode::Restore).unwrap();
        assert_eq!(summary.restored, vec![Utf8PathBuf::from("Mods/Kafka/Kafka.ini")]);

        let err = mutator.run(Utf8Path::new("Mods/Kafka/Kafka.ini"), BatchMode::Upgrade).unwrap_err();
        assert!(matches!(err, FixError::PathNotFound(_)));
    }

    #[test]
    fn test_mods_layout_check() {
        let mut fs = MockModFileSystem::new();
        fs.expect_is_dir()
            .returning(|path| path.as_str() == "/games/XXMI/HSR/Core");

        let mods = check_mods_layout(&fs, Utf8Path::new("/games/XXMI/HSR/Mods/Characters/Mods/Kafka")).unwrap();
        assert_eq!(mods, Utf8PathBuf::from("/games/XXMI/HSR/Mods"));

        let err = check_mods_layout(&fs, Utf8Path::new("/games/Downloads/Kafka")).unwrap_err();
        assert!(matches!(err, FixError::OutsideModsFolder(_)));

        let err = check_mods_layout(&fs, Utf8Path::new("/other/Mods/Kafka")).unwrap_err();
        assert!(matches!(err, FixError::CoreNotFound(_)));
    }
}
