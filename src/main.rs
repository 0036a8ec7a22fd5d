//! ModFix - command line entry point.
//!
//! # Overview
//!
//! Upgrades the mod `.ini` files of a `Mods` tree (or a single file) to the
//! current game version, and restores the backups it leaves behind:
//!
//! ```text
//! modfix fix "D:/XXMI/SRMI/Mods/Kafka"
//! modfix fix --game zzz --skip-pose "D:/XXMI/ZZMI/Mods"
//! modfix restore "D:/XXMI/SRMI/Mods/Kafka/Kafka.ini"
//! modfix games
//! ```
//!
//! # Configuration Files
//!
//! Expected in the config directory (`ModFix Data/` by default):
//! - `ModFix Config.yaml`: `Fix_Settings` (optional, defaults otherwise)
//! - `rules/*.yaml`: extra or newer rule tables (optional)
//!
//! Command line switches override the settings from the file for one run.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand};
use modfix::services::BatchSummary;
use modfix::{APP_NAME, BatchMode, ConfigManager, FileMutator, GameRegistry, StdFileSystem, VERSION};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "modfix")]
#[command(version)]
/// Upgrade XXMI mod .ini files to new game versions.
///
/// Every rewritten file is first renamed to a DISABLED_BACKUP_<time>.<name>.ini
/// backup, which `modfix restore` puts back.
struct Cli {
    #[arg(long, default_value = "ModFix Data")]
    /// Directory holding `ModFix Config.yaml` and extra rule tables
    config_dir: Utf8PathBuf,

    #[arg(long, default_value = "logs")]
    /// Directory for the rotating log files
    log_dir: String,

    #[arg(short, long)]
    /// Log debug messages
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upgrade a mod file or every .ini file below a directory
    Fix {
        /// A .ini file or a directory inside the Mods folder
        path: Utf8PathBuf,

        #[arg(short, long)]
        /// Game tag of the rule table (defaults to `Default Game` from the settings)
        game: Option<String>,

        #[arg(long)]
        /// Skip the batched pose fix
        skip_pose: bool,

        #[arg(long)]
        /// Only process the top directory
        no_recursive: bool,

        #[arg(long)]
        /// Do not require the Mods/Core folder layout
        no_dir_check: bool,

        #[arg(long)]
        /// Keep the original indentation of fixed files
        keep_indentation: bool,
    },

    /// Restore the newest backup of a file or of every .ini file below a directory
    Restore {
        path: Utf8PathBuf,

        #[arg(long)]
        /// Only process the top directory
        no_recursive: bool,
    },

    /// List the known games and their rule tables
    Games,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let logging = modfix::logging::setup_logging_with_console(&cli.log_dir, APP_NAME, cli.debug, true)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config_manager = ConfigManager::new(&cli.config_dir)?;
    let mut settings = config_manager.load_user_config()?.fix_settings;
    if settings.debug_mode && !cli.debug {
        logging.set_debug(true)?;
        tracing::debug!("Debug logging enabled from settings");
    }

    let mut registry = GameRegistry::builtin()?;
    for table in config_manager.load_rule_tables()? {
        registry.register(table);
    }

    match cli.command {
        Command::Games => {
            for table in registry.games() {
                println!(
                    "{:<6} {} v{} ({} parts, {} rules)",
                    table.game,
                    table.title,
                    table.version,
                    table.trios.len(),
                    table.rules.len()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Fix {
            path,
            game,
            skip_pose,
            no_recursive,
            no_dir_check,
            keep_indentation,
        } => {
            settings.skip_batched_pose |= skip_pose;
            settings.recursive &= !no_recursive;
            settings.check_directory &= !no_dir_check;
            settings.normalize_indentation &= !keep_indentation;

            let tag = game.unwrap_or_else(|| settings.default_game.clone());
            let table = registry.resolve(&tag)?;
            tracing::info!("Using the {} table (v{})", table.title, table.version);

            let mutator = FileMutator::new(&StdFileSystem, table, settings.fix_options());
            let summary = mutator
                .run(&absolute(&path), BatchMode::Upgrade)
                .with_context(|| format!("Failed to fix {}", path))?;
            mutator.metrics().log_summary();

            Ok(report(&summary))
        }
        Command::Restore { path, no_recursive } => {
            settings.recursive &= !no_recursive;

            // Restoring only renames files, any table will do
            let table = registry.resolve(&settings.default_game)?;
            let mutator = FileMutator::new(&StdFileSystem, table, settings.fix_options());
            let summary = mutator
                .run(&absolute(&path), BatchMode::Restore)
                .with_context(|| format!("Failed to restore {}", path))?;
            mutator.metrics().log_summary();

            Ok(report(&summary))
        }
    }
}

/// Canonical form of `path` so the Mods folder can be found among its ancestors.
/// Missing paths are passed through and reported by the mutator.
fn absolute(path: &Utf8Path) -> Utf8PathBuf {
    path.canonicalize_utf8().unwrap_or_else(|_| path.to_path_buf())
}

fn report(summary: &BatchSummary) -> ExitCode {
    for path in &summary.upgraded {
        println!("fixed      {}", path);
    }
    for path in &summary.restored {
        println!("restored   {}", path);
    }
    for (path, err) in &summary.failed {
        println!("failed     {}: {}", path, err);
    }

    println!(
        "{} file(s): {} fixed, {} unchanged, {} restored, {} without backup, {} failed",
        summary.files_seen(),
        summary.upgraded.len(),
        summary.unchanged,
        summary.restored.len(),
        summary.missing_backup,
        summary.failed.len()
    );

    if summary.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
