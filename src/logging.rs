use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, reload, util::SubscriberInitExt};

/// Keeps the file writer alive and allows changing the level once settings are loaded.
pub struct LogHandle {
    _guard: WorkerGuard,
    level: LevelHandle,
}

impl LogHandle {
    pub fn set_debug(&self, debug_mode: bool) -> Result<()> {
        self.level.set_debug(debug_mode)
    }
}

struct LevelHandle(reload::Handle<EnvFilter, Registry>);

impl LevelHandle {
    /// `RUST_LOG` still wins over the requested level.
    fn set_debug(&self, debug_mode: bool) -> Result<()> {
        self.0
            .reload(level_filter(debug_mode))
            .context("Failed to change the log level")
    }
}

/// Setup logging with a daily rotating log file.
///
/// `RUST_LOG` overrides the level picked from `debug_mode`.
///
/// # Arguments
/// * `log_dir` - Directory for log files (e.g., "logs")
/// * `log_prefix` - Prefix for log files (e.g., "modfix")
/// * `debug_mode` - If true, use debug level; otherwise use info level
///
/// # Returns
/// A handle that must be held for the duration of the program to keep logging active
pub fn setup_logging(log_dir: &str, log_prefix: &str, debug_mode: bool) -> Result<LogHandle> {
    setup_logging_with_console(log_dir, log_prefix, debug_mode, false)
}

/// Setup file logging plus, optionally, a plain console layer.
///
/// The CLI uses the console layer so batch progress shows up in the terminal.
///
/// # Arguments
/// * `log_dir` - Directory for log files
/// * `log_prefix` - Prefix for log files
/// * `debug_mode` - If true, use debug level; otherwise use info level
/// * `console_output` - If true, also log to stderr
pub fn setup_logging_with_console(
    log_dir: &str,
    log_prefix: &str,
    debug_mode: bool,
    console_output: bool,
) -> Result<LogHandle> {
    let (writer, guard) = rolling_writer(log_dir, log_prefix)?;
    let (filter, level) = reload::Layer::new(level_filter(debug_mode));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // `None` is a no-op layer
    let console_layer = console_output.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}",
        log_dir,
        log_prefix,
        debug_mode,
        console_output
    );

    Ok(LogHandle {
        _guard: guard,
        level: LevelHandle(level),
    })
}

fn level_filter(debug_mode: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug_mode {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

fn rolling_writer(log_dir: &str, log_prefix: &str) -> Result<(NonBlocking, WorkerGuard)> {
    ensure_log_dir(Utf8Path::new(log_dir))?;
    let file_appender = rolling::daily(log_dir, log_prefix);
    Ok(tracing_appender::non_blocking(file_appender))
}

fn ensure_log_dir(log_dir: &Utf8Path) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }
    Ok(())
}
