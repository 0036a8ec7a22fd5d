// ModFix - Hash upgrade and batched pose patcher for XXMI mod .ini files
//
// This is the library crate containing the patch engine and its data structures.
// The binary crate (main.rs) provides the command line entry point.

pub mod config;
pub mod games;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use games::GameRegistry;
pub use models::{FixOptions, FixSettings, RuleTable, UserConfig};
pub use services::{BatchMode, FileMutator, FixError, FixPipeline, StdFileSystem};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
