use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that stop a fixer invocation
#[derive(Error, Debug)]
pub enum FixError {
    #[error("Path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    #[error("Passed file is not an INI file: {0}")]
    NotAnIniFile(Utf8PathBuf),

    #[error("{0} is not inside a Mods folder. Aborting...")]
    OutsideModsFolder(Utf8PathBuf),

    #[error(
        "XXMI install was not detected: expected a Core folder at {0}. \
         Please make sure XXMI is installed properly."
    )]
    CoreNotFound(Utf8PathBuf),

    #[error("No rule table registered for game '{0}'")]
    UnknownGame(String),

    #[error("Rule table {name} is invalid: {reason}")]
    InvalidRuleTable { name: String, reason: String },

    #[error("Unsupported file format in {path}: {reason}")]
    UnsupportedFormat { path: Utf8PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FixError {
    pub fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        FixError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Recoverable problems inside a transform pass. The affected section or branch is
/// left as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Missing {field} in {section}")]
    MissingField { section: String, field: &'static str },

    #[error("Missing section [{0}]")]
    MissingSection(String),

    #[error("Multiple sections named [{0}], unable to decide which to use")]
    AmbiguousSection(String),

    #[error("{0} has no if/else blocks, probably not a merge mod")]
    NotAMergeMod(String),
}
