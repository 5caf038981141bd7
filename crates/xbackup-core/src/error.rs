//! Error types for the backup lifecycle library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the backup lifecycle library.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required option-matrix key is absent
    #[error("The required option {0} is missing from opt-matrix")]
    MissingOption(String),

    /// An option-matrix entry could not be parsed
    #[error("Malformed opt-matrix entry (expected key=value): {0:?}")]
    MalformedOption(String),

    /// The external program could not be started
    #[error("Failed to launch {program}: {source}")]
    ProcessLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external program ran but exited unsuccessfully
    #[error("{program} exited with {} (log: {})", describe_code(.code), .log_path.display())]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        output: String,
        log_path: PathBuf,
    },

    /// The external program exceeded its time limit and was killed
    #[error("{program} timed out after {timeout:?} (log: {})", .log_path.display())]
    Timeout {
        program: String,
        timeout: Duration,
        log_path: PathBuf,
    },

    /// Restore requested for a backup that is not in a restorable state
    #[error("Backup {backup} cannot be restored ({status}): {reason}")]
    IneligibleRestoreState {
        backup: String,
        status: String,
        reason: String,
    },

    /// The apply-log step failed
    #[error(
        "Prepare of backup {backup} failed with {} (log: {})",
        describe_code(.code),
        .log_path.display()
    )]
    PrepareFailed {
        backup: String,
        code: Option<i32>,
        output: String,
        log_path: PathBuf,
    },

    /// Prepare or merge requested for a backup in the wrong state
    #[error("Backup {backup} cannot be used for {operation} ({status}): {reason}")]
    IneligibleState {
        operation: &'static str,
        backup: String,
        status: String,
        reason: String,
    },

    /// The database server collaborator failed to stop or start
    #[error("Server error: {0}")]
    Server(String),

    /// No record exists for the named backup
    #[error("Backup not found: {0}")]
    BackupNotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Captured tool output attached to this error, if any.
    pub fn output(&self) -> Option<&str> {
        match self {
            Error::NonZeroExit { output, .. } | Error::PrepareFailed { output, .. } => {
                Some(output)
            }
            _ => None,
        }
    }

    /// Log file holding the tool's combined output, if any.
    pub fn log_path(&self) -> Option<&std::path::Path> {
        match self {
            Error::NonZeroExit { log_path, .. }
            | Error::Timeout { log_path, .. }
            | Error::PrepareFailed { log_path, .. } => Some(log_path),
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
