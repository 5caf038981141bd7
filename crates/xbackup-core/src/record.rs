//! Backup records and their lifecycle status.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// File name of the persisted record inside each backup directory
pub const RECORD_FILE: &str = "backup.json";

/// Lifecycle status of a backup
///
/// ```text
/// full-backup --prepare(redo-only)--> prepared-redo-only --prepare(finalize)--> prepared
/// inc-backup  --merge into base-->    merged
/// any prepare/merge failure      -->  prepare-failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupStatus {
    /// Raw full backup, not yet prepared
    FullBackup,
    /// Raw incremental backup, must be merged into its base
    IncBackup,
    /// Incremental already applied to its base
    Merged,
    /// Redo applied without rollback; more incrementals may follow
    PreparedRedoOnly,
    /// Fully prepared
    Prepared,
    /// Apply-log failed
    PrepareFailed,
    /// Label not recognised when loading a persisted record
    #[serde(other)]
    Unknown,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::FullBackup => "full-backup",
            BackupStatus::IncBackup => "inc-backup",
            BackupStatus::Merged => "merged",
            BackupStatus::PreparedRedoOnly => "prepared-redo-only",
            BackupStatus::Prepared => "prepared",
            BackupStatus::PrepareFailed => "prepare-failed",
            BackupStatus::Unknown => "unknown",
        }
    }

    /// Whether a restore may be attempted from this status
    pub fn is_restorable(&self) -> bool {
        matches!(self, BackupStatus::Prepared | BackupStatus::PreparedRedoOnly)
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far an apply-log run goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareMode {
    /// Roll forward only (`--redo-only`), leaving room for incrementals
    RedoOnly,
    /// Roll forward and roll back uncommitted transactions
    Finalize,
}

impl PrepareMode {
    /// Status reached when apply-log succeeds in this mode
    pub fn success_status(&self) -> BackupStatus {
        match self {
            PrepareMode::RedoOnly => BackupStatus::PreparedRedoOnly,
            PrepareMode::Finalize => BackupStatus::Prepared,
        }
    }
}

impl fmt::Display for PrepareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrepareMode::RedoOnly => f.write_str("redo-only"),
            PrepareMode::Finalize => f.write_str("finalize"),
        }
    }
}

/// Kind of backup taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental {
        /// Name of the backup this one is relative to
        base: String,
    },
}

/// One backup instance and its lifecycle state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Allocated directory name, e.g. `backup3`
    pub name: String,

    /// Directory holding all backups
    pub root: PathBuf,

    pub kind: BackupKind,

    /// Creation timestamp (epoch milliseconds)
    pub created_at: i64,

    /// Log of the backup run itself
    pub log_path: PathBuf,

    /// Wrapper tool used to take the backup
    pub innobackupex_path: PathBuf,

    /// Engine binary passed through `--ibbackup`
    pub xtrabackup_path: PathBuf,

    /// Exit code of the most recent tool run against this backup
    #[serde(default)]
    pub last_exit_code: Option<i32>,

    /// Output of the most recent tool run; not persisted, see the log files
    #[serde(skip)]
    pub last_output: String,

    pub status: BackupStatus,
}

impl BackupRecord {
    /// Backup directory
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    /// Location of the persisted record
    pub fn record_path(&self) -> PathBuf {
        self.path().join(RECORD_FILE)
    }

    /// Base backup name for incrementals
    pub fn base(&self) -> Option<&str> {
        match &self.kind {
            BackupKind::Full => None,
            BackupKind::Incremental { base } => Some(base),
        }
    }

    /// Write the record into its backup directory
    pub async fn save(&self) -> Result<()> {
        let data = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(self.record_path(), data).await?;
        Ok(())
    }

    /// Load the record stored in `dir`
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(RECORD_FILE);
        let data = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::BackupNotFound(dir.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_slice(&data)?)
    }
}
