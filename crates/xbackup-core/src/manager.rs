//! Backup lifecycle manager.
//!
//! Drives the external backup tool through full and incremental backups,
//! prepare (apply-log), incremental merges and copy-back restores, and keeps
//! each backup's [`BackupRecord`] up to date on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::allocator::{
    allocate_name, sequence_number, BACKUP_PREFIX, PREPARE_PREFIX, RESTORE_PREFIX,
};
use crate::config::{Config, ToolConfig};
use crate::record::{BackupKind, BackupRecord, BackupStatus, PrepareMode, RECORD_FILE};
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
use crate::server::{clear_dir, DatabaseServer};
use crate::{Error, Result};

/// Manages backups kept under a single root directory
///
/// Operations are strictly sequential. Directory allocation is not safe
/// against other processes sharing the same root.
pub struct BackupManager {
    tool: ToolConfig,
    backup_root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl BackupManager {
    /// Create a manager, creating `backup_root` if needed
    pub async fn new(
        tool: ToolConfig,
        backup_root: PathBuf,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&backup_root).await?;
        Ok(Self {
            tool,
            backup_root,
            runner,
        })
    }

    /// Create a manager running real processes as configured
    pub async fn from_config(config: &Config) -> Result<Self> {
        let runner = Arc::new(ProcessRunner::with_timeout(config.tool.timeout()));
        Self::new(config.tool.clone(), config.backup_root(), runner).await
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Runner shared with collaborators such as a [`crate::server::CommandServer`]
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    fn tool_name(&self) -> String {
        self.tool.innobackupex_path.display().to_string()
    }

    fn backup_command(
        &self,
        server: &dyn DatabaseServer,
        extra_args: &[String],
        target: &Path,
    ) -> CommandSpec {
        CommandSpec::new(&self.tool.innobackupex_path)
            .arg(format!("--defaults-file={}", server.config_file().display()))
            .arg("--no-timestamp")
            .arg(format!("--user={}", self.tool.user))
            .arg(format!("--port={}", server.port()))
            .arg(format!("--host={}", self.tool.host))
            .arg(format!("--ibbackup={}", self.tool.xtrabackup_path.display()))
            .args(extra_args)
            .arg(target)
    }

    fn prepare_command(backup: &BackupRecord, mode: PrepareMode) -> CommandSpec {
        let mut spec = CommandSpec::new(&backup.innobackupex_path).arg("--apply-log");
        if mode == PrepareMode::RedoOnly {
            spec = spec.arg("--redo-only");
        }
        spec.arg(format!("--ibbackup={}", backup.xtrabackup_path.display()))
            .arg(backup.path())
    }

    fn merge_command(base: &BackupRecord, incremental: &BackupRecord) -> CommandSpec {
        CommandSpec::new(&base.innobackupex_path)
            .arg("--apply-log")
            .arg("--redo-only")
            .arg(format!("--ibbackup={}", base.xtrabackup_path.display()))
            .arg(base.path())
            .arg(format!("--incremental-dir={}", incremental.path().display()))
    }

    fn restore_command(backup: &BackupRecord, server: &dyn DatabaseServer) -> CommandSpec {
        CommandSpec::new(&backup.innobackupex_path)
            .arg(format!("--defaults-file={}", server.config_file().display()))
            .arg("--copy-back")
            .arg(format!("--ibbackup={}", backup.xtrabackup_path.display()))
            .arg(backup.path())
    }

    /// Take a full backup of `server`
    pub async fn backup_full(&self, server: &dyn DatabaseServer) -> Result<BackupRecord> {
        self.take_backup(server, BackupKind::Full, Vec::new()).await
    }

    /// Take an incremental backup of `server` relative to `base`
    pub async fn backup_inc(
        &self,
        server: &dyn DatabaseServer,
        base: &BackupRecord,
    ) -> Result<BackupRecord> {
        let extra = vec![
            "--incremental".to_string(),
            format!("--incremental-basedir={}", base.path().display()),
        ];
        let kind = BackupKind::Incremental {
            base: base.name.clone(),
        };
        self.take_backup(server, kind, extra).await
    }

    async fn take_backup(
        &self,
        server: &dyn DatabaseServer,
        kind: BackupKind,
        extra_args: Vec<String>,
    ) -> Result<BackupRecord> {
        let name = allocate_name(&self.backup_root, BACKUP_PREFIX).await?;
        let path = self.backup_root.join(&name);
        let temp_log = self.backup_root.join(format!("{}.log", name));
        let log_path = path.join(format!("{}.log", name));

        let spec = self.backup_command(server, &extra_args, &path);

        info!(
            "Starting {} backup {} of server on port {}",
            kind_label(&kind),
            name,
            server.port()
        );
        let output = match self.runner.run(&spec, &self.backup_root, &temp_log).await {
            Ok(output) => output,
            Err(e) => {
                // Nothing to record, keep the log next to whatever the tool left
                Self::discard_temp_log(&temp_log, &path, &log_path).await;
                return Err(e);
            }
        };

        // The tool does not create the directory when it fails early
        tokio::fs::create_dir_all(&path).await?;
        tokio::fs::rename(&temp_log, &log_path).await?;

        let status = match kind {
            BackupKind::Full => BackupStatus::FullBackup,
            BackupKind::Incremental { .. } => BackupStatus::IncBackup,
        };

        let record = BackupRecord {
            name,
            root: self.backup_root.clone(),
            kind,
            created_at: chrono::Utc::now().timestamp_millis(),
            log_path: log_path.clone(),
            innobackupex_path: self.tool.innobackupex_path.clone(),
            xtrabackup_path: self.tool.xtrabackup_path.clone(),
            last_exit_code: output.code,
            last_output: output.output.clone(),
            status,
        };
        record.save().await?;

        if !output.success() {
            error!(
                "Backup {} failed with {:?}, see {}",
                record.name,
                output.code,
                log_path.display()
            );
            return Err(Error::NonZeroExit {
                program: self.tool_name(),
                code: output.code,
                output: output.output,
                log_path,
            });
        }

        info!("Backup {} completed ({})", record.name, record.status);
        Ok(record)
    }

    async fn discard_temp_log(temp_log: &Path, path: &Path, log_path: &Path) {
        let tool_created_dir = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        let moved = if tool_created_dir {
            tokio::fs::rename(temp_log, log_path).await
        } else {
            tokio::fs::remove_file(temp_log).await
        };
        match moved {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to clean up {}: {}", temp_log.display(), e),
        }
    }

    /// Apply the backup's redo log.
    ///
    /// `RedoOnly` leaves the backup open for incrementals, `Finalize` makes it
    /// restorable. Any failure of the tool moves the backup to
    /// `prepare-failed`.
    pub async fn prepare(
        &self,
        backup: &mut BackupRecord,
        mode: PrepareMode,
    ) -> Result<CommandOutput> {
        let reason = match backup.status {
            BackupStatus::FullBackup
            | BackupStatus::PreparedRedoOnly
            | BackupStatus::Prepared => None,
            BackupStatus::IncBackup => {
                Some("incremental backups are merged into their base, prepare the base instead")
            }
            BackupStatus::Merged => Some("already merged into its base"),
            BackupStatus::PrepareFailed => {
                Some("a previous prepare failed, see prepare log for details")
            }
            BackupStatus::Unknown => Some("unknown backup status"),
        };
        if let Some(reason) = reason {
            return Err(Error::IneligibleState {
                operation: "prepare",
                backup: backup.name.clone(),
                status: backup.status.to_string(),
                reason: reason.to_string(),
            });
        }

        let dir = backup.path();
        let log_path = dir.join(allocate_name(&dir, PREPARE_PREFIX).await?);
        let spec = Self::prepare_command(backup, mode);

        info!("Preparing backup {} ({})", backup.name, mode);
        let outcome = self.runner.run(&spec, &dir, &log_path).await;
        self.finish_apply_log(backup, outcome, mode.success_status(), &log_path)
            .await
    }

    /// Apply an incremental backup onto a base prepared with `RedoOnly`.
    ///
    /// On success the incremental becomes `merged` and the base stays
    /// `prepared-redo-only`, ready for further incrementals or a final
    /// `Finalize` prepare.
    pub async fn merge_incremental(
        &self,
        base: &mut BackupRecord,
        incremental: &mut BackupRecord,
    ) -> Result<CommandOutput> {
        if base.status != BackupStatus::PreparedRedoOnly {
            return Err(Error::IneligibleState {
                operation: "merge",
                backup: base.name.clone(),
                status: base.status.to_string(),
                reason: "base must be prepared with redo-only first".to_string(),
            });
        }
        if incremental.status != BackupStatus::IncBackup {
            return Err(Error::IneligibleState {
                operation: "merge",
                backup: incremental.name.clone(),
                status: incremental.status.to_string(),
                reason: "only unmerged incremental backups can be applied".to_string(),
            });
        }

        let dir = base.path();
        let log_path = dir.join(allocate_name(&dir, PREPARE_PREFIX).await?);
        let spec = Self::merge_command(base, incremental);

        info!("Merging incremental {} into {}", incremental.name, base.name);
        let outcome = self.runner.run(&spec, &dir, &log_path).await;
        let output = self
            .finish_apply_log(base, outcome, BackupStatus::PreparedRedoOnly, &log_path)
            .await?;

        incremental.status = BackupStatus::Merged;
        incremental.save().await?;
        Ok(output)
    }

    async fn finish_apply_log(
        &self,
        backup: &mut BackupRecord,
        outcome: Result<CommandOutput>,
        success_status: BackupStatus,
        log_path: &Path,
    ) -> Result<CommandOutput> {
        let output = match outcome {
            Ok(output) => output,
            Err(e @ Error::Timeout { .. }) => {
                // Killed mid-apply, the files can no longer be trusted
                backup.status = BackupStatus::PrepareFailed;
                backup.save().await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        backup.last_exit_code = output.code;
        backup.last_output = output.output.clone();

        if output.success() {
            backup.status = success_status;
            backup.save().await?;
            info!("Backup {} is now {}", backup.name, backup.status);
            Ok(output)
        } else {
            backup.status = BackupStatus::PrepareFailed;
            backup.save().await?;
            error!("Prepare of {} failed, see {}", backup.name, log_path.display());
            Err(Error::PrepareFailed {
                backup: backup.name.clone(),
                code: output.code,
                output: output.output,
                log_path: log_path.to_path_buf(),
            })
        }
    }

    /// Restore `backup` into `server`'s data directory.
    ///
    /// Nothing is touched unless the backup is prepared. Otherwise the server
    /// is stopped, its data directory emptied, the backup copied back and the
    /// server started again. The restart is attempted even if copy-back fails.
    /// A copy-back failure is returned in preference to a restart failure,
    /// which is then only logged.
    pub async fn restore(
        &self,
        backup: &mut BackupRecord,
        server: &dyn DatabaseServer,
    ) -> Result<CommandOutput> {
        let reason = match backup.status {
            BackupStatus::Prepared | BackupStatus::PreparedRedoOnly => None,
            BackupStatus::FullBackup => Some("backup has to be prepared before restore"),
            BackupStatus::IncBackup => {
                Some("incrementals have to be applied to a full backup to restore it")
            }
            BackupStatus::Merged => Some("incremental was merged, restore its base instead"),
            BackupStatus::PrepareFailed => {
                Some("backup failed to prepare, see prepare log for details")
            }
            BackupStatus::Unknown => Some("unknown backup status"),
        };
        if let Some(reason) = reason {
            warn!("Refusing to restore {}: {}", backup.name, reason);
            return Err(Error::IneligibleRestoreState {
                backup: backup.name.clone(),
                status: backup.status.to_string(),
                reason: reason.to_string(),
            });
        }

        info!(
            "Restoring backup {} into {}",
            backup.name,
            server.data_dir().display()
        );
        server.stop().await?;

        let outcome = self.copy_back(backup, server).await;
        let restarted = server.start().await;
        if let Err(e) = &restarted {
            error!(
                "Server failed to restart after restore of {}: {}",
                backup.name, e
            );
        }

        let output = outcome?;
        backup.last_exit_code = output.code;
        backup.last_output = output.output.clone();
        let saved = backup.save().await;
        if let Err(e) = &saved {
            error!("Failed to save record of {}: {}", backup.name, e);
        }

        let output = output.into_result(&self.tool_name())?;
        saved?;
        restarted?;

        info!("Restore of {} completed", backup.name);
        Ok(output)
    }

    async fn copy_back(
        &self,
        backup: &BackupRecord,
        server: &dyn DatabaseServer,
    ) -> Result<CommandOutput> {
        clear_dir(server.data_dir()).await?;

        let dir = backup.path();
        let log_path = dir.join(allocate_name(&dir, RESTORE_PREFIX).await?);
        let spec = Self::restore_command(backup, server);
        self.runner.run(&spec, &dir, &log_path).await
    }

    /// Load the record of a named backup
    pub async fn load(&self, name: &str) -> Result<BackupRecord> {
        let dir = self.backup_root.join(name);
        let mut record = BackupRecord::load(&dir).await.map_err(|e| match e {
            Error::BackupNotFound(_) => Error::BackupNotFound(name.to_string()),
            other => other,
        })?;
        record.root = self.backup_root.clone();
        Ok(record)
    }

    /// All backups under the root, in allocation order
    pub async fn list(&self) -> Result<Vec<BackupRecord>> {
        let mut found = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.backup_root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let Some(seq) = sequence_number(&name, BACKUP_PREFIX) else {
                continue;
            };
            if !entry.path().join(RECORD_FILE).exists() {
                warn!("Skipping {}: no {}", name, RECORD_FILE);
                continue;
            }
            match self.load(&name).await {
                Ok(record) => found.push((seq, record)),
                Err(e) => warn!("Skipping {}: {}", name, e),
            }
        }

        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().map(|(_, record)| record).collect())
    }
}

fn kind_label(kind: &BackupKind) -> &'static str {
    match kind {
        BackupKind::Full => "full",
        BackupKind::Incremental { .. } => "incremental",
    }
}
