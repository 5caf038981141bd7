//! The database server a backup is taken from and restored into.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::runner::{CommandRunner, CommandSpec};
use crate::{Error, Result};

/// A database server instance known to the backup manager
///
/// The manager only reads these properties and brackets restores with
/// `stop`/`start`; it never owns the server.
#[async_trait]
pub trait DatabaseServer: Send + Sync {
    /// Option file passed as `--defaults-file`
    fn config_file(&self) -> &Path;

    /// Live data directory, emptied before copy-back
    fn data_dir(&self) -> &Path;

    /// Port the server listens on
    fn port(&self) -> u16;

    async fn stop(&self) -> Result<()>;

    async fn start(&self) -> Result<()>;
}

/// Server controlled through start and stop command lines
pub struct CommandServer {
    config_file: PathBuf,
    data_dir: PathBuf,
    port: u16,
    start_command: Vec<String>,
    stop_command: Vec<String>,
    log_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl CommandServer {
    pub fn new(
        config_file: PathBuf,
        data_dir: PathBuf,
        port: u16,
        start_command: Vec<String>,
        stop_command: Vec<String>,
        log_dir: PathBuf,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config_file,
            data_dir,
            port,
            start_command,
            stop_command,
            log_dir,
            runner,
        }
    }

    async fn control(&self, action: &str, command: &[String]) -> Result<()> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| Error::Config(format!("No {} command configured", action)))?;

        let spec = CommandSpec::new(program).args(args);
        let log_path = self.log_dir.join(format!("server-{}.log", action));

        info!("Running server {} command: {}", action, spec);
        let result = self.runner.run(&spec, &self.log_dir, &log_path).await?;
        if !result.success() {
            return Err(Error::Server(format!(
                "{} command exited with {:?}, see {}",
                action,
                result.code,
                log_path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseServer for CommandServer {
    fn config_file(&self) -> &Path {
        &self.config_file
    }

    fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn stop(&self) -> Result<()> {
        self.control("stop", &self.stop_command).await
    }

    async fn start(&self) -> Result<()> {
        self.control("start", &self.start_command).await
    }
}

/// Remove everything inside `dir`, keeping `dir` itself.
///
/// Symlinks are removed, never followed.
pub async fn clear_dir(dir: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0usize;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
        removed += 1;
    }

    debug!("Removed {} entries from {}", removed, dir.display());
    Ok(())
}
