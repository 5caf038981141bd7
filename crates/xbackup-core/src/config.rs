//! Configuration structures for backup lifecycle runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::matrix::OptionMatrix;
use crate::runner::CommandRunner;
use crate::server::CommandServer;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Working directory; backups are kept under `<workdir>/backups`
    pub workdir: PathBuf,

    /// Backup tool settings
    pub tool: ToolConfig,

    /// Server backed up from and restored into
    pub server: ServerConfig,

    /// Raw opt-matrix string (`key=value,...`)
    #[serde(default)]
    pub opt_matrix: Option<String>,

    /// Keys that must be present in the opt-matrix
    #[serde(default)]
    pub required_options: Vec<String>,
}

/// Backup tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Wrapper script invoked for every operation
    pub innobackupex_path: PathBuf,

    /// Engine binary passed through `--ibbackup`
    pub xtrabackup_path: PathBuf,

    /// User to connect to the server as
    #[serde(default = "default_user")]
    pub user: String,

    /// Host to connect to
    #[serde(default = "default_host")]
    pub host: String,

    /// Kill tool runs exceeding this many seconds (no limit if unset)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

impl ToolConfig {
    pub fn new(innobackupex_path: PathBuf, xtrabackup_path: PathBuf) -> Self {
        Self {
            innobackupex_path,
            xtrabackup_path,
            user: default_user(),
            host: default_host(),
            timeout_secs: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Database server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server option file
    pub config_file: PathBuf,

    /// Server data directory
    pub data_dir: PathBuf,

    /// Server port
    pub port: u16,

    /// Command line starting the server
    pub start_command: Vec<String>,

    /// Command line stopping the server
    pub stop_command: Vec<String>,
}

impl ServerConfig {
    /// Build a server driven by the configured commands; their logs go to `log_dir`
    pub fn build(&self, log_dir: &Path, runner: Arc<dyn CommandRunner>) -> CommandServer {
        CommandServer::new(
            self.config_file.clone(),
            self.data_dir.clone(),
            self.port,
            self.start_command.clone(),
            self.stop_command.clone(),
            log_dir.to_path_buf(),
            runner,
        )
    }
}

impl Config {
    /// Parse a YAML configuration
    pub fn from_yaml(content: &str) -> crate::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Directory holding all backups
    pub fn backup_root(&self) -> PathBuf {
        self.workdir.join("backups")
    }

    /// Parse the configured opt-matrix
    pub fn option_matrix(&self) -> crate::Result<OptionMatrix> {
        OptionMatrix::from_optional(self.opt_matrix.as_deref())
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.workdir.as_os_str().is_empty() {
            return Err(crate::Error::Config("workdir must not be empty".to_string()));
        }

        if self.tool.innobackupex_path.as_os_str().is_empty() {
            return Err(crate::Error::Config(
                "tool.innobackupex_path must not be empty".to_string(),
            ));
        }

        if self.tool.xtrabackup_path.as_os_str().is_empty() {
            return Err(crate::Error::Config(
                "tool.xtrabackup_path must not be empty".to_string(),
            ));
        }

        if self.tool.timeout_secs == Some(0) {
            return Err(crate::Error::Config("tool.timeout_secs must be > 0".to_string()));
        }

        if self.server.start_command.is_empty() || self.server.stop_command.is_empty() {
            return Err(crate::Error::Config(
                "server.start_command and server.stop_command are required".to_string(),
            ));
        }

        // Malformed matrices fail here rather than on first use
        self.option_matrix()?;

        Ok(())
    }
}
