//! Physical Backup Lifecycle Library
//!
//! This crate drives an external hot-backup tool (innobackupex/xtrabackup)
//! through full and incremental backups, prepare, merge and restore, and
//! parses the opt-matrix strings that parameterise test runs.

pub mod allocator;
pub mod config;
pub mod error;
pub mod manager;
pub mod matrix;
pub mod record;
pub mod runner;
pub mod server;

pub use allocator::allocate_name;
pub use config::{Config, ServerConfig, ToolConfig};
pub use error::{Error, Result};
pub use manager::BackupManager;
pub use matrix::OptionMatrix;
pub use record::{BackupKind, BackupRecord, BackupStatus, PrepareMode};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner};
pub use server::{CommandServer, DatabaseServer};
