pub mod backup;
pub mod list;
pub mod matrix;
pub mod merge;
pub mod prepare;
pub mod restore;
pub mod status;

use anyhow::Result;
use tracing::info;
use xbackup_core::{BackupManager, Config};

/// Load and validate the configuration file
pub async fn load_config(config_path: &str) -> Result<Config> {
    info!("Loading configuration from: {}", config_path);

    let config_content = tokio::fs::read_to_string(config_path).await?;
    Ok(Config::from_yaml(&config_content)?)
}

/// Load the configuration and build a manager running real processes
pub async fn load_manager(config_path: &str) -> Result<(Config, BackupManager)> {
    let config = load_config(config_path).await?;
    let manager = BackupManager::from_config(&config).await?;
    Ok((config, manager))
}
