use anyhow::Result;
use tracing::info;
use xbackup_core::PrepareMode;

use super::load_manager;

pub async fn run(config_path: &str, backup_name: &str, mode: PrepareMode) -> Result<()> {
    let (_, manager) = load_manager(config_path).await?;
    let mut backup = manager.load(backup_name).await?;

    manager.prepare(&mut backup, mode).await?;

    info!("Prepare completed successfully");
    println!("{}: {}", backup.name, backup.status);
    Ok(())
}
