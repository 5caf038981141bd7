use anyhow::Result;
use tracing::info;

use super::load_manager;

pub async fn run(config_path: &str, backup_name: &str) -> Result<()> {
    let (config, manager) = load_manager(config_path).await?;
    let server = config.server.build(&config.workdir, manager.runner());
    let mut backup = manager.load(backup_name).await?;

    info!("Starting restore from backup: {}", backup.name);
    let output = manager.restore(&mut backup, &server).await?;

    info!(
        "Restore completed successfully (log: {})",
        output.log_path.display()
    );
    Ok(())
}
