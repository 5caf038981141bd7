use anyhow::Result;
use tracing::info;

use super::load_manager;

pub async fn run(config_path: &str, incremental_base: Option<&str>) -> Result<()> {
    let (config, manager) = load_manager(config_path).await?;
    let server = config.server.build(&config.workdir, manager.runner());

    let record = match incremental_base {
        Some(base_name) => {
            let base = manager.load(base_name).await?;
            info!("Starting incremental backup on top of {}", base.name);
            manager.backup_inc(&server, &base).await?
        }
        None => {
            info!("Starting full backup");
            manager.backup_full(&server).await?
        }
    };

    info!("Backup completed successfully");
    println!("{}", record.name);
    Ok(())
}
