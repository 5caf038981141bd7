use anyhow::Result;
use tracing::info;

use super::load_manager;

pub async fn run(config_path: &str, base_name: &str, incremental_name: &str) -> Result<()> {
    let (_, manager) = load_manager(config_path).await?;
    let mut base = manager.load(base_name).await?;
    let mut incremental = manager.load(incremental_name).await?;

    if incremental.base().is_none() {
        anyhow::bail!("{} is not an incremental backup", incremental.name);
    }

    manager.merge_incremental(&mut base, &mut incremental).await?;

    info!("Merge completed successfully");
    println!("{}: {}", base.name, base.status);
    println!("{}: {}", incremental.name, incremental.status);
    Ok(())
}
