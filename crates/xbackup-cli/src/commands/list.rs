use anyhow::Result;
use tracing::info;

use super::load_manager;

pub async fn run(config_path: &str) -> Result<()> {
    let (_, manager) = load_manager(config_path).await?;

    info!("Listing backups in: {}", manager.backup_root().display());
    let records = manager.list().await?;

    if records.is_empty() {
        println!("No backups found in {}", manager.backup_root().display());
        return Ok(());
    }

    println!("Available backups:");
    for record in records {
        let created = chrono::DateTime::from_timestamp_millis(record.created_at)
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        match record.base() {
            Some(base) => println!(
                "  - {} [{}] created {} (incremental on {})",
                record.name, record.status, created, base
            ),
            None => println!("  - {} [{}] created {}", record.name, record.status, created),
        }
    }

    Ok(())
}
