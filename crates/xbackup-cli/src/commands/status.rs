use anyhow::Result;
use tracing::info;
use xbackup_core::BackupRecord;

use super::load_manager;

/// Status command output format
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "yaml" => Self::Yaml,
            _ => Self::Text,
        }
    }
}

pub async fn run(config_path: &str, backup_name: &str, format: &str) -> Result<()> {
    let (_, manager) = load_manager(config_path).await?;

    info!("Loading backup record: {}", backup_name);
    let record = manager.load(backup_name).await?;

    match OutputFormat::from_str(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&record)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&record)?),
        OutputFormat::Text => print_record_text(&record),
    }

    Ok(())
}

fn print_record_text(record: &BackupRecord) {
    let created = chrono::DateTime::from_timestamp_millis(record.created_at)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!("Backup:      {}", record.name);
    println!("Directory:   {}", record.path().display());
    match record.base() {
        Some(base) => println!("Type:        incremental (base: {})", base),
        None => println!("Type:        full"),
    }
    println!("Created:     {}", created);
    println!("Status:      {}", record.status);
    println!(
        "Last exit:   {}",
        record
            .last_exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string())
    );
    println!("Backup log:  {}", record.log_path.display());
    println!("Tool:        {}", record.innobackupex_path.display());
    println!("Engine:      {}", record.xtrabackup_path.display());
    println!(
        "Restorable:  {}",
        if record.status.is_restorable() { "yes" } else { "no" }
    );
}
