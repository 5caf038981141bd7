use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "xbackup")]
#[command(about = "Physical database backup lifecycle tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Apply-log mode
#[derive(Clone, Copy, ValueEnum)]
enum PrepareModeArg {
    /// Roll forward only, more incrementals may be merged afterwards
    RedoOnly,
    /// Roll forward and back, making the backup restorable
    Finalize,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a full or incremental backup
    Backup {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,

        /// Take an incremental backup relative to this backup
        #[arg(short, long)]
        incremental_base: Option<String>,
    },

    /// Apply the redo log of a backup
    Prepare {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,

        /// Backup to prepare
        #[arg(short, long)]
        backup: String,

        /// Prepare mode
        #[arg(short, long, value_enum, default_value = "finalize")]
        mode: PrepareModeArg,
    },

    /// Apply an incremental backup onto its redo-only prepared base
    Merge {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,

        /// Base backup, prepared with --mode redo-only
        #[arg(short, long)]
        base: String,

        /// Incremental backup to apply
        #[arg(short, long)]
        incremental: String,
    },

    /// Restore a prepared backup into the server's data directory
    Restore {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,

        /// Backup to restore
        #[arg(short, long)]
        backup: String,
    },

    /// List available backups
    List {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,
    },

    /// Show the record of a backup
    Status {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,

        /// Backup to show
        #[arg(short, long)]
        backup: String,

        /// Output format (text, json, yaml)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Parse the opt-matrix and check required options
    CheckMatrix {
        /// Path to the configuration file
        #[arg(short, long)]
        config: String,

        /// Opt-matrix string overriding the configured one
        #[arg(long)]
        opt_matrix: Option<String>,

        /// Additional required options (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        require: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    // Priority: RUST_LOG env var > verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Backup {
            config,
            incremental_base,
        } => {
            commands::backup::run(&config, incremental_base.as_deref()).await?;
        }
        Commands::Prepare {
            config,
            backup,
            mode,
        } => {
            let mode = match mode {
                PrepareModeArg::RedoOnly => xbackup_core::PrepareMode::RedoOnly,
                PrepareModeArg::Finalize => xbackup_core::PrepareMode::Finalize,
            };
            commands::prepare::run(&config, &backup, mode).await?;
        }
        Commands::Merge {
            config,
            base,
            incremental,
        } => {
            commands::merge::run(&config, &base, &incremental).await?;
        }
        Commands::Restore { config, backup } => {
            commands::restore::run(&config, &backup).await?;
        }
        Commands::List { config } => {
            commands::list::run(&config).await?;
        }
        Commands::Status {
            config,
            backup,
            format,
        } => {
            commands::status::run(&config, &backup, &format).await?;
        }
        Commands::CheckMatrix {
            config,
            opt_matrix,
            require,
        } => {
            commands::matrix::run(&config, opt_matrix.as_deref(), &require).await?;
        }
    }

    Ok(())
}
