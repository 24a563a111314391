use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use zabbix_migrate::config::ConfigManager;
use zabbix_migrate::{handlers, logger};

#[derive(Parser)]
#[command(name = "zabbix-migrate")]
#[command(
    about = "Back up and restore Zabbix configuration across independent instances",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the log file (overrides ZABBIX_ETC_DIR)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up templates, host groups, hosts, media types, services, proxies and actions
    #[command(name = "backup_config")]
    BackupConfig {
        /// Directory to write the backup into (default: the config directory)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },

    /// Restore a backup onto the configured instance
    #[command(name = "restore_config")]
    RestoreConfig {
        /// Directory holding the backup (default: the config directory)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Delete every template on the destination before importing templates
        #[arg(long)]
        force_template: bool,

        /// Do not ask for confirmation before forced template deletion
        #[arg(short, long)]
        yes: bool,
    },

    /// Write only the id/name/fingerprint map of the configured instance
    #[command(name = "get_simple_id_map")]
    GetSimpleIdMap {
        /// Directory to write id_map_backup.json into (default: the config directory)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
    },
}

fn resolve_data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir),
        None => ConfigManager::config_dir(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(dir) = &cli.config_dir {
        // Read back by ConfigManager for settings, logs and the default data dir
        std::env::set_var("ZABBIX_ETC_DIR", dir);
    }

    logger::init_logger()?;
    logger::rotate_log_if_needed()?;

    match cli.command {
        Commands::BackupConfig { data_dir } => {
            handlers::handle_backup_config(&resolve_data_dir(data_dir)?)?;
        }
        Commands::RestoreConfig {
            data_dir,
            force_template,
            yes,
        } => {
            handlers::handle_restore_config(&resolve_data_dir(data_dir)?, force_template, yes)?;
        }
        Commands::GetSimpleIdMap { data_dir } => {
            handlers::handle_get_simple_id_map(&resolve_data_dir(data_dir)?)?;
        }
    }

    Ok(())
}
