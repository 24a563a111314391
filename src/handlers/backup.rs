//! Backup command handler

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::backup;
use crate::logger::log_to_file;

/// Handle backup_config command
pub fn handle_backup_config(data_dir: &Path) -> Result<()> {
    println!(
        "{} {}",
        "Backing up configuration to".cyan().bold(),
        data_dir.display()
    );

    let client = super::connect()?;
    log_to_file(&format!("backup_config started into {}", data_dir.display()))?;

    let summary = backup::backup(&client, data_dir).context("Backup failed")?;

    for (kind, count) in &summary.objects {
        println!("  {} {:>5} {}", "✓".green(), count, kind.label());
    }
    for (class, count) in &summary.actions {
        println!("  {} {:>5} {}", "✓".green(), count, class.label());
    }
    println!(
        "\n{} {} files written, {} objects fingerprinted",
        "Backup complete:".green().bold(),
        summary.files.len(),
        summary.snapshot_records
    );

    log_to_file(&format!(
        "backup_config finished: {} files, {} snapshot records",
        summary.files.len(),
        summary.snapshot_records
    ))?;

    Ok(())
}
