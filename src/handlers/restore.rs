//! Restore command handler
//!
//! Guards forced template replacement behind a confirmation when running
//! interactively, runs the restore, and persists its report next to the
//! backup.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::Confirm;
use std::path::Path;

use crate::config::ConfigManager;
use crate::logger::log_to_file;
use crate::report::REPORT_FILE;
use crate::restore::{self, RestoreOptions};

/// Handle restore_config command
pub fn handle_restore_config(
    data_dir: &Path,
    force_template: bool,
    assume_yes: bool,
) -> Result<()> {
    println!(
        "{} {}",
        "Restoring configuration from".cyan().bold(),
        data_dir.display()
    );

    if force_template && !assume_yes && super::is_interactive() {
        let confirm = Confirm::new("Delete every template on the destination before importing?")
            .with_default(false)
            .with_help_message("Hosts lose their template links until templates are re-imported")
            .prompt()
            .context("Failed to get confirmation")?;

        if !confirm {
            println!("\n{}", "Restore cancelled.".yellow());
            return Ok(());
        }
    }

    let client = super::connect()?;
    log_to_file(&format!(
        "restore_config started from {} (force_template={force_template})",
        data_dir.display()
    ))?;

    let options = RestoreOptions {
        force_template,
        journal: Some(ConfigManager::log_file_path()?),
    };
    let report = restore::restore(&client, data_dir, options).context("Restore aborted")?;

    let report_path = data_dir.join(REPORT_FILE);
    report.save(&report_path)?;
    report.print_summary();
    println!("\nReport written to {}", report_path.display());

    log_to_file(&format!(
        "restore_config finished: run {}, {} created, {} updated, {} unresolved references",
        report.run_id,
        report.actions.created,
        report.actions.updated,
        report.unresolved.len()
    ))?;

    let failed = report.failed_kinds();
    if !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|k| k.label()).collect();
        bail!("Import failed for: {}", names.join(", "));
    }

    Ok(())
}
