//! Id map command handler

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::backup;
use crate::kind::ObjectKind;
use crate::logger::log_to_file;

/// Handle get_simple_id_map command
///
/// Captures only the snapshot of ids, names and fingerprints, without
/// exporting any configuration.
pub fn handle_get_simple_id_map(data_dir: &Path) -> Result<()> {
    let client = super::connect()?;

    let (path, snapshot) =
        backup::write_id_map(&client, data_dir).context("Failed to capture id map")?;

    for kind in ObjectKind::ALL {
        println!("  {:<12} {}", kind.label().cyan(), snapshot.records(kind).len());
    }
    println!("{} {}", "Id map written to".green().bold(), path.display());

    log_to_file(&format!("get_simple_id_map wrote {}", path.display()))?;

    Ok(())
}
