//! Command handler modules
//!
//! Each handler connects to the platform, runs one engine operation, and
//! prints the outcome for the operator.

pub mod backup;
pub mod id_map;
pub mod restore;

pub use backup::handle_backup_config;
pub use id_map::handle_get_simple_id_map;
pub use restore::handle_restore_config;

use anyhow::{Context, Result};

use crate::client::JsonRpcClient;
use crate::config::Settings;

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Load settings and log in to the configured instance
pub(crate) fn connect() -> Result<JsonRpcClient> {
    let settings = Settings::load().context("Failed to load connection settings")?;
    JsonRpcClient::connect(&settings)
        .with_context(|| format!("Failed to connect to Zabbix at {}", settings.api_url()))
}
