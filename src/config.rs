use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "zabbix-migrate";

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path:
    /// - `$ZABBIX_ETC_DIR` when set
    /// - Linux: $XDG_CONFIG_HOME/zabbix-migrate or ~/.config/zabbix-migrate
    /// - elsewhere: the platform config dir joined with zabbix-migrate
    pub fn config_dir() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("ZABBIX_ETC_DIR") {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }

        #[cfg(target_os = "linux")]
        {
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join(APP_DIR))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join(APP_DIR))
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            Ok(dirs::config_dir()
                .context("Failed to get config directory")?
                .join(APP_DIR))
        }
    }

    /// Get the settings file path (config.toml)
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("zabbix-migrate.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Ok(config_dir)
    }
}

/// Connection settings for the Zabbix API
///
/// Loaded from `config.toml` when present, then overridden by the
/// `ZABBIX_API_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Host name, `host:port`, or full base URL of the Zabbix frontend
    #[serde(default = "default_server")]
    pub server: String,

    #[serde(default = "default_user")]
    pub user: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Verify TLS certificates for https endpoints
    #[serde(default = "default_true")]
    pub verify_tls: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_server() -> String {
    "zabbix-web".to_string()
}

fn default_user() -> String {
    "Admin".to_string()
}

fn default_password() -> String {
    "zabbix".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server: default_server(),
            user: default_user(),
            password: default_password(),
            verify_tls: default_true(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Settings {
    /// Load settings from the default location and the environment
    pub fn load() -> Result<Self> {
        let mut settings = Self::load_file(&ConfigManager::settings_path()?)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Read a settings file; a missing file yields the defaults
    pub fn load_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Override fields from environment variables looked up through `var`
    pub fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = var("ZABBIX_API_SERVER") {
            self.server = server;
        }
        if let Some(user) = var("ZABBIX_API_USER") {
            self.user = user;
        }
        if let Some(password) = var("ZABBIX_API_PASS") {
            self.password = password;
        }
        if let Some(verify) = var("ZABBIX_VERIFY_TLS") {
            self.verify_tls = parse_bool(&verify)
                .with_context(|| format!("Invalid ZABBIX_VERIFY_TLS value: {verify}"))?;
        }
        if let Some(timeout) = var("ZABBIX_API_TIMEOUT_SECS") {
            self.timeout_secs = timeout
                .trim()
                .parse()
                .with_context(|| format!("Invalid ZABBIX_API_TIMEOUT_SECS value: {timeout}"))?;
        }
        Ok(())
    }

    /// JSON-RPC endpoint derived from `server`
    pub fn api_url(&self) -> String {
        let base = if self.server.contains("://") {
            self.server.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", self.server.trim_end_matches('/'))
        };

        if base.ends_with("api_jsonrpc.php") {
            base
        } else {
            format!("{base}/api_jsonrpc.php")
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
