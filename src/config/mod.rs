//! Configuration and persisted client state
//!
//! Two durable entries live under the config directory: `config.toml`
//! (theme preference, backend override, the provider-owned identity
//! record) and the `token` file owned by the token store.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::Identity;

/// Hosted Snippy backend.
pub const DEFAULT_API_BASE: &str = "https://snippy-backend-1.onrender.com/api";

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// UI theme preference, "dark" or "light"
    pub theme: Option<String>,
    /// Backend base URL override (defaults to the hosted service)
    pub api_base: Option<String>,
    /// Signed-in identity record, owned by the identity provider adapter
    pub identity: Option<Identity>,
}

impl Config {
    /// Get config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "snippy-cli", "snippy-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path of the bearer-token file next to the config file.
    pub fn token_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("token"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the
        // provider refresh token)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Resolved backend base URL, without a trailing slash.
    pub fn api_base(&self) -> String {
        let base = self.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        base.trim_end_matches('/').to_string()
    }

    /// Current theme preference; "light" when unset.
    pub fn current_theme(&self) -> &str {
        self.theme.as_deref().unwrap_or("light")
    }
}

/// `theme` command: print the preference, or set it to "dark"/"light".
pub fn theme_preference(set: Option<String>) -> Result<()> {
    let mut config = Config::load()?;
    match set {
        Some(value) => {
            if value != "dark" && value != "light" {
                anyhow::bail!("Theme must be \"dark\" or \"light\", got \"{}\"", value);
            }
            config.theme = Some(value.clone());
            config.save()?;
            println!("Theme set to {}.", value);
        }
        None => {
            println!("{}", config.current_theme());
        }
    }
    Ok(())
}
