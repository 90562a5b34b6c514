//! Configuration loading helpers
//!
//! Both agents resolve their configuration file with the same priority
//! order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. User config directory (`~/.config/<app>/config.toml`)
//! 4. System config (`/etc/<app>/config.toml`)
//!
//! A missing file is not an error: agents fall back to compiled defaults so
//! each one stays independently operable.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Message channel configuration shared by both agents
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Path to the shared SQLite message store
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// OS-dependent default location for the shared message store
fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("vita").join("channel.db"))
        .unwrap_or_else(|| PathBuf::from("./vita-data/channel.db"))
}

/// Resolve the configuration file path for an agent
///
/// Returns `None` when no candidate exists; the caller uses compiled
/// defaults in that case.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join(app_name).join("config.toml")) {
        if path.exists() {
            return Some(path);
        }
    }

    // Priority 4: System config
    let system = PathBuf::from("/etc").join(app_name).join("config.toml");
    if system.exists() {
        return Some(system);
    }

    None
}

/// Load a TOML config, falling back to `Default` when no path resolved
///
/// # Errors
/// `Error::Config` when a resolved file cannot be read or parsed. A file
/// the operator pointed at explicitly failing to parse is a hard error, not
/// a silent fallback.
pub fn load_config<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            let content = std::fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read {}: {e}", path.display()))
            })?;
            toml::from_str(&content)
                .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
        }
        None => {
            debug!("No configuration file found, using compiled defaults");
            Ok(T::default())
        }
    }
}
