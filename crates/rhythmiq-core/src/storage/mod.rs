mod backend;
mod config;
pub mod database;
pub mod migrations;

pub use backend::LocalBackend;
pub use config::{Config, FeedConfig, LeaderboardConfig};
pub use database::{Database, User};

use std::path::PathBuf;

use crate::error::{ConfigError, CoreError};

/// Returns `~/.config/rhythmiq[-dev]/` based on RHYTHMIQ_ENV.
///
/// Set RHYTHMIQ_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if the home directory cannot be determined or if
/// creating the directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let base_dir = dirs::home_dir().ok_or(ConfigError::NoDataDir)?.join(".config");

    let env = std::env::var("RHYTHMIQ_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("rhythmiq-dev")
    } else {
        base_dir.join("rhythmiq")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
