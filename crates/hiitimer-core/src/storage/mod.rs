mod config;
pub mod database;
pub mod migrations;

pub use config::{Config, ConfigFile, SessionConfig};
pub use database::{Database, SessionRecord, SessionStats};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Returns `~/.config/hiitimer[-dev]/` based on HIITIMER_ENV.
///
/// Set HIITIMER_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("HIITIMER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("hiitimer-dev")
    } else {
        base_dir.join("hiitimer")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
