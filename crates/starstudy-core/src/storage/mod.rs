mod config;
pub mod database;
pub mod encrypted;

pub use config::{
    Config, LoggingConfig, NotificationsConfig, RemoteConfig, SessionConfig, StorageConfig,
    API_KEY_ENV, ENDPOINT_ENV, SECRET_ENV,
};
pub use database::{Database, KvNamespace, MemoryKv};
pub use encrypted::EncryptedStore;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory, creating it if needed.
///
/// `STARSTUDY_HOME` wins outright. Otherwise `~/.config/starstudy`, or
/// `~/.config/starstudy-dev` when `STARSTUDY_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("STARSTUDY_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("STARSTUDY_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("starstudy-dev")
            } else {
                base_dir.join("starstudy")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
