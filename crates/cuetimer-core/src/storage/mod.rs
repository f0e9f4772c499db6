mod config;
pub mod database;

pub use config::{Config, NotificationsConfig, TimerConfig, UiConfig};
pub use database::Database;

use std::path::PathBuf;

/// Returns `~/.config/cuetimer[-dev]/` based on CUETIMER_ENV.
///
/// Set CUETIMER_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("CUETIMER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("cuetimer-dev")
    } else {
        base_dir.join("cuetimer")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
