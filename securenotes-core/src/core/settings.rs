//! Store location settings.
//!
//! Stores where notes and keys live in a JSON file at an OS-appropriate
//! location.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

/// Persisted store settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    /// Private directory holding the note files and the index.
    pub data_directory: PathBuf,
    /// Directory holding the wrapped per-note keys.
    pub key_directory: PathBuf,
}

impl Default for StoreSettings {
    fn default() -> Self {
        let root = default_root_directory();
        Self {
            data_directory: root.join("notes"),
            key_directory: root.join("keys"),
        }
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/securenotes/settings.json`
/// - Windows: `%APPDATA%/SecureNotes/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("SecureNotes").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("securenotes").join("settings.json")
    }
}

/// Returns the default root for notes and keys: `<data dir>/securenotes`.
pub fn default_root_directory() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".local")
                .join("share")
        })
        .join("securenotes")
}

/// Loads settings from the default location.
pub fn load_settings() -> StoreSettings {
    load_settings_from(&settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from(path: &Path) -> StoreSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring unreadable settings at {}: {e}", path.display());
            StoreSettings::default()
        }),
        Err(_) => StoreSettings::default(),
    }
}

/// Saves settings to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`crate::NoteStoreError::Io`] if the directory or file cannot be
/// written.
pub fn save_settings(path: &Path, settings: &StoreSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}
