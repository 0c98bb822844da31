// Process settings
// Loaded from ~/.config/consulta/settings.json

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "consulta";

pub const ENV_DB_PATH: &str = "CONSULTA_DB_PATH";
pub const ENV_PORTALS: &str = "CONSULTA_PORTALS";
pub const ENV_RETENTION_DAYS: &str = "CONSULTA_RETENTION_DAYS";

#[derive(Debug)]
pub enum SettingsError {
    Io(String),
    Parse(String),
    /// An environment override could not be parsed.
    InvalidOverride { var: String, value: String },
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "settings IO error: {msg}"),
            Self::Parse(msg) => write!(f, "settings parse error: {msg}"),
            Self::InvalidOverride { var, value } => write!(f, "invalid value for {var}: '{value}'"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Store
    #[serde(rename = "store.path")]
    pub db_path: Option<PathBuf>,  // None = <data_dir>/consulta/consulta.db

    #[serde(rename = "store.retentionDays")]
    pub retention_days: u32,

    // Portals
    #[serde(rename = "portals.file")]
    pub portals_file: Option<PathBuf>,  // None = <config_dir>/consulta/portals.toml

    // Query
    #[serde(rename = "query.timeoutMs")]
    pub timeout_ms: Option<u64>,  // None = per-portal timeout
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: None,
            retention_days: 30,
            portals_file: None,
            timeout_ms: None,
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        config_dir().join("settings.json")
    }

    /// Load settings from disk plus environment overrides, falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load() -> Result<Self, SettingsError> {
        let path = Self::config_path();
        let mut settings = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                warn!("{e}; using default settings");
                Self::default()
            })
        } else {
            Self::default()
        };
        settings.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(settings)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(format!("{}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, SettingsError> {
        // Strip comments (lines starting with //)
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Apply `CONSULTA_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.db_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_PORTALS).filter(|v| !v.is_empty()) {
            self.portals_file = Some(PathBuf::from(path));
        }
        if let Some(days) = lookup(ENV_RETENTION_DAYS) {
            self.retention_days = days.trim().parse().map_err(|_| SettingsError::InvalidOverride {
                var: ENV_RETENTION_DAYS.to_string(),
                value: days.clone(),
            })?;
        }
        Ok(())
    }

    /// Save current settings to disk
    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::Io(e.to_string()))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        fs::write(path, json).map_err(|e| SettingsError::Io(e.to_string()))
    }

    pub fn effective_db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR)
                .join("consulta.db")
        })
    }

    pub fn effective_portals_file(&self) -> PathBuf {
        self.portals_file
            .clone()
            .unwrap_or_else(|| config_dir().join("portals.toml"))
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
