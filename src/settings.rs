//! Persistent settings for the viewer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::graph::config::SimulationConfig;
use crate::graph::interaction::LabelPrecedence;
use crate::theme::ThemeMode;

/// Overrides `api_url` when set
pub const API_URL_ENV: &str = "NETGRAPH_API_URL";
/// Overrides `database_url` when set
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

const DEFAULT_API_URL: &str = "http://127.0.0.1:6500";
const DEFAULT_DATABASE_URL: &str = "postgres://localhost/netgraph";

/// Where node snapshots come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceKind {
    #[default]
    Api,
    Database,
}

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Api => "HTTP API",
            SourceKind::Database => "PostgreSQL",
        }
    }

    pub fn all() -> &'static [SourceKind] {
        &[SourceKind::Api, SourceKind::Database]
    }
}

/// All persistable UI settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Data source
    pub source: SourceKind,
    pub api_url: String,
    pub database_url: String,

    // Layout and rendering
    pub simulation: SimulationConfig,
    pub label_precedence: LabelPrecedence,
    pub theme: ThemeMode,

    /// Restored and focused on the next start
    pub selected_node: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: SourceKind::Api,
            api_url: DEFAULT_API_URL.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            simulation: SimulationConfig::default(),
            label_precedence: LabelPrecedence::default(),
            theme: ThemeMode::default(),
            selected_node: None,
        }
    }
}

impl Settings {
    /// Get the path to the settings file
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("netgraph-native");
            p.push("settings.json");
            p
        })
    }

    /// Effective API base URL, honoring [`API_URL_ENV`]
    pub fn api_url(&self) -> String {
        env_or(std::env::var(API_URL_ENV).ok(), &self.api_url)
    }

    /// Effective database URL, honoring [`DATABASE_URL_ENV`]
    pub fn database_url(&self) -> String {
        env_or(std::env::var(DATABASE_URL_ENV).ok(), &self.database_url)
    }

    /// Load settings from disk, returning defaults if file doesn't exist or is invalid
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            warn!("Could not determine config directory, using defaults");
            return Self::default();
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(mut settings) => {
                    settings.simulation = settings.simulation.sanitized();
                    info!(path = %path.display(), "Loaded settings");
                    settings
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse settings file, using defaults");
                    Self::default()
                }
            },
            // File doesn't exist yet, that's fine
            Err(_) => Self::default(),
        }
    }

    /// Save settings to disk
    pub fn save(&self) {
        let Some(path) = Self::config_path() else {
            warn!("Could not determine config directory, settings not saved");
            return;
        };
        self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) {
        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(error = %e, "Failed to create config directory");
                return;
            }
        }

        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!(error = %e, "Failed to write settings file");
                } else {
                    info!(path = %path.display(), "Saved settings");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize settings"),
        }
    }
}

/// A non-blank environment value wins over the stored one
fn env_or(value: Option<String>, stored: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| stored.to_string())
}
