// src/config/mod.rs
//
// Application settings
//
// Loaded from TOML. Every section and field has a default so a partial
// (or missing) settings file is valid.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, AppResult};

/// Settings shared between services. Each operation snapshots it once.
pub type SharedSettings = Arc<RwLock<Settings>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub anidb: AniDbSettings,
    #[serde(default)]
    pub trakt: TraktSettings,
    #[serde(default)]
    pub playback: PlaybackSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Remote "my list" service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AniDbSettings {
    #[serde(default = "default_true")]
    pub my_list_set_watched: bool,
    #[serde(default = "default_true")]
    pub my_list_set_unwatched: bool,
}

/// Remote episode-history tracker
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraktSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub auth_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Fraction of the duration after which progress marks a file watched
    #[serde(default = "default_auto_watch_threshold")]
    pub auto_watch_threshold: f64,
    #[serde(default)]
    pub reset_resume_on_watched_change: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_true() -> bool {
    true
}

fn default_auto_watch_threshold() -> f64 {
    0.975
}

fn default_max_connections() -> u32 {
    15
}

impl Default for AniDbSettings {
    fn default() -> Self {
        Self {
            my_list_set_watched: true,
            my_list_set_unwatched: true,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            auto_watch_threshold: default_auto_watch_threshold(),
            reset_resume_on_watched_change: false,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: default_max_connections(),
        }
    }
}

impl TraktSettings {
    /// History sync needs the integration on and a token present.
    pub fn can_sync(&self) -> bool {
        self.enabled && !self.auth_token.trim().is_empty()
    }
}

impl AniDbSettings {
    pub fn allows(&self, watched: bool) -> bool {
        if watched {
            self.my_list_set_watched
        } else {
            self.my_list_set_unwatched
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Missing file yields defaults; a malformed file is still an error.
    pub fn load_or_default(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            log::info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn default_path() -> AppResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::Config("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("watchhub").join("settings.toml"))
    }

    pub fn shared(self) -> SharedSettings {
        Arc::new(RwLock::new(self))
    }
}
