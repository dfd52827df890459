//! Engine configuration and persisted settings.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::guard::normalize_path;

/// Where the engine keeps its state and how search behaves.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Directory holding the action log, settings and (by default) the trash.
    pub data_dir: PathBuf,

    /// Trash location (defaults to `<data_dir>/trash`).
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub trash_dir: Option<PathBuf>,

    /// Action log database (defaults to `<data_dir>/actions.db`).
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub log_path: Option<PathBuf>,

    /// Settings file (defaults to `<data_dir>/settings.toml`).
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub settings_path: Option<PathBuf>,

    /// Include hidden files in search results.
    #[builder(default = "true")]
    #[serde(default = "default_true")]
    pub search_include_hidden: bool,

    /// Maximum search depth below the search root (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub search_max_depth: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.data_dir {
            Some(ref dir) if dir.as_os_str().is_empty() => {
                Err("Data directory cannot be empty".to_string())
            }
            Some(_) => Ok(()),
            None => Err("Data directory is required".to_string()),
        }
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Create a config with every location derived from `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            trash_dir: None,
            log_path: None,
            settings_path: None,
            search_include_hidden: true,
            search_max_depth: None,
        }
    }

    /// Platform data directory for fileward.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fileward")
    }

    /// Anchor every configured location to the current directory.
    ///
    /// Root checks are lexical, so the engine only works with absolute
    /// locations.
    pub fn into_absolute(self) -> EngineResult<Self> {
        fn anchor(path: PathBuf) -> EngineResult<PathBuf> {
            std::path::absolute(&path)
                .map(normalize_path)
                .map_err(|e| EngineError::io(path, e))
        }

        Ok(Self {
            data_dir: anchor(self.data_dir)?,
            trash_dir: self.trash_dir.map(anchor).transpose()?,
            log_path: self.log_path.map(anchor).transpose()?,
            settings_path: self.settings_path.map(anchor).transpose()?,
            ..self
        })
    }

    /// Resolved trash location.
    pub fn trash_root(&self) -> PathBuf {
        self.trash_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("trash"))
    }

    /// Resolved action log database path.
    pub fn log_file(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("actions.db"))
    }

    /// Resolved settings file path.
    pub fn settings_file(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("settings.toml"))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(Self::default_data_dir())
    }
}

/// State that must survive restarts: allowed roots and favorites.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Allowed root directories.
    pub roots: Vec<PathBuf>,
    /// Favorite locations.
    pub favorites: Vec<PathBuf>,
}

impl Settings {
    /// Load settings from disk, or return defaults.
    pub fn load(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };

        match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }
        }
    }

    /// Save settings to disk, replacing the previous file in one rename.
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
        }

        let content = toml::to_string_pretty(self).map_err(|e| EngineError::Settings {
            message: e.to_string(),
        })?;

        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, content).map_err(|e| EngineError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| EngineError::io(path, e))
    }
}
