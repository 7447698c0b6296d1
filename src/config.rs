use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::state::DEFAULT_FLAG_URL_TEMPLATE;

/// Launcher configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub launcher: LauncherConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// Launcher behavior settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Language used before the backend reports one; overrides the OS locale
    #[serde(default)]
    pub language: Option<String>,
}

/// Catalog presentation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory with bundled `<FLAG>.svg` images
    #[serde(default)]
    pub flags_dir: Option<String>,
    /// Remote flag URL, `{flag}` is replaced with the country code
    #[serde(default = "default_flag_url_template")]
    pub flag_url_template: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            flags_dir: None,
            flag_url_template: default_flag_url_template(),
        }
    }
}

fn default_flag_url_template() -> String {
    DEFAULT_FLAG_URL_TEMPLATE.to_string()
}

/// External backend process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Program to spawn
    #[serde(default = "default_backend_command")]
    pub command: String,
    /// Arguments passed to the program
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: default_backend_command(),
            args: Vec::new(),
        }
    }
}

fn default_backend_command() -> String {
    "limbus-backend".to_string()
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "limbus", "LimbusLauncher")
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        let config_dir = dirs.config_dir();
        std::fs::create_dir_all(config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, or defaults if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {:?}", path))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("Invalid config in {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            tracing::info!("No configuration file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
