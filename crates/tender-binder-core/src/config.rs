use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory holding one numbered folder per tender section,
    /// each with exactly one canonical PDF
    #[serde(default = "default_sections_dir")]
    pub sections_dir: PathBuf,

    /// SQLite database file holding uploaded section images
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory where the merged binder is written after each edit
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Byte target for images embedded into section pages
    #[serde(default = "default_inline_target_bytes")]
    pub inline_target_bytes: usize,

    /// Size cap the download negotiator tries to stay under
    #[serde(default = "default_merged_cap_bytes")]
    pub merged_cap_bytes: usize,

    /// Quality used when rebuilding the binder after an image edit
    #[serde(default = "default_rebuild_quality")]
    pub rebuild_quality: u8,
}

fn default_sections_dir() -> PathBuf {
    PathBuf::from("tender")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tender_images.db")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("tender-output")
}

const fn default_inline_target_bytes() -> usize {
    15 * 1024
}

const fn default_merged_cap_bytes() -> usize {
    4 * 1024 * 1024
}

const fn default_rebuild_quality() -> u8 {
    75
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sections_dir: default_sections_dir(),
            database_path: default_database_path(),
            output_dir: default_output_dir(),
            inline_target_bytes: default_inline_target_bytes(),
            merged_cap_bytes: default_merged_cap_bytes(),
            rebuild_quality: default_rebuild_quality(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, crate::error::Error> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::error::Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        toml::from_str(&content)
            .map_err(|e| crate::error::Error::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from default locations (~/.config/tender-binder/config.toml, ./config.toml)
    pub fn load() -> Self {
        // Try user config
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("tender-binder").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Try local config
        let local_config = std::path::PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        // Return defaults
        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}
