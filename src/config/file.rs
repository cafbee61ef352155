//! Configuration file management for wavedeck.
//!
//! Loads and saves application configuration from a TOML file in the
//! user's config directory. Every field has a serde default so a partial
//! file keeps working across upgrades.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Audio output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio output device to use. Options:
    /// - "default" for the system default device
    /// - numeric index (0, 1, 2, etc.) from `wavedeck list-devices`
    /// - device name from `wavedeck list-devices`
    #[serde(default = "default_device")]
    pub device: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
        }
    }
}

/// Waveform display configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Paint envelope columns incrementally between event-loop turns
    /// instead of all at once. Set to false for strictly synchronous
    /// rendering; an explicit false is honored.
    #[serde(default = "default_render_async")]
    pub render_async: bool,
    /// Number of evenly spaced vertical gridline divisions
    #[serde(default = "default_vertical_divisions")]
    pub vertical_divisions: u16,
    /// Pixel spacing between horizontal gridlines
    #[serde(default = "default_horizontal_grid_spacing")]
    pub horizontal_grid_spacing: u16,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            render_async: default_render_async(),
            vertical_divisions: default_vertical_divisions(),
            horizontal_grid_spacing: default_horizontal_grid_spacing(),
        }
    }
}

fn default_device() -> String {
    "default".to_string()
}

fn default_render_async() -> bool {
    true
}

fn default_vertical_divisions() -> u16 {
    10
}

fn default_horizontal_grid_spacing() -> u16 {
    16
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WavedeckConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

impl WavedeckConfig {
    /// Loads configuration from the user's config directory, writing the
    /// default file on first run.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;

        if !config_path.exists() {
            let config = WavedeckConfig::default();
            config.save()?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        let config_content = fs::read_to_string(&config_path)?;
        let config: WavedeckConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

/// Retrieves the path to the config file, creating the directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
    let config_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    let config_path = config_dir
        .join(".config")
        .join("wavedeck")
        .join("wavedeck.toml");

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(config_path)
}
