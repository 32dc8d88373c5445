//! Configuration loading and management

use std::path::Path;

use anyhow::{Context, Result};
use ciclomap_core::SyncConfig;
use serde::{Deserialize, Serialize};

/// Main configuration for the local client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Shared collection settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Initial map camera
    #[serde(default)]
    pub map: MapConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    /// Camera center latitude
    #[serde(default = "default_center_lat")]
    pub center_lat: f64,

    /// Camera center longitude
    #[serde(default = "default_center_lng")]
    pub center_lng: f64,

    /// Camera zoom level
    #[serde(default = "default_zoom")]
    pub zoom: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center_lat: default_center_lat(),
            center_lng: default_center_lng(),
            zoom: default_zoom(),
        }
    }
}

fn default_center_lat() -> f64 {
    -26.9935
}

fn default_center_lng() -> f64 {
    -48.6346
}

fn default_zoom() -> f32 {
    14.0
}

impl Config {
    /// Load configuration from the config directory
    pub fn load(config_dir: &Path) -> Result<Self> {
        let config_file = config_dir.join("config.json");

        if config_file.exists() {
            let content = std::fs::read_to_string(&config_file)
                .with_context(|| format!("Failed to read config file: {:?}", config_file))?;
            let config: Config =
                serde_json::from_str(&content).with_context(|| "Failed to parse config.json")?;
            tracing::info!("Loaded configuration from {:?}", config_file);
            Ok(config)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_file);
            let config = Config::default();

            std::fs::create_dir_all(config_dir)
                .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;

            // Write default config for reference
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(&config_file, content)
                .with_context(|| format!("Failed to write default config: {:?}", config_file))?;
            tracing::info!("Created default config at {:?}", config_file);

            Ok(config)
        }
    }
}
