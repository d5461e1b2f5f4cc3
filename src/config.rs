// =============================================================================
// CONFIGURATION - Load startup settings from config.toml
// =============================================================================
//
// Everything the initialization sequence needs to know up front (window
// size, diagnostic layers, required device extensions, shader locations)
// lives here and is handed to the renderer explicitly.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    pub window: WindowConfig,
    pub validation: ValidationConfig,
    pub device: DeviceConfig,
    pub shaders: ShaderConfig,
}

/// Names reported to the driver in the application info
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub engine_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Hello Triangle".to_string(),
            engine_name: "No Engine".to_string(),
        }
    }
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Diagnostic layer settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub layers: Vec<String>,
    /// Fail before instance creation when a requested layer is missing.
    /// Off by default: the layer check only reports.
    pub strict: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            strict: false,
        }
    }
}

/// Physical device requirements
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub extensions: Vec<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["VK_KHR_swapchain".to_string()],
        }
    }
}

/// Compiled SPIR-V locations
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/triangle.vert.spv"),
            fragment: PathBuf::from("shaders/triangle.frag.spv"),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Diagnostics only run in debug builds, and only when asked for.
    pub fn validation_enabled(&self) -> bool {
        cfg!(debug_assertions) && self.validation.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert!(!config.window.resizable);
        assert_eq!(config.validation.layers, vec!["VK_LAYER_KHRONOS_validation"]);
        assert!(!config.validation.strict);
        assert_eq!(config.device.extensions, vec!["VK_KHR_swapchain"]);
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/triangle.vert.spv"));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::parse(
            r#"
            [window]
            width = 1024

            [validation]
            strict = true
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.window.title, "Vulkan");
        assert!(config.validation.strict);
        assert!(config.validation.enabled);
        assert_eq!(config.app.name, "Hello Triangle");
    }

    #[test]
    fn lists_replace_defaults() {
        let config = Config::parse(
            r#"
            [validation]
            layers = []

            [device]
            extensions = ["VK_KHR_swapchain", "VK_KHR_maintenance1"]
            "#,
        )
        .unwrap();

        assert!(config.validation.layers.is_empty());
        assert_eq!(config.device.extensions.len(), 2);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(Config::parse("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load_from_path("does/not/exist/config.toml").unwrap();
        assert_eq!(config.window.title, "Vulkan");
    }

    #[test]
    fn validation_follows_build_profile() {
        let mut config = Config::default();
        assert_eq!(config.validation_enabled(), cfg!(debug_assertions));
        config.validation.enabled = false;
        assert!(!config.validation_enabled());
    }
}
