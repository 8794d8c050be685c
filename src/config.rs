//! Configuration loading and persistence.
//!
//! Reads `config.json` from the config directory, then applies `CANVAS_*`
//! environment overrides. A missing or unreadable file falls back to the
//! defaults in [`crate::constants`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::constants::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, DEFAULT_HOST, DEFAULT_PORT};
use crate::framing::FramingMode;

/// File name inside the config directory.
const CONFIG_FILE: &str = "config.json";

/// Configuration for the canvas client.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Relay host name or address.
    pub host: String,
    /// Relay TCP port.
    pub port: u16,
    /// Picture width in pixels.
    pub width: u32,
    /// Picture height in pixels.
    pub height: u32,
    /// How the inbound stream is cut into commands.
    pub framing: FramingMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            width: DEFAULT_CANVAS_WIDTH,
            height: DEFAULT_CANVAS_HEIGHT,
            framing: FramingMode::Legacy,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `CANVAS_CONFIG_DIR` wins; otherwise the platform config dir
    /// (for example `~/.config/canvas-sync`).
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("CANVAS_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("canvas-sync")
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config dir {}", dir.display()))?;
        Ok(dir)
    }

    /// Loads configuration from the config directory, with environment
    /// variable overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_dir()?.join(CONFIG_FILE);
        let mut config = Self::load_from(&path).unwrap_or_else(|e| {
            log::debug!("[Config] Using defaults: {e:#}");
            Self::default()
        });
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads configuration from an explicit file. No env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("CANVAS_HOST") {
            self.host = host;
        }

        if let Ok(port) = std::env::var("CANVAS_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = port,
                Err(_) => log::warn!("[Config] Ignoring invalid CANVAS_PORT={}", port),
            }
        }

        if let Ok(width) = std::env::var("CANVAS_WIDTH") {
            if let Ok(width) = width.parse::<u32>() {
                self.width = width;
            }
        }

        if let Ok(height) = std::env::var("CANVAS_HEIGHT") {
            if let Ok(height) = height.parse::<u32>() {
                self.height = height;
            }
        }

        if let Ok(framing) = std::env::var("CANVAS_FRAMING") {
            match framing.parse::<FramingMode>() {
                Ok(mode) => self.framing = mode,
                Err(e) => log::warn!("[Config] Ignoring CANVAS_FRAMING: {e}"),
            }
        }
    }

    /// Persists the current configuration to the config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Persists the current configuration to an explicit file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
