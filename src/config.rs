//! Configuration management for tiledewarp

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::coeffs::validate_tile_size;
use crate::color::{ColorSpace, QuantizationRange};
use crate::lens::RadialLens;
use crate::warp::Implementation;

/// Tile grid settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TilingConfig {
    /// Destination tile side in luma pixels (power of two, 4-128)
    pub tile_size: u32,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self { tile_size: 32 }
    }
}

/// How frames are rendered
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingConfig {
    #[serde(default)]
    pub implementation: Implementation,

    /// Render rows of tiles on the rayon pool
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Worker threads, 0 lets rayon decide
    #[serde(default)]
    pub threads: usize,
}

fn default_parallel() -> bool {
    true
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            implementation: Implementation::default(),
            parallel: true,
            threads: 0,
        }
    }
}

/// RGB <-> NV12 conversion settings for image files
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColorConfig {
    #[serde(default)]
    pub color_space: ColorSpace,

    #[serde(default)]
    pub range: QuantizationRange,
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub tiling: TilingConfig,

    /// Lens model used when no coefficient table file is supplied
    #[serde(default)]
    pub lens: RadialLens,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub color: ColorConfig,
}

impl Config {
    /// Load configuration from a file, or create default if it doesn't exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {:?}", path))?;
            let config = Self::parse(&content)
                .with_context(|| format!("Failed to parse config from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            tracing::info!("Created default configuration at {:?}", path);
            Ok(config)
        }
    }

    /// Parse and validate TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_tile_size(self.tiling.tile_size)?;
        if self.lens.zoom.is_nan() || self.lens.zoom <= 0.0 {
            anyhow::bail!("lens zoom must be positive, got {}", self.lens.zoom);
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {:?}", path))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
