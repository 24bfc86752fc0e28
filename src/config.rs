//! Configuration for the padding routine
//!
//! A `PadConfig` can be built from the defaults, read from a JSON file, and
//! then overridden from the command line. Every field falls back to the
//! values the tool has always used, so an empty `{}` file is valid.

use crate::error::PadError;
use crate::padded_logo::PadOptions;
use anyhow::{Context, Result};
use image::Rgb;
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DEFAULT_SOURCE_PATH: &str = "assets/logo.jpeg";
pub const DEFAULT_DESTINATION_PATH: &str = "assets/logo_padded.png";
/// Margin on each side, as a fraction of the canvas. 0.20 leaves the logo
/// covering 60% of each dimension.
pub const DEFAULT_PADDING_RATIO: f64 = 0.20;
pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";

/// How the source alpha channel is treated when pasted onto the canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AlphaMode {
    /// Copy the color channels and drop alpha, onto an RGB canvas.
    #[default]
    Discard,
    /// Blend the source over the background, onto an RGB canvas.
    Flatten,
    /// Copy RGBA pixels as they are, onto an RGBA canvas.
    Preserve,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PadConfig {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub padding_ratio: f64,
    /// Any CSS color string, e.g. `#fff`, `white` or `rgb(255, 255, 255)`.
    pub background_color: String,
    pub alpha_mode: AlphaMode,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            destination_path: PathBuf::from(DEFAULT_DESTINATION_PATH),
            padding_ratio: DEFAULT_PADDING_RATIO,
            background_color: DEFAULT_BACKGROUND_COLOR.to_string(),
            alpha_mode: AlphaMode::default(),
        }
    }
}

impl PadConfig {
    /// Read a JSON config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config = serde_json::from_str(raw).context("Invalid config JSON")?;
        Ok(config)
    }

    /// Validate the config and turn it into the options the compositor uses.
    pub fn options(&self) -> Result<PadOptions, PadError> {
        PadOptions::new(
            self.padding_ratio,
            parse_color(&self.background_color)?,
            self.alpha_mode,
        )
    }
}

/// Parse a CSS color into an opaque RGB pixel. Any alpha in the string is
/// ignored since the canvas background is always opaque.
pub fn parse_color(color: &str) -> Result<Rgb<u8>, PadError> {
    let color = css_color::Srgb::from_str(color.trim())
        .map_err(|_| PadError::InvalidColor(color.to_string()))?;

    Ok(Rgb([
        channel_to_u8(color.red),
        channel_to_u8(color.green),
        channel_to_u8(color.blue),
    ]))
}

fn channel_to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.).round() as u8
}
