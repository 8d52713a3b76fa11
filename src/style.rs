//! Declarative overlay style table
//!
//! Loaded once per run from JSON (the brand style guide format) or TOML.
//! Accepts the style guide's `text_colors` / `text_positions` keys as aliases.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::layout::Position;

/// Size name used when none is requested
pub const DEFAULT_SIZE: &str = "medium";

/// Colors, positions, sizes and timings used by the layout engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Fill colors (ffmpeg color names or `#RRGGBB`)
    #[serde(alias = "text_colors", default = "default_colors")]
    pub colors: Vec<String>,
    #[serde(alias = "text_positions", default = "default_positions")]
    pub positions: Vec<Position>,
    /// Size name -> font size in pixels; must contain "medium"
    #[serde(default = "default_font_sizes")]
    pub font_sizes: BTreeMap<String, u32>,
    #[serde(default = "default_fade")]
    pub fade_in_s: f64,
    #[serde(default = "default_fade")]
    pub fade_out_s: f64,
    /// Cross-fade between consecutive carousel images
    #[serde(default = "default_fade")]
    pub crossfade_s: f64,
    /// Fade of the picture itself at both ends of a video
    #[serde(default = "default_fade")]
    pub clip_fade_s: f64,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: u32,
    /// Distance from frame edges in pixels
    #[serde(default = "default_margin")]
    pub margin: u32,
    /// Estimated glyph width as a fraction of font size
    #[serde(default = "default_char_width_ratio")]
    pub char_width_ratio: f64,
    /// Share of frame width available to a line
    #[serde(default = "default_width_budget")]
    pub width_budget: f64,
    /// Line height as a multiple of font size
    #[serde(default = "default_line_spacing")]
    pub line_spacing: f64,
}

fn default_colors() -> Vec<String> {
    ["white", "#FFE5B4", "#FFB6C1", "#ADD8E6"]
        .iter()
        .map(|s| (*s).to_string())
        .collect()
}

fn default_positions() -> Vec<Position> {
    vec![
        Position::Bottom,
        Position::Center,
        Position::TopLeft,
        Position::TopRight,
    ]
}

fn default_font_sizes() -> BTreeMap<String, u32> {
    BTreeMap::from([
        ("small".to_string(), 40),
        ("medium".to_string(), 60),
        ("large".to_string(), 80),
    ])
}

fn default_fade() -> f64 {
    0.5
}

fn default_stroke_color() -> String {
    "black".to_string()
}

fn default_stroke_width() -> u32 {
    2
}

fn default_margin() -> u32 {
    50
}

fn default_char_width_ratio() -> f64 {
    0.6
}

fn default_width_budget() -> f64 {
    0.9
}

fn default_line_spacing() -> f64 {
    1.2
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            positions: default_positions(),
            font_sizes: default_font_sizes(),
            fade_in_s: default_fade(),
            fade_out_s: default_fade(),
            crossfade_s: default_fade(),
            clip_fade_s: default_fade(),
            stroke_color: default_stroke_color(),
            stroke_width: default_stroke_width(),
            margin: default_margin(),
            char_width_ratio: default_char_width_ratio(),
            width_budget: default_width_budget(),
            line_spacing: default_line_spacing(),
        }
    }
}

impl StyleConfig {
    /// Load and validate a style table. `.json` files are parsed as JSON,
    /// anything else as TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("failed to read style {}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let style: Self = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                PipelineError::Configuration(format!("invalid JSON in {}: {e}", path.display()))
            })?
        } else {
            toml::from_str(&content).map_err(|e| {
                PipelineError::Configuration(format!("invalid TOML in {}: {e}", path.display()))
            })?
        };

        style.validate()?;
        info!(
            "Loaded style from {} ({} colors, {} positions)",
            path.display(),
            style.colors.len(),
            style.positions.len()
        );
        Ok(style)
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(PipelineError::Configuration(format!("style: {msg}")));

        if self.colors.is_empty() || self.colors.iter().any(|c| c.trim().is_empty()) {
            return bad("colors must be a non-empty list of non-empty strings".into());
        }
        if self.positions.is_empty() {
            return bad("positions must not be empty".into());
        }
        match self.font_sizes.get(DEFAULT_SIZE) {
            Some(size) if *size > 0 => {}
            _ => return bad(format!("font_sizes needs a positive \"{DEFAULT_SIZE}\" entry")),
        }
        for (name, value) in [
            ("fade_in_s", self.fade_in_s),
            ("fade_out_s", self.fade_out_s),
            ("crossfade_s", self.crossfade_s),
            ("clip_fade_s", self.clip_fade_s),
        ] {
            if !value.is_finite() || value < 0.0 {
                return bad(format!("{name} must be a non-negative number, got {value}"));
            }
        }
        if !(self.char_width_ratio.is_finite() && self.char_width_ratio > 0.0) {
            return bad("char_width_ratio must be positive".into());
        }
        if !(self.width_budget > 0.0 && self.width_budget <= 1.0) {
            return bad("width_budget must be in (0, 1]".into());
        }
        if !(self.line_spacing.is_finite() && self.line_spacing >= 1.0) {
            return bad("line_spacing must be at least 1.0".into());
        }
        Ok(())
    }

    /// Font size for `name`, falling back to "medium"
    #[must_use]
    pub fn font_size(&self, name: &str) -> u32 {
        self.font_sizes
            .get(name)
            .or_else(|| self.font_sizes.get(DEFAULT_SIZE))
            .copied()
            .unwrap_or(60)
    }
}
