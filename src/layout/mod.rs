//! Overlay text layout
//!
//! Turns a short overlay phrase, a frame size and the style table into a
//! concrete [`LayoutPlan`]: fill color, anchor position, font size, wrapped
//! lines, stroke and fade timing.
//!
//! Only color and position are random; wrapping, sizing, stroke and fades are
//! fixed functions of the inputs.
//!
//! # Example
//!
//! ```rust
//! use promoreel::layout::TextLayoutEngine;
//! use promoreel::style::StyleConfig;
//! use rand::SeedableRng;
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let plan = TextLayoutEngine::new()
//!     .plan("Твой идеальный отдых", 1080, 1920, &StyleConfig::default(), &mut rng)
//!     .unwrap();
//! assert!(!plan.wrapped_lines.is_empty());
//! ```

pub mod position;
pub mod wrap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub use position::{HAlign, Position, VAlign};
pub use wrap::{estimate_width, max_chars_for, wrap_words};

use crate::error::{PipelineError, Result};
use crate::style::{StyleConfig, DEFAULT_SIZE};

/// Resolved placement and styling of one run's overlay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPlan {
    /// Overlay text as generated
    pub text: String,
    /// Lines after word wrapping, in display order
    pub wrapped_lines: Vec<String>,
    /// Fill color
    pub color: String,
    /// Outline color (fixed by style, independent of fill)
    pub stroke_color: String,
    pub stroke_width: u32,
    pub position: Position,
    pub font_size: u32,
    /// Vertical distance between consecutive line origins
    pub line_height: u32,
    pub margin: u32,
    pub fade_in_s: f64,
    pub fade_out_s: f64,
}

impl LayoutPlan {
    /// Height of the whole text block in pixels
    #[must_use]
    pub fn block_height(&self) -> u32 {
        self.wrapped_lines.len() as u32 * self.line_height
    }

    /// drawtext coordinates for line `index`
    #[must_use]
    pub fn line_position(&self, index: usize) -> (String, String) {
        self.position.to_drawtext_position(
            self.margin,
            index,
            self.wrapped_lines.len(),
            self.line_height,
        )
    }
}

/// Computes [`LayoutPlan`]s
#[derive(Debug, Clone)]
pub struct TextLayoutEngine {
    size_name: String,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    /// Engine using the "medium" font size
    #[must_use]
    pub fn new() -> Self {
        Self {
            size_name: DEFAULT_SIZE.to_string(),
        }
    }

    /// Use another named size from the style table
    #[must_use]
    pub fn with_size(mut self, size_name: &str) -> Self {
        self.size_name = size_name.to_string();
        self
    }

    /// Plan the overlay for a `frame_width` x `frame_height` frame.
    ///
    /// `rng` is consulted exactly twice, color first and position second, so
    /// a seeded generator reproduces the same plan.
    pub fn plan<R: Rng + ?Sized>(
        &self,
        text: &str,
        frame_width: u32,
        frame_height: u32,
        style: &StyleConfig,
        rng: &mut R,
    ) -> Result<LayoutPlan> {
        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::InvalidInput("overlay text is empty".into()));
        }
        if frame_width == 0 || frame_height == 0 {
            return Err(PipelineError::InvalidInput(format!(
                "frame dimensions must be positive, got {frame_width}x{frame_height}"
            )));
        }

        let color = style
            .colors
            .choose(rng)
            .cloned()
            .ok_or_else(|| PipelineError::Configuration("style has no colors".into()))?;
        let position = *style
            .positions
            .choose(rng)
            .ok_or_else(|| PipelineError::Configuration("style has no positions".into()))?;

        let font_size = style.font_size(&self.size_name);
        let char_width = f64::from(font_size) * style.char_width_ratio;
        let budget = f64::from(frame_width) * style.width_budget;
        let wrapped_lines = wrap_words(text, max_chars_for(budget, char_width));
        let line_height = (f64::from(font_size) * style.line_spacing).round() as u32;

        debug!(
            "Layout: {} line(s), font {}px, budget {:.0}px, {} / {}",
            wrapped_lines.len(),
            font_size,
            budget,
            color,
            position
        );

        Ok(LayoutPlan {
            text: text.to_string(),
            wrapped_lines,
            color,
            stroke_color: style.stroke_color.clone(),
            stroke_width: style.stroke_width,
            position,
            font_size,
            line_height,
            margin: style.margin,
            fade_in_s: style.fade_in_s,
            fade_out_s: style.fade_out_s,
        })
    }
}
