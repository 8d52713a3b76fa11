//! Named overlay anchor positions and their ffmpeg drawtext coordinates

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Anchor of the overlay text block on the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    /// Bottom center (standard subtitle position)
    #[default]
    Bottom,
    /// Middle of the frame
    Center,
    /// Top center
    Top,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Horizontal alignment of each line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

/// Vertical anchoring of the whole block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VAlign {
    Top,
    Middle,
    Bottom,
}

impl Position {
    pub const ALL: [Position; 7] = [
        Self::Bottom,
        Self::Center,
        Self::Top,
        Self::TopLeft,
        Self::TopRight,
        Self::BottomLeft,
        Self::BottomRight,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bottom => "bottom",
            Self::Center => "center",
            Self::Top => "top",
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }

    #[must_use]
    pub fn halign(&self) -> HAlign {
        match self {
            Self::TopLeft | Self::BottomLeft => HAlign::Left,
            Self::TopRight | Self::BottomRight => HAlign::Right,
            Self::Bottom | Self::Center | Self::Top => HAlign::Center,
        }
    }

    #[must_use]
    pub fn valign(&self) -> VAlign {
        match self {
            Self::Top | Self::TopLeft | Self::TopRight => VAlign::Top,
            Self::Center => VAlign::Middle,
            Self::Bottom | Self::BottomLeft | Self::BottomRight => VAlign::Bottom,
        }
    }

    /// ffmpeg drawtext `x`/`y` expressions for one line of a text block.
    ///
    /// Lines are laid out top to bottom with a fixed `line_height`; the block
    /// of `line_count` lines is anchored as a whole, and each line is aligned
    /// horizontally on its own rendered width (`text_w`).
    #[must_use]
    pub fn to_drawtext_position(
        &self,
        margin: u32,
        line_index: usize,
        line_count: usize,
        line_height: u32,
    ) -> (String, String) {
        let m = margin.to_string();
        let block = line_count as u32 * line_height;
        let offset = line_index as u32 * line_height;

        let x = match self.halign() {
            HAlign::Left => m.clone(),
            HAlign::Center => "(w-text_w)/2".to_string(),
            HAlign::Right => format!("w-text_w-{m}"),
        };

        let y = match self.valign() {
            VAlign::Top => (margin + offset).to_string(),
            VAlign::Middle => format!("(h-{block})/2+{offset}"),
            VAlign::Bottom => format!("h-{block}-{m}+{offset}"),
        };

        (x, y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| format!("unknown position: {s}"))
    }
}
