//! Shared data model for a run

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of file held in the content store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Image,
    Document,
}

impl MediaKind {
    /// Classify a file by its extension (case-insensitive)
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match extension_of(name).as_deref() {
            Some("mp4" | "mov" | "avi" | "mkv" | "m4v") => Self::Video,
            Some("jpg" | "jpeg" | "png" | "gif" | "webp") => Self::Image,
            _ => Self::Document,
        }
    }
}

/// A file listed by a [`ContentStore`](crate::store::ContentStore)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Store-specific identifier (Drive file id, relative path, ...)
    pub id: String,
    /// Display name including extension
    pub name: String,
    pub kind: MediaKind,
    /// Size in bytes (0 when the store does not report it)
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Provider MIME type, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ContentItem {
    /// Lowercased extension of the item name
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }
}

/// Case-insensitive extension allow-list used when listing folders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Accept every file
    #[must_use]
    pub fn any() -> Self {
        Self { extensions: Vec::new() }
    }

    /// Source videos accepted for the video path
    #[must_use]
    pub fn videos() -> Self {
        Self::new(["mp4", "mov"])
    }

    /// Source images accepted for the carousel path
    #[must_use]
    pub fn images() -> Self {
        Self::new(["jpg", "jpeg", "png"])
    }

    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        extension_of(name).is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// What a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A single trimmed source video
    Video,
    /// Several still images joined by cross-fades
    Carousel,
}

impl ContentKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Carousel => "carousel",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hotel description plus example captions used to steer generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotelProfile {
    pub description: String,
    pub reference_captions: Vec<String>,
}

/// Caption and overlay produced once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedText {
    /// Longer post text delivered next to the artifact (15-30 words)
    pub caption: String,
    /// Short phrase drawn on the artifact (3-7 words)
    pub overlay: String,
}

/// Portion of a source video kept in the render
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimWindow {
    pub start_s: f64,
    pub length_s: f64,
}

impl TrimWindow {
    #[must_use]
    pub fn end_s(&self) -> f64 {
        self.start_s + self.length_s
    }
}

/// Human decision on a delivered artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

/// Immediate acknowledgment from a [`Notifier`](crate::notify::Notifier)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryAck {
    /// Provider message id, when the provider returns one
    pub message_id: Option<i64>,
    pub delivered_at: DateTime<Utc>,
}

/// Approve/reject answer collected out of band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Short id of the run the decision refers to
    pub run_tag: String,
    pub approved: bool,
    pub decided_by: Option<String>,
    pub decided_at: DateTime<Utc>,
}

/// Terminal record of one run. Logged, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: String,
    pub content_kind: ContentKind,
    pub output_path: PathBuf,
    pub caption: String,
    pub overlay: String,
    /// Names of the source files used
    pub sources: Vec<String>,
    pub approval: ApprovalStatus,
    pub delivery: DeliveryAck,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<ContentItem>,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_filter_case_insensitive() {
        let filter = ExtensionFilter::videos();
        assert!(filter.matches("lobby.MP4"));
        assert!(filter.matches("pool.mov"));
        assert!(!filter.matches("pool.avi"));
        assert!(!filter.matches("README"));
    }

    #[test]
    fn test_extension_filter_any() {
        assert!(ExtensionFilter::any().matches("notes"));
        assert!(ExtensionFilter::new([".JPG"]).matches("room.jpg"));
    }

    #[test]
    fn test_media_kind_from_name() {
        assert_eq!(MediaKind::from_name("a.JPEG"), MediaKind::Image);
        assert_eq!(MediaKind::from_name("b.mov"), MediaKind::Video);
        assert_eq!(MediaKind::from_name("desc.txt"), MediaKind::Document);
    }

    #[test]
    fn test_trim_window_end() {
        let trim = TrimWindow { start_s: 2.5, length_s: 10.0 };
        assert!((trim.end_s() - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_content_kind_serialization() {
        let json = serde_json::to_string(&ContentKind::Carousel).unwrap();
        assert_eq!(json, "\"carousel\"");
        assert_eq!(ContentKind::Video.to_string(), "video");
    }
}
