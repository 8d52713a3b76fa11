//! Content storage collaborator.
//!
//! A folder-tree abstraction over wherever the raw media and reference texts
//! live. Two backends ship with the crate:
//!
//! - [`DriveStore`]: Google Drive REST v3 with a pre-issued bearer token
//! - [`LocalStore`]: sub-directories of a root directory on disk
//!
//! A missing or empty folder lists as empty; it is never an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use promoreel::store::{ContentStore, LocalStore};
//! use promoreel::types::ExtensionFilter;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = LocalStore::new("media");
//! let videos = store.list("RAW_VIDEO", &ExtensionFilter::videos()).await?;
//! println!("{} candidate videos", videos.len());
//! # Ok(())
//! # }
//! ```

pub mod drive;
pub mod local;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

pub use drive::DriveStore;
pub use local::LocalStore;

use crate::config::{AppConfig, StorageBackend};
use crate::types::{ContentItem, ExtensionFilter};

/// Maximum characters kept from one text document
pub const MAX_DOCUMENT_CHARS: usize = 10_000;

const TRUNCATION_MARKER: &str = "\n...(контент обрезан)";
const CSV_HEADER: &str = "Данные из таблицы:";

/// Folder-tree storage for media and documents
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Backend name for logs ("drive", "local")
    fn name(&self) -> &'static str;

    /// Files directly inside `folder` whose name passes `filter`
    async fn list(&self, folder: &str, filter: &ExtensionFilter) -> Result<Vec<ContentItem>>;

    /// Copy `item` into `dest_dir`, returning the local path
    async fn fetch(&self, item: &ContentItem, dest_dir: &Path) -> Result<PathBuf>;

    /// Upload a local file into `folder`
    async fn upload(&self, local_path: &Path, folder: &str) -> Result<ContentItem>;

    /// Text content of a document, normalised with [`normalize_document`]
    async fn read_text_document(&self, item: &ContentItem) -> Result<String>;
}

/// Build the store selected by `[storage]`.
pub fn from_config(config: &AppConfig) -> crate::error::Result<Arc<dyn ContentStore>> {
    match config.storage.backend {
        StorageBackend::Local => {
            let root = config.storage.local_root()?;
            Ok(Arc::new(LocalStore::new(root)))
        }
        StorageBackend::Drive => {
            let (folder_id, token) = config.storage.drive_credentials()?;
            let store = DriveStore::new(folder_id, token).map_err(|e| {
                crate::error::PipelineError::Configuration(format!("drive client: {e:#}"))
            })?;
            Ok(Arc::new(store))
        }
    }
}

/// Clean up raw document text.
///
/// CSV content (by name or MIME type) is rendered as ` | `-joined rows under a
/// header. Lines are trimmed, blank lines dropped, and the result is capped at
/// [`MAX_DOCUMENT_CHARS`] with a truncation marker.
#[must_use]
pub fn normalize_document(raw: &str, name: &str, mime_type: Option<&str>) -> String {
    let is_csv = name.to_lowercase().ends_with(".csv")
        || mime_type.is_some_and(|m| m.eq_ignore_ascii_case("text/csv"));

    let text = if is_csv { csv_to_text(raw) } else { raw.to_string() };

    let cleaned = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&cleaned, MAX_DOCUMENT_CHARS)
}

/// Render CSV rows as `a | b | c` lines under a header
#[must_use]
pub fn csv_to_text(raw: &str) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for line in raw.lines() {
        let cells: Vec<&str> = split_csv_line(line)
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if cells.is_empty() {
            continue;
        }
        out.push_str(&cells.join(" | "));
        out.push('\n');
    }
    out
}

/// Split one CSV line on commas outside double quotes, dropping the quotes
fn split_csv_line(line: &str) -> Vec<&str> {
    let mut cells = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                cells.push(line[start..i].trim().trim_matches('"'));
                start = i + 1;
            }
            _ => {}
        }
    }
    cells.push(line[start..].trim().trim_matches('"'));
    cells
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}{TRUNCATION_MARKER}", &text[..cut]),
        None => text.to_string(),
    }
}
