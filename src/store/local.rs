//! Directory-backed content store.
//!
//! Folders are sub-directories of a root; an item's id is its path relative
//! to the root. Useful for offline runs and for tests.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use super::{normalize_document, ContentStore};
use crate::types::{ContentItem, ExtensionFilter, MediaKind};

/// Content store rooted at a local directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            bail!("item id escapes store root: {id}");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn list(&self, folder: &str, filter: &ExtensionFilter) -> Result<Vec<ContentItem>> {
        let dir = self.resolve(folder)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Folder {} does not exist, listing as empty", dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
        };

        let mut items = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !filter.matches(&name) {
                continue;
            }
            items.push(ContentItem {
                id: format!("{folder}/{name}"),
                kind: MediaKind::from_name(&name),
                size: metadata.len(),
                modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                mime_type: None,
                name,
            });
        }

        // Newest first, then by name for a stable order
        items.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }

    async fn fetch(&self, item: &ContentItem, dest_dir: &Path) -> Result<PathBuf> {
        let source = self.resolve(&item.id)?;
        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("Failed to create {}", dest_dir.display()))?;
        let dest = dest_dir.join(&item.name);
        tokio::fs::copy(&source, &dest)
            .await
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        debug!("Fetched {} -> {}", item.id, dest.display());
        Ok(dest)
    }

    async fn upload(&self, local_path: &Path, folder: &str) -> Result<ContentItem> {
        let name = local_path
            .file_name()
            .context("upload path has no file name")?
            .to_string_lossy()
            .to_string();
        let dir = self.resolve(folder)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let dest = dir.join(&name);
        let size = tokio::fs::copy(local_path, &dest)
            .await
            .with_context(|| format!("Failed to upload {}", local_path.display()))?;

        Ok(ContentItem {
            id: format!("{folder}/{name}"),
            kind: MediaKind::from_name(&name),
            size,
            modified: Some(Utc::now()),
            mime_type: None,
            name,
        })
    }

    async fn read_text_document(&self, item: &ContentItem) -> Result<String> {
        let path = self.resolve(&item.id)?;
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = String::from_utf8_lossy(&bytes);
        Ok(normalize_document(&raw, &item.name, item.mime_type.as_deref()))
    }
}
