//! Google Drive content store (REST v3).
//!
//! Consumes an already-issued OAuth bearer token; token issuance and refresh
//! happen outside this crate. Sub-folders are resolved by name under a root
//! folder id and cached for the lifetime of the store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::{normalize_document, ContentStore};
use crate::types::{ContentItem, ExtensionFilter, MediaKind};

const API_BASE: &str = "https://www.googleapis.com/drive/v3";
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const DOC_MIME: &str = "application/vnd.google-apps.document";
const SHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const LIST_FIELDS: &str = "files(id,name,mimeType,size,createdTime,modifiedTime)";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: Option<String>,
    /// Drive reports sizes as decimal strings
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    modified_time: Option<DateTime<Utc>>,
}

impl DriveFile {
    fn into_item(self) -> ContentItem {
        let kind = match self.mime_type.as_deref() {
            Some(m) if m.starts_with("video/") => MediaKind::Video,
            Some(m) if m.starts_with("image/") => MediaKind::Image,
            _ => MediaKind::from_name(&self.name),
        };
        ContentItem {
            size: self
                .size
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            id: self.id,
            name: self.name,
            kind,
            modified: self.modified_time,
            mime_type: self.mime_type,
        }
    }
}

/// Drive-backed [`ContentStore`]
pub struct DriveStore {
    client: reqwest::Client,
    root_folder_id: String,
    token: String,
    api_base: String,
    upload_base: String,
    folder_cache: Mutex<HashMap<String, String>>,
}

impl DriveStore {
    /// Create a store rooted at `root_folder_id`
    pub fn new(root_folder_id: &str, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(15))
            .gzip(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            root_folder_id: root_folder_id.to_string(),
            token: token.to_string(),
            api_base: API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
            folder_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Point the store at another API host (tests, proxies)
    #[must_use]
    pub fn with_base_urls(mut self, api_base: &str, upload_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self.upload_base = upload_base.trim_end_matches('/').to_string();
        self
    }

    fn cached_folder(&self, name: &str) -> Option<String> {
        self.folder_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(name).cloned())
    }

    fn remember_folder(&self, name: &str, id: &str) {
        if let Ok(mut cache) = self.folder_cache.lock() {
            cache.insert(name.to_string(), id.to_string());
        }
    }

    /// Run a files.list query, following `nextPageToken` until the listing is complete
    async fn query_files(&self, q: &str, fields: &str, order_by: Option<&str>) -> Result<Vec<DriveFile>> {
        debug!("Drive files.list q={}", q);
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let params = list_params(q, fields, order_by, page_token.as_deref());
            let response = self
                .client
                .get(format!("{}/files", self.api_base))
                .bearer_auth(&self.token)
                .query(&params)
                .send()
                .await
                .context("Drive files.list request failed")?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                bail!("Drive files.list returned {status}: {}", snippet(&body));
            }

            let page: FileList = response
                .json()
                .await
                .context("Failed to parse Drive files.list response")?;
            files.extend(page.files);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) if page_token.as_deref() != Some(token.as_str()) => {
                    page_token = Some(token);
                }
                _ => break,
            }
        }
        Ok(files)
    }

    /// Id of the child folder `name` under the root, if it exists
    async fn find_folder(&self, name: &str) -> Result<Option<String>> {
        if let Some(id) = self.cached_folder(name) {
            return Ok(Some(id));
        }
        let q = format!(
            "name='{}' and '{}' in parents and mimeType='{FOLDER_MIME}' and trashed=false",
            escape_query(name),
            escape_query(&self.root_folder_id)
        );
        let found = self
            .query_files(&q, "files(id,name)", None)
            .await?
            .into_iter()
            .next()
            .map(|f| f.id);
        if let Some(id) = &found {
            self.remember_folder(name, id);
        }
        Ok(found)
    }

    async fn create_folder(&self, name: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(&self.token)
            .query(&[("fields", "id")])
            .json(&serde_json::json!({
                "name": name,
                "mimeType": FOLDER_MIME,
                "parents": [self.root_folder_id],
            }))
            .send()
            .await
            .context("Drive folder create request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Drive folder create returned {status}: {}", snippet(&body));
        }
        let created: serde_json::Value = response.json().await?;
        let id = created["id"]
            .as_str()
            .context("Drive folder create response has no id")?
            .to_string();
        info!("Created Drive folder {} ({})", name, id);
        self.remember_folder(name, &id);
        Ok(id)
    }

    async fn get_checked(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Drive request failed: {url}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Drive returned {status} for {url}: {}", snippet(&body));
        }
        Ok(response)
    }
}

#[async_trait]
impl ContentStore for DriveStore {
    fn name(&self) -> &'static str {
        "drive"
    }

    async fn list(&self, folder: &str, filter: &ExtensionFilter) -> Result<Vec<ContentItem>> {
        let Some(folder_id) = self.find_folder(folder).await? else {
            debug!("Drive folder '{}' not found, listing as empty", folder);
            return Ok(Vec::new());
        };
        let q = format!("'{}' in parents and trashed=false", escape_query(&folder_id));
        let files = self
            .query_files(&q, LIST_FIELDS, Some("modifiedTime desc"))
            .await?;

        let items: Vec<ContentItem> = files
            .into_iter()
            .filter(|f| f.mime_type.as_deref() != Some(FOLDER_MIME))
            .filter(|f| filter.matches(&f.name))
            .map(DriveFile::into_item)
            .collect();
        debug!("Drive folder '{}': {} matching file(s)", folder, items.len());
        Ok(items)
    }

    async fn fetch(&self, item: &ContentItem, dest_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .with_context(|| format!("Failed to create {}", dest_dir.display()))?;
        let dest = dest_dir.join(sanitize_file_name(&item.name));

        let url = format!("{}/files/{}", self.api_base, item.id);
        let response = self.get_checked(&url, &[("alt", "media")]).await?;

        let mut file = tokio::fs::File::create(&dest)
            .await
            .with_context(|| format!("Failed to create {}", dest.display()))?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Drive download interrupted")?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!("Downloaded {} ({} bytes) -> {}", item.name, written, dest.display());
        Ok(dest)
    }

    async fn upload(&self, local_path: &Path, folder: &str) -> Result<ContentItem> {
        let folder_id = match self.find_folder(folder).await? {
            Some(id) => id,
            None => self.create_folder(folder).await?,
        };
        let name = local_path
            .file_name()
            .context("upload path has no file name")?
            .to_string_lossy()
            .to_string();
        let data = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("Failed to read {}", local_path.display()))?;
        let size = data.len() as u64;

        let metadata = serde_json::json!({ "name": name, "parents": [folder_id] });
        let boundary = format!("promoreel-{}", uuid::Uuid::new_v4().simple());
        let body = multipart_related(&boundary, &metadata, mime_for(&name), &data);

        let response = self
            .client
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name,mimeType,size,modifiedTime")])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .context("Drive upload request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            bail!("Drive upload returned {status}: {}", snippet(&text));
        }
        let file: DriveFile = response
            .json()
            .await
            .context("Failed to parse Drive upload response")?;
        info!("Uploaded {} to Drive folder '{}' ({})", name, folder, file.id);

        let mut item = file.into_item();
        if item.size == 0 {
            item.size = size;
        }
        Ok(item)
    }

    async fn read_text_document(&self, item: &ContentItem) -> Result<String> {
        let (raw, mime) = match item.mime_type.as_deref() {
            Some(DOC_MIME) => {
                let url = format!("{}/files/{}/export", self.api_base, item.id);
                let text = self
                    .get_checked(&url, &[("mimeType", "text/plain")])
                    .await?
                    .text()
                    .await?;
                (text, Some("text/plain"))
            }
            Some(SHEET_MIME) => {
                let url = format!("{}/files/{}/export", self.api_base, item.id);
                let text = self
                    .get_checked(&url, &[("mimeType", "text/csv")])
                    .await?
                    .text()
                    .await?;
                (text, Some("text/csv"))
            }
            other => {
                let url = format!("{}/files/{}", self.api_base, item.id);
                let text = self
                    .get_checked(&url, &[("alt", "media")])
                    .await?
                    .text()
                    .await?;
                (text, other)
            }
        };
        Ok(normalize_document(&raw, &item.name, mime))
    }
}

/// Query parameters for one files.list page
fn list_params(
    q: &str,
    fields: &str,
    order_by: Option<&str>,
    page_token: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", q.to_string()),
        ("fields", format!("nextPageToken,{fields}")),
        ("pageSize", "1000".to_string()),
    ];
    if let Some(order) = order_by {
        params.push(("orderBy", order.to_string()));
    }
    if let Some(token) = page_token {
        params.push(("pageToken", token.to_string()));
    }
    params
}

/// Escape a value for use inside a single-quoted Drive query literal
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| if matches!(c, '/' | '\\' | '\0') { '_' } else { c })
        .collect()
}

fn mime_for(name: &str) -> &'static str {
    match Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Build a `multipart/related` body: JSON metadata part then the file part
fn multipart_related(
    boundary: &str,
    metadata: &serde_json::Value,
    content_type: &str,
    data: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(data.len() + 512);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata.to_string().as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn snippet(body: &str) -> String {
    body.chars().take(300).collect()
}
