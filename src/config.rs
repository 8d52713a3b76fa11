//! Application configuration loaded from `~/.config/promoreel/config.toml`.
//!
//! Built once at process start (file, then environment overrides, then
//! validation) and passed by reference into every component. Components never
//! read the environment themselves.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::style::StyleConfig;

/// Per-run workflow settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Chance (0-100) that a run produces a trimmed video
    pub video_percentage: u8,
    /// Must equal `100 - video_percentage`
    pub carousel_percentage: u8,
    /// Seconds
    pub min_video_duration: f64,
    /// Seconds
    pub max_video_duration: f64,
    pub carousel_image_count_min: usize,
    pub carousel_image_count_max: usize,
    /// Seconds each carousel image stays on screen
    pub carousel_image_duration: f64,
    pub output_dir: PathBuf,
    pub logs_dir: PathBuf,
    /// Scratch space for fetched sources; one sub-directory per run
    pub work_dir: PathBuf,
    /// Wall-clock ceiling for one run
    pub timeout_secs: u64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
    pub max_reference_captions: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            video_percentage: 70,
            carousel_percentage: 30,
            min_video_duration: 10.0,
            max_video_duration: 30.0,
            carousel_image_count_min: 3,
            carousel_image_count_max: 5,
            carousel_image_duration: 3.0,
            output_dir: PathBuf::from("output"),
            logs_dir: PathBuf::from("logs"),
            work_dir: std::env::temp_dir().join("promoreel"),
            timeout_secs: 900,
            seed: None,
            max_reference_captions: 5,
        }
    }
}

/// Folder names inside the content store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    pub raw_video: String,
    pub raw_photo: String,
    pub texts: String,
    pub reference_posts: String,
    /// Rendered artifacts are uploaded here when set
    pub archive: Option<String>,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            raw_video: "RAW_VIDEO".to_string(),
            raw_photo: "RAW_PHOTO".to_string(),
            texts: "TEXTS".to_string(),
            reference_posts: "POSTS_REFERENCE".to_string(),
            archive: None,
        }
    }
}

/// Style table, inline or from a separate JSON/TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct StyleSection {
    pub path: Option<PathBuf>,
    #[serde(flatten)]
    pub inline: StyleConfig,
}

/// Which [`ContentStore`](crate::store::ContentStore) backs the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Drive,
    Local,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend
    pub root: Option<PathBuf>,
    /// Root folder id for the Drive backend
    pub folder_id: Option<String>,
    /// OAuth bearer token for the Drive backend
    pub access_token: Option<String>,
}

impl StorageConfig {
    /// Drive root folder id and bearer token
    pub fn drive_credentials(&self) -> Result<(&str, &str)> {
        let folder = non_empty(self.folder_id.as_deref())
            .ok_or_else(|| missing("storage.folder_id / GOOGLE_DRIVE_FOLDER_ID"))?;
        let token = non_empty(self.access_token.as_deref())
            .ok_or_else(|| missing("storage.access_token / GOOGLE_ACCESS_TOKEN"))?;
        Ok((folder, token))
    }

    pub fn local_root(&self) -> Result<&Path> {
        self.root
            .as_deref()
            .ok_or_else(|| missing("storage.root (local backend)"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
    /// Brand name used in prompts
    pub brand: String,
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4-turbo".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            brand: "Atlas Apart".to_string(),
            timeout_secs: 60,
        }
    }
}

impl GeneratorConfig {
    pub fn require_api_key(&self) -> Result<&str> {
        non_empty(self.api_key.as_deref()).ok_or_else(|| missing("generator.api_key / OPENAI_API_KEY"))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Approver chat or user id
    pub chat_id: Option<String>,
    pub api_base: String,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 300,
        }
    }
}

impl TelegramConfig {
    /// Bot token and chat id
    pub fn require(&self) -> Result<(&str, &str)> {
        let token = non_empty(self.bot_token.as_deref())
            .ok_or_else(|| missing("telegram.bot_token / TELEGRAM_BOT_TOKEN"))?;
        let chat = non_empty(self.chat_id.as_deref())
            .ok_or_else(|| missing("telegram.chat_id / TELEGRAM_USER_ID"))?;
        Ok((token, chat))
    }
}

/// ffmpeg encoding parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
    pub fps: u32,
    /// Font file for drawtext; system font lookup by `font` when unset
    pub fontfile: Option<PathBuf>,
    pub font: String,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: which::which("ffmpeg").map_or_else(
                |_| "ffmpeg".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
            ffprobe_path: which::which("ffprobe").map_or_else(
                |_| "ffprobe".to_string(),
                |p| p.to_string_lossy().to_string(),
            ),
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            fps: 30,
            fontfile: None,
            font: "Arial".to_string(),
        }
    }
}

/// Retry policy shared by all collaborator calls
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 500,
        }
    }
}

/// Profile used when the store holds no description / reference posts
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HotelConfig {
    pub description: Option<String>,
    pub reference_captions: Vec<String>,
}

impl Default for HotelConfig {
    fn default() -> Self {
        Self {
            description: None,
            reference_captions: [
                "Утро в Atlas Apart ☀️ Начните свой день с комфорта и уюта",
                "Идеальное место для вашего отпуска 🏨 Современные апартаменты в центре города",
                "Atlas Apart - где каждый день как отпуск 🌟 Бронируйте сейчас!",
                "Ваш дом вдали от дома 🏡 Комфорт и стиль в каждой детали",
                "Незабываемый отдых начинается здесь 💫 Atlas Apart",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub run: RunConfig,
    pub folders: FolderConfig,
    pub style: StyleSection,
    pub storage: StorageConfig,
    pub generator: GeneratorConfig,
    pub telegram: TelegramConfig,
    pub encoder: EncoderConfig,
    pub retry: RetryConfig,
    pub hotel: HotelConfig,
}

impl AppConfig {
    /// Load from `path` (or the default location), apply environment
    /// overrides and validate.
    ///
    /// A missing default file yields the built-in defaults; a missing
    /// explicitly requested file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default = config_path();
                if default.exists() {
                    Self::from_file(&default)?
                } else {
                    debug!("No config at {}, using defaults", default.display());
                    Self::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without env overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            PipelineError::Configuration(format!("invalid TOML in {}: {e}", path.display()))
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("VIDEO_PERCENTAGE") {
            let pct: u8 = parse_env("VIDEO_PERCENTAGE", &v)?;
            if pct > 100 {
                return Err(PipelineError::Configuration(format!(
                    "VIDEO_PERCENTAGE must be 0-100, got {pct}"
                )));
            }
            self.run.video_percentage = pct;
            self.run.carousel_percentage = 100 - pct;
        }
        if let Some(v) = get("MIN_VIDEO_DURATION") {
            self.run.min_video_duration = parse_env("MIN_VIDEO_DURATION", &v)?;
        }
        if let Some(v) = get("MAX_VIDEO_DURATION") {
            self.run.max_video_duration = parse_env("MAX_VIDEO_DURATION", &v)?;
        }
        if let Some(v) = get("RAW_VIDEO_FOLDER") {
            self.folders.raw_video = v;
        }
        if let Some(v) = get("RAW_PHOTO_FOLDER") {
            self.folders.raw_photo = v;
        }
        if let Some(v) = get("TEXTS_FOLDER") {
            self.folders.texts = v;
        }
        if let Some(v) = get("POSTS_REFERENCE_FOLDER") {
            self.folders.reference_posts = v;
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.generator.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.generator.model = v;
        }
        if let Some(v) = get("GOOGLE_DRIVE_FOLDER_ID") {
            self.storage.folder_id = Some(v);
        }
        if let Some(v) = get("GOOGLE_ACCESS_TOKEN") {
            self.storage.access_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = get("TELEGRAM_USER_ID") {
            self.telegram.chat_id = Some(v);
        }
        Ok(())
    }

    /// Check cross-field rules. Violations are configuration errors, never
    /// runtime fallbacks.
    pub fn validate(&self) -> Result<()> {
        let run = &self.run;
        let bad = |msg: String| Err(PipelineError::Configuration(msg));

        if run.video_percentage > 100 {
            return bad(format!("video_percentage must be 0-100, got {}", run.video_percentage));
        }
        if u16::from(run.video_percentage) + u16::from(run.carousel_percentage) != 100 {
            return bad(format!(
                "video_percentage ({}) + carousel_percentage ({}) must equal 100",
                run.video_percentage, run.carousel_percentage
            ));
        }
        if !(run.min_video_duration.is_finite() && run.min_video_duration > 0.0) {
            return bad("min_video_duration must be positive".into());
        }
        if !run.max_video_duration.is_finite() || run.min_video_duration > run.max_video_duration {
            return bad(format!(
                "min_video_duration ({}) must not exceed max_video_duration ({})",
                run.min_video_duration, run.max_video_duration
            ));
        }
        if run.carousel_image_count_min == 0
            || run.carousel_image_count_min > run.carousel_image_count_max
        {
            return bad(format!(
                "carousel image count range {}..={} is invalid",
                run.carousel_image_count_min, run.carousel_image_count_max
            ));
        }
        if !(run.carousel_image_duration.is_finite() && run.carousel_image_duration > 0.0) {
            return bad("carousel_image_duration must be positive".into());
        }
        if run.timeout_secs == 0 {
            return bad("timeout_secs must be positive".into());
        }
        if self.retry.attempts == 0 {
            return bad("retry.attempts must be at least 1".into());
        }
        if self.style.path.is_none() {
            self.style.inline.validate()?;
            self.check_crossfade(&self.style.inline)?;
        }
        Ok(())
    }

    /// Resolve the style table for a run
    pub fn style(&self) -> Result<StyleConfig> {
        let style = match &self.style.path {
            Some(path) => StyleConfig::load(path)?,
            None => self.style.inline.clone(),
        };
        self.check_crossfade(&style)?;
        Ok(style)
    }

    fn check_crossfade(&self, style: &StyleConfig) -> Result<()> {
        if style.crossfade_s >= self.run.carousel_image_duration {
            return Err(PipelineError::Configuration(format!(
                "style crossfade_s ({}) must be shorter than carousel_image_duration ({})",
                style.crossfade_s, self.run.carousel_image_duration
            )));
        }
        Ok(())
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("promoreel")
        .join("config.toml")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn missing(what: &str) -> PipelineError {
    PipelineError::Configuration(format!("missing required setting: {what}"))
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PipelineError::Configuration(format!("invalid {key}={value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parse_empty_config() {
        let config: AppConfig = toml::from_str("").unwrap();
        config.validate().unwrap();
        assert_eq!(config.run.video_percentage, 70);
        assert_eq!(config.folders.raw_video, "RAW_VIDEO");
        assert_eq!(config.storage.backend, StorageBackend::Drive);
        assert_eq!(config.hotel.reference_captions.len(), 5);
        assert!(config.hotel.description.is_none());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[run]
video_percentage = 100
carousel_percentage = 0
min_video_duration = 5.0
max_video_duration = 15.0
seed = 7

[folders]
archive = "READY"

[style]
colors = ["white", "gold"]
positions = ["bottom", "top-left"]
fade_in_s = 1.0

[style.font_sizes]
medium = 80

[storage]
backend = "local"
root = "/srv/media"

[telegram]
chat_id = "12345"
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        config.validate().unwrap();
        assert_eq!(config.run.seed, Some(7));
        assert_eq!(config.folders.archive.as_deref(), Some("READY"));
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.storage.local_root().unwrap(), Path::new("/srv/media"));

        let style = config.style().unwrap();
        assert_eq!(style.colors, vec!["white", "gold"]);
        assert_eq!(style.font_size("medium"), 80);
    }

    #[test]
    fn rejects_percentages_not_summing_to_100() {
        let mut config = AppConfig::default();
        config.run.video_percentage = 60;
        config.run.carousel_percentage = 30;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
        assert!(err.to_string().contains("must equal 100"));
    }

    #[test]
    fn rejects_min_above_max() {
        let mut config = AppConfig::default();
        config.run.min_video_duration = 40.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_carousel_range() {
        let mut config = AppConfig::default();
        config.run.carousel_image_count_min = 6;
        assert!(config.validate().is_err());
        config.run.carousel_image_count_min = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_crossfade_longer_than_image() {
        let mut config = AppConfig::default();
        config.style.inline.crossfade_s = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("VIDEO_PERCENTAGE", "100"),
            ("MAX_VIDEO_DURATION", "45"),
            ("RAW_PHOTO_FOLDER", "PHOTOS"),
            ("OPENAI_API_KEY", "sk-test"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_USER_ID", "42"),
            ("GOOGLE_DRIVE_FOLDER_ID", "root-id"),
            ("GOOGLE_ACCESS_TOKEN", "ya29.token"),
            ("OPENAI_MODEL", "   "),
        ]);
        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| (*v).to_string()))
            .unwrap();
        config.validate().unwrap();

        assert_eq!(config.run.video_percentage, 100);
        assert_eq!(config.run.carousel_percentage, 0);
        assert!((config.run.max_video_duration - 45.0).abs() < f64::EPSILON);
        assert_eq!(config.folders.raw_photo, "PHOTOS");
        assert_eq!(config.generator.require_api_key().unwrap(), "sk-test");
        assert_eq!(config.generator.model, "gpt-4-turbo");
        assert_eq!(config.telegram.require().unwrap(), ("123:abc", "42"));
        assert_eq!(
            config.storage.drive_credentials().unwrap(),
            ("root-id", "ya29.token")
        );
    }

    #[test]
    fn env_rejects_garbage_percentage() {
        let mut config = AppConfig::default();
        assert!(config
            .apply_env(|k| (k == "VIDEO_PERCENTAGE").then(|| "lots".to_string()))
            .is_err());
        assert!(config
            .apply_env(|k| (k == "VIDEO_PERCENTAGE").then(|| "101".to_string()))
            .is_err());
    }

    #[test]
    fn missing_secrets_are_configuration_errors() {
        let config = AppConfig::default();
        assert!(matches!(
            config.generator.require_api_key(),
            Err(PipelineError::Configuration(_))
        ));
        assert!(config.telegram.require().is_err());
        assert!(config.storage.drive_credentials().is_err());
        assert!(config.storage.local_root().is_err());
    }

    #[test]
    fn load_explicit_missing_file_fails() {
        let path = std::env::temp_dir().join("promoreel-does-not-exist.toml");
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(PipelineError::Configuration(_))
        ));
    }
}
