//! Media engine seam and its ffmpeg/ffprobe implementation

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::config::EncoderConfig;

/// Lines of ffmpeg stderr kept in error messages
const STDERR_TAIL_LINES: usize = 20;

/// Probed properties of a media file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Seconds; 0 for still images
    pub duration_s: f64,
    pub has_audio: bool,
}

/// Decode/encode backend
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Read dimensions and duration of `path`
    async fn probe(&self, path: &Path) -> Result<MediaInfo>;

    /// Run one encode with the given argument list
    async fn run(&self, args: &[String]) -> Result<()>;

    /// Whether the engine's binaries can be executed
    async fn available(&self) -> bool;
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    #[serde(default)]
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    #[serde(default)]
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Display rotation in degrees, normalized to 0..360
    fn rotation(&self) -> i64 {
        let degrees = self
            .side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| self.tags.get("rotate").and_then(|r| r.trim().parse().ok()))
            .unwrap_or(0.0);
        (degrees.round() as i64).rem_euclid(360)
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output
pub fn parse_probe(json: &[u8]) -> Result<MediaInfo> {
    let probe: FfprobeOutput =
        serde_json::from_slice(json).context("Failed to parse ffprobe output")?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .context("No video stream found")?;
    let (Some(coded_w), Some(coded_h)) = (video.width, video.height) else {
        bail!("Video stream has no dimensions");
    };
    // ffmpeg autorotates on decode, so report the displayed frame
    let (width, height) = match video.rotation() {
        90 | 270 => (coded_h, coded_w),
        _ => (coded_w, coded_h),
    };

    let duration_s = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(MediaInfo {
        width,
        height,
        duration_s,
        has_audio: probe
            .streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some("audio")),
    })
}

/// ffmpeg / ffprobe subprocesses
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegEngine {
    #[must_use]
    pub fn new(config: &EncoderConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            ffprobe_path: config.ffprobe_path.clone(),
        }
    }

    async fn binary_runs(path: &str) -> bool {
        Command::new(path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.ffprobe_path))?;

        if !output.status.success() {
            bail!("ffprobe failed on {} ({})", path.display(), output.status);
        }
        parse_probe(&output.stdout).with_context(|| format!("probing {}", path.display()))
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        debug!("ffmpeg {}", args.join(" "));

        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to spawn {}", self.ffmpeg_path))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("ffmpeg exited with {}: {}", output.status, stderr_tail(&stderr));
        }
        Ok(())
    }

    async fn available(&self) -> bool {
        Self::binary_runs(&self.ffmpeg_path).await && Self::binary_runs(&self.ffprobe_path).await
    }
}

/// Last lines of a process's stderr
#[must_use]
pub fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
