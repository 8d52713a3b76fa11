//! Media composition.
//!
//! [`MediaComposer`] turns a [`RenderJob`] into a single media-engine call:
//! trim + overlay for videos, scale/pad + cross-fade + overlay for carousels.
//!
//! Output is atomic. The engine writes `{output}.part` with an explicit
//! container format; the file is renamed to `output` only after a clean exit.
//! Any failure, or dropping the render future, removes the `.part` file, so
//! `output` either exists complete or not at all.

pub mod engine;
pub mod filter;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

pub use engine::{FfmpegEngine, MediaEngine, MediaInfo};
pub use filter::{CarouselTiming, FontSpec};

use crate::config::EncoderConfig;
use crate::error::{PipelineError, Result};
use crate::layout::LayoutPlan;
use crate::style::StyleConfig;
use crate::types::{ContentKind, ContentItem, TrimWindow};

/// Everything needed for one render
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub content_kind: ContentKind,
    /// Store items the sources came from
    pub source_items: Vec<ContentItem>,
    /// Fetched local copies, same order as `source_items`
    pub sources: Vec<PathBuf>,
    /// Video only
    pub trim: Option<TrimWindow>,
    /// Carousel only: output frame size
    pub canvas: Option<(u32, u32)>,
    pub plan: LayoutPlan,
    pub output_path: PathBuf,
}

/// Marshals render jobs into media-engine calls
pub struct MediaComposer {
    engine: Arc<dyn MediaEngine>,
    encoder: EncoderConfig,
    clip_fade_s: f64,
    crossfade_s: f64,
    image_duration_s: f64,
}

impl MediaComposer {
    /// Fails with `Configuration` when the cross-fade does not fit inside
    /// one image slot.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        encoder: EncoderConfig,
        style: &StyleConfig,
        image_duration_s: f64,
    ) -> Result<Self> {
        if !(image_duration_s > 0.0) || style.crossfade_s >= image_duration_s {
            return Err(PipelineError::Configuration(format!(
                "crossfade ({}s) must be shorter than image duration ({}s)",
                style.crossfade_s, image_duration_s
            )));
        }
        Ok(Self {
            engine,
            encoder,
            clip_fade_s: style.clip_fade_s,
            crossfade_s: style.crossfade_s,
            image_duration_s,
        })
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn MediaEngine> {
        &self.engine
    }

    fn font(&self) -> FontSpec {
        match &self.encoder.fontfile {
            Some(path) => FontSpec::File(path.clone()),
            None => FontSpec::Family(self.encoder.font.clone()),
        }
    }

    /// Dispatch on the job's content kind
    pub async fn render(&self, job: &RenderJob) -> Result<()> {
        match job.content_kind {
            ContentKind::Video => {
                let source = job
                    .sources
                    .first()
                    .ok_or_else(|| PipelineError::Render("video job has no source".into()))?;
                let trim = job
                    .trim
                    .ok_or_else(|| PipelineError::Render("video job has no trim window".into()))?;
                self.render_video(source, trim.start_s, trim.length_s, &job.plan, &job.output_path)
                    .await
            }
            ContentKind::Carousel => {
                let canvas = job
                    .canvas
                    .ok_or_else(|| PipelineError::Render("carousel job has no canvas".into()))?;
                self.render_carousel(&job.sources, canvas, &job.plan, &job.output_path)
                    .await
            }
        }
    }

    /// Trim `source` to `[start, start + length]` and burn in the overlay
    pub async fn render_video(
        &self,
        source: &Path,
        trim_start: f64,
        trim_length: f64,
        plan: &LayoutPlan,
        output: &Path,
    ) -> Result<()> {
        if !(trim_start >= 0.0 && trim_length > 0.0) {
            return Err(PipelineError::Render(format!(
                "invalid trim window start={trim_start} length={trim_length}"
            )));
        }
        info!(
            "Rendering video {} [{:.2}s + {:.2}s] -> {}",
            source.display(),
            trim_start,
            trim_length,
            output.display()
        );

        let vf = filter::video_filter(plan, trim_length, self.clip_fade_s, &self.font());
        let part = part_path(output);

        let mut args = base_args();
        args.extend([
            "-ss".to_string(),
            format!("{trim_start:.3}"),
            "-t".to_string(),
            format!("{trim_length:.3}"),
            "-i".to_string(),
            source.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "0:a:0?".to_string(),
            "-vf".to_string(),
            vf,
        ]);
        args.extend(self.video_codec_args());
        args.extend(self.audio_codec_args());
        args.extend(container_args(&part));

        self.encode_atomically(&args, &part, output).await
    }

    /// Join `images` with cross-fades on a `canvas` frame and draw the overlay
    pub async fn render_carousel(
        &self,
        images: &[PathBuf],
        canvas: (u32, u32),
        plan: &LayoutPlan,
        output: &Path,
    ) -> Result<()> {
        if images.is_empty() {
            return Err(PipelineError::Render("carousel has no images".into()));
        }
        let (width, height) = canvas;
        if width == 0 || height == 0 {
            return Err(PipelineError::Render(format!("invalid canvas {width}x{height}")));
        }

        let timing = CarouselTiming {
            width,
            height,
            fps: self.encoder.fps,
            image_duration: self.image_duration_s,
            crossfade: self.crossfade_s,
        };
        let total = filter::carousel_duration(images.len(), self.image_duration_s, self.crossfade_s);
        info!(
            "Rendering carousel of {} image(s), {}x{}, {:.2}s -> {}",
            images.len(),
            width,
            height,
            total,
            output.display()
        );

        let graph = filter::carousel_graph(images.len(), &timing, plan, &self.font());
        let part = part_path(output);

        let mut args = base_args();
        for image in images {
            args.extend([
                "-loop".to_string(),
                "1".to_string(),
                "-t".to_string(),
                format!("{:.3}", self.image_duration_s),
                "-i".to_string(),
                image.to_string_lossy().to_string(),
            ]);
        }
        args.extend([
            "-filter_complex".to_string(),
            graph,
            "-map".to_string(),
            "[out]".to_string(),
            "-t".to_string(),
            format!("{total:.3}"),
            "-an".to_string(),
        ]);
        args.extend(self.video_codec_args());
        args.extend(container_args(&part));

        self.encode_atomically(&args, &part, output).await
    }

    fn video_codec_args(&self) -> Vec<String> {
        let enc = &self.encoder;
        let mut args = vec!["-c:v".to_string(), enc.video_codec.clone()];
        if enc.video_codec == "libx264" {
            args.extend([
                "-profile:v".to_string(),
                "high".to_string(),
                "-preset".to_string(),
                enc.preset.clone(),
                "-crf".to_string(),
                enc.crf.to_string(),
            ]);
        }
        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            enc.fps.to_string(),
        ]);
        args
    }

    fn audio_codec_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.encoder.audio_codec.clone(),
            "-b:a".to_string(),
            self.encoder.audio_bitrate.clone(),
        ]
    }

    async fn encode_atomically(&self, args: &[String], part: &Path, output: &Path) -> Result<()> {
        remove_if_exists(part).map_err(|e| {
            PipelineError::Render(format!("cannot clear stale {}: {e}", part.display()))
        })?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::Render(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        let guard = PartFileGuard::new(part);
        self.engine
            .run(args)
            .await
            .map_err(|e| PipelineError::Render(format!("{e:#}")))?;

        if !part.exists() {
            return Err(PipelineError::Render(format!(
                "engine reported success but wrote no {}",
                part.display()
            )));
        }
        std::fs::rename(part, output).map_err(|e| {
            PipelineError::Render(format!("cannot move {} into place: {e}", part.display()))
        })?;
        guard.disarm();

        debug!("Wrote {}", output.display());
        Ok(())
    }
}

/// Temporary file the engine writes before the final rename
#[must_use]
pub fn part_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Remove `path`, treating "not found" as success
pub fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn base_args() -> Vec<String> {
    ["-hide_banner", "-loglevel", "error", "-nostdin", "-y"]
        .iter()
        .map(std::string::ToString::to_string)
        .collect()
}

fn container_args(part: &Path) -> Vec<String> {
    vec![
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
        part.to_string_lossy().to_string(),
    ]
}

/// Removes the `.part` file on drop unless disarmed
struct PartFileGuard {
    path: PathBuf,
    armed: bool,
}

impl PartFileGuard {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = remove_if_exists(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Position;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Writes the `.part` file then succeeds or fails
    struct FakeEngine {
        fail: bool,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl FakeEngine {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MediaEngine for FakeEngine {
        async fn probe(&self, _path: &Path) -> anyhow::Result<MediaInfo> {
            Ok(MediaInfo {
                width: 1920,
                height: 1080,
                duration_s: 20.0,
                has_audio: true,
            })
        }

        async fn run(&self, args: &[String]) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(args.to_vec());
            let out = args.last().unwrap();
            std::fs::write(out, b"partial").unwrap();
            if self.fail {
                anyhow::bail!("ffmpeg exited with exit status: 1: Conversion failed!");
            }
            Ok(())
        }

        async fn available(&self) -> bool {
            true
        }
    }

    fn plan() -> LayoutPlan {
        LayoutPlan {
            text: "Твой идеальный отдых".into(),
            wrapped_lines: vec!["Твой идеальный отдых".into()],
            color: "white".into(),
            stroke_color: "black".into(),
            stroke_width: 2,
            position: Position::Center,
            font_size: 60,
            line_height: 72,
            margin: 50,
            fade_in_s: 0.5,
            fade_out_s: 0.5,
        }
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("promoreel-compose-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn composer(engine: Arc<FakeEngine>) -> MediaComposer {
        MediaComposer::new(engine, EncoderConfig::default(), &StyleConfig::default(), 3.0).unwrap()
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/out/video_1.mp4")),
            PathBuf::from("/out/video_1.mp4.part")
        );
    }

    #[test]
    fn test_rejects_crossfade_longer_than_slot() {
        let style = StyleConfig {
            crossfade_s: 3.0,
            ..Default::default()
        };
        assert!(matches!(
            MediaComposer::new(FakeEngine::new(false), EncoderConfig::default(), &style, 3.0),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_video_success_renames_part() {
        let dir = temp_dir();
        let output = dir.join("video_test.mp4");
        let engine = FakeEngine::new(false);
        composer(engine.clone())
            .render_video(Path::new("/src/lobby.mp4"), 2.0, 12.0, &plan(), &output)
            .await
            .unwrap();

        assert!(output.exists());
        assert!(!part_path(&output).exists());

        let calls = engine.calls.lock().unwrap();
        let args = &calls[0];
        let joined = args.join(" ");
        assert!(joined.contains("-ss 2.000 -t 12.000 -i /src/lobby.mp4"));
        assert!(joined.contains("-c:v libx264 -profile:v high"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert!(joined.contains("-c:a aac -b:a 128k"));
        assert!(joined.contains("-movflags +faststart -f mp4"));
        assert!(args.last().unwrap().ends_with(".mp4.part"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_failure_leaves_no_artifact() {
        let dir = temp_dir();
        let output = dir.join("video_fail.mp4");
        let err = composer(FakeEngine::new(true))
            .render_video(Path::new("/src/lobby.mp4"), 0.0, 10.0, &plan(), &output)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Render(_)));
        assert!(err.to_string().contains("Conversion failed"));
        assert!(!output.exists());
        assert!(!part_path(&output).exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_stale_part_removed_before_render() {
        let dir = temp_dir();
        let output = dir.join("carousel_retry.mp4");
        std::fs::write(part_path(&output), b"left over from a crash").unwrap();

        let err = composer(FakeEngine::new(true))
            .render_carousel(&[dir.join("a.jpg")], (1080, 1080), &plan(), &output)
            .await;
        assert!(err.is_err());
        assert!(!part_path(&output).exists());

        composer(FakeEngine::new(false))
            .render_carousel(&[dir.join("a.jpg")], (1080, 1080), &plan(), &output)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"partial");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_carousel_args() {
        let dir = temp_dir();
        let output = dir.join("carousel.mp4");
        let engine = FakeEngine::new(false);
        let images: Vec<PathBuf> = ["a.jpg", "b.png", "c.jpeg"].iter().map(|n| dir.join(n)).collect();

        composer(engine.clone())
            .render_carousel(&images, (1080, 1350), &plan(), &output)
            .await
            .unwrap();

        let calls = engine.calls.lock().unwrap();
        let args = &calls[0];
        assert_eq!(args.iter().filter(|a| *a == "-loop").count(), 3);
        let joined = args.join(" ");
        assert!(joined.contains("-map [out] -t 8.000 -an"));
        assert!(joined.contains("offset=5.000"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_render_dispatch_requires_fields() {
        let job = RenderJob {
            content_kind: ContentKind::Video,
            source_items: vec![],
            sources: vec![PathBuf::from("/src/a.mp4")],
            trim: None,
            canvas: None,
            plan: plan(),
            output_path: PathBuf::from("/tmp/never.mp4"),
        };
        let err = composer(FakeEngine::new(false)).render(&job).await.unwrap_err();
        assert!(matches!(err, PipelineError::Render(_)));
    }
}
