//! One end-to-end content run.
//!
//! ```text
//! select kind ─▶ list/pick/fetch sources ─▶ probe ─▶ load profile
//!      ─▶ generate caption+overlay ─▶ plan layout ─▶ render (atomic)
//!      ─▶ archive (optional) ─▶ deliver for approval ─▶ RunResult
//! ```
//!
//! Steps run strictly in sequence. Every collaborator call goes through
//! [`collab::call`](crate::collab::call), so failures arrive here already
//! classified. The whole run is bounded by `run.timeout_secs`; the per-run
//! work directory is removed on every exit path, including cancellation.

pub mod select;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Local;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

use crate::collab::{self, RetryPolicy, Role};
use crate::compose::{self, FfmpegEngine, MediaComposer, MediaEngine, RenderJob};
use crate::config::AppConfig;
use crate::error::{PipelineError, Result};
use crate::generate::{clean_overlay, OpenAiGenerator, TextGenerator};
use crate::layout::TextLayoutEngine;
use crate::notify::{Notifier, TelegramNotifier};
use crate::store::{self, ContentStore};
use crate::style::StyleConfig;
use crate::types::{
    ApprovalStatus, ContentItem, ContentKind, ExtensionFilter, GeneratedText, HotelProfile,
    RunResult, TrimWindow,
};

/// Identity of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunId {
    /// Full UUID
    pub id: String,
    /// First eight hex digits; used in file names and approval buttons
    pub tag: String,
}

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let tag = uuid.simple().to_string()[..8].to_string();
        Self {
            id: uuid.to_string(),
            tag,
        }
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

/// Sources fetched and probed for one run
struct PreparedSources {
    items: Vec<ContentItem>,
    local: Vec<PathBuf>,
    frame: (u32, u32),
    trim: Option<TrimWindow>,
}

/// Drives one run at a time over injected collaborators
pub struct Orchestrator {
    config: Arc<AppConfig>,
    style: StyleConfig,
    store: Arc<dyn ContentStore>,
    generator: Arc<dyn TextGenerator>,
    notifier: Arc<dyn Notifier>,
    composer: MediaComposer,
    layout: TextLayoutEngine,
    retry: RetryPolicy,
    rng: StdRng,
}

impl Orchestrator {
    /// Wire an orchestrator from explicit collaborators.
    ///
    /// The style table is resolved here, once per orchestrator.
    pub fn new(
        config: Arc<AppConfig>,
        store: Arc<dyn ContentStore>,
        generator: Arc<dyn TextGenerator>,
        notifier: Arc<dyn Notifier>,
        engine: Arc<dyn MediaEngine>,
    ) -> Result<Self> {
        let style = config.style()?;
        let composer = MediaComposer::new(
            engine,
            config.encoder.clone(),
            &style,
            config.run.carousel_image_duration,
        )?;
        let rng = config
            .run
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);

        Ok(Self {
            retry: RetryPolicy::from(&config.retry),
            config,
            style,
            store,
            generator,
            notifier,
            composer,
            layout: TextLayoutEngine::new(),
            rng,
        })
    }

    /// Wire the production collaborators named by the configuration
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self> {
        let store = store::from_config(&config)?;
        let generator: Arc<dyn TextGenerator> = Arc::new(OpenAiGenerator::new(&config.generator)?);
        let notifier: Arc<dyn Notifier> = Arc::new(TelegramNotifier::new(&config.telegram)?);
        let engine: Arc<dyn MediaEngine> = Arc::new(FfmpegEngine::new(&config.encoder));
        Self::new(config, store, generator, notifier, engine)
    }

    /// Re-seed the random source
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run once under a fresh [`RunId`]
    pub async fn run(&mut self) -> Result<RunResult> {
        self.run_as(RunId::new()).await
    }

    /// Run once under `run_id`.
    ///
    /// Either returns a complete [`RunResult`] or an error with no partial
    /// artifact on disk. A `Delivery` failure keeps the finished artifact so
    /// it can be sent by hand.
    pub async fn run_as(&mut self, run_id: RunId) -> Result<RunResult> {
        let ceiling = Duration::from_secs(self.config.run.timeout_secs);
        let work_dir = self.config.run.work_dir.join(&run_id.id);
        let _work_guard = WorkDirGuard(work_dir.clone());
        let output_guard = OutputGuard::default();

        info!("Starting run {} ({})", run_id.tag, run_id.id);
        let started = Instant::now();
        let outcome =
            tokio::time::timeout(ceiling, self.execute(&run_id, &work_dir, &output_guard, started)).await;

        match outcome {
            Ok(Ok(result)) => {
                output_guard.disarm();
                info!(
                    "Run {} finished in {:.1}s: {}",
                    run_id.tag,
                    result.elapsed_secs,
                    result.output_path.display()
                );
                Ok(result)
            }
            Ok(Err(err)) => {
                if matches!(err, PipelineError::Delivery(_)) {
                    output_guard.disarm();
                }
                error!("Run {} failed [{}]: {}", run_id.tag, err.kind(), err);
                Err(err)
            }
            Err(_) => {
                let err = PipelineError::Timeout(ceiling);
                error!("Run {} failed [{}]: {}", run_id.tag, err.kind(), err);
                Err(err)
            }
        }
    }

    async fn execute(
        &mut self,
        run_id: &RunId,
        work_dir: &Path,
        output_guard: &OutputGuard,
        started: Instant,
    ) -> Result<RunResult> {
        let kind = select::select_content_kind(&mut self.rng, self.config.run.video_percentage);
        info!("Content kind: {}", kind);

        let sources = match kind {
            ContentKind::Video => self.prepare_video(work_dir).await?,
            ContentKind::Carousel => self.prepare_carousel(work_dir).await?,
        };
        let source_names: Vec<String> = sources.items.iter().map(|i| i.name.clone()).collect();
        info!("Sources: {}", source_names.join(", "));

        let profile = self.load_profile().await?;
        let text = self.generate_text(&profile, kind).await?;

        let (frame_w, frame_h) = sources.frame;
        let plan = self
            .layout
            .plan(&text.overlay, frame_w, frame_h, &self.style, &mut self.rng)
            .map_err(|e| match e {
                PipelineError::InvalidInput(msg) => PipelineError::Render(msg),
                other => other,
            })?;
        info!(
            "Layout: {} line(s), {} at {}, {}px",
            plan.wrapped_lines.len(),
            plan.color,
            plan.position,
            plan.font_size
        );

        let output_path = self.output_path(kind, &run_id.tag);
        output_guard.arm(output_path.clone());
        let job = RenderJob {
            content_kind: kind,
            source_items: sources.items,
            sources: sources.local,
            trim: sources.trim,
            canvas: (kind == ContentKind::Carousel).then_some(sources.frame),
            plan,
            output_path: output_path.clone(),
        };
        self.composer.render(&job).await?;
        info!("Rendered {}", output_path.display());

        let archived = self.archive(&output_path).await?;

        let notifier = Arc::clone(&self.notifier);
        let delivery = collab::call(Role::Notify, &self.retry, || {
            notifier.deliver(&output_path, &text.caption, &run_id.tag)
        })
        .await?;
        info!("Delivered {} for approval", run_id.tag);

        Ok(RunResult {
            run_id: run_id.id.clone(),
            content_kind: kind,
            output_path,
            caption: text.caption,
            overlay: text.overlay,
            sources: source_names,
            approval: ApprovalStatus::Pending,
            delivery,
            archived,
            elapsed_secs: started.elapsed().as_secs_f64(),
        })
    }

    async fn list(&self, folder: &str, filter: &ExtensionFilter) -> Result<Vec<ContentItem>> {
        let store = Arc::clone(&self.store);
        collab::call(Role::Store, &self.retry, || store.list(folder, filter)).await
    }

    async fn fetch(&self, item: &ContentItem, work_dir: &Path) -> Result<PathBuf> {
        let store = Arc::clone(&self.store);
        collab::call(Role::Store, &self.retry, || store.fetch(item, work_dir)).await
    }

    async fn read_text(&self, item: &ContentItem) -> Result<String> {
        let store = Arc::clone(&self.store);
        collab::call(Role::Store, &self.retry, || store.read_text_document(item)).await
    }

    /// Error for an empty media folder, widened when the other folder is
    /// empty as well
    async fn no_media(&self, kind: ContentKind, detail: String) -> PipelineError {
        let folders = &self.config.folders;
        let other_empty = match kind {
            ContentKind::Video => self.list(&folders.raw_photo, &ExtensionFilter::images()).await,
            ContentKind::Carousel => self.list(&folders.raw_video, &ExtensionFilter::videos()).await,
        }
        .map(|items| items.is_empty())
        .unwrap_or(false);

        if other_empty {
            PipelineError::SourceUnavailable(format!(
                "no source media at all: '{}' and '{}' are both empty",
                folders.raw_video, folders.raw_photo
            ))
        } else {
            PipelineError::SourceUnavailable(detail)
        }
    }

    async fn prepare_video(&mut self, work_dir: &Path) -> Result<PreparedSources> {
        let folder = self.config.folders.raw_video.clone();
        let items = self.list(&folder, &ExtensionFilter::videos()).await?;
        info!("Found {} video(s) in '{}'", items.len(), folder);

        let Some(item) = items.choose(&mut self.rng).cloned() else {
            return Err(self
                .no_media(ContentKind::Video, format!("no videos in '{folder}'"))
                .await);
        };
        info!("Selected video {}", item.name);

        let local = self.fetch(&item, work_dir).await?;
        let media = self
            .composer
            .engine()
            .probe(&local)
            .await
            .map_err(|e| PipelineError::Render(format!("probe {}: {e:#}", item.name)))?;
        if media.duration_s <= 0.0 {
            return Err(PipelineError::Render(format!(
                "{} reports no playable duration",
                item.name
            )));
        }

        let run = &self.config.run;
        let trim = select::choose_trim(
            &mut self.rng,
            media.duration_s,
            run.min_video_duration,
            run.max_video_duration,
        );
        info!(
            "Trim {:.2}s..{:.2}s of {:.2}s ({}x{})",
            trim.start_s,
            trim.end_s(),
            media.duration_s,
            media.width,
            media.height
        );

        Ok(PreparedSources {
            items: vec![item],
            local: vec![local],
            frame: (media.width, media.height),
            trim: Some(trim),
        })
    }

    async fn prepare_carousel(&mut self, work_dir: &Path) -> Result<PreparedSources> {
        let folder = self.config.folders.raw_photo.clone();
        let items = self.list(&folder, &ExtensionFilter::images()).await?;
        info!("Found {} image(s) in '{}'", items.len(), folder);

        let run = &self.config.run;
        let (min, max) = (run.carousel_image_count_min, run.carousel_image_count_max);
        let Some(count) = select::choose_carousel_count(&mut self.rng, min, max, items.len()) else {
            return Err(self
                .no_media(
                    ContentKind::Carousel,
                    format!("'{folder}' has {} image(s), need at least {min}", items.len()),
                )
                .await);
        };
        let chosen = select::sample_without_replacement(&mut self.rng, &items, count);
        info!(
            "Selected {} image(s): {}",
            chosen.len(),
            chosen.iter().map(|i| i.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        let mut local = Vec::with_capacity(chosen.len());
        for item in &chosen {
            local.push(self.fetch(item, work_dir).await?);
        }

        let first = self
            .composer
            .engine()
            .probe(&local[0])
            .await
            .map_err(|e| PipelineError::Render(format!("probe {}: {e:#}", chosen[0].name)))?;
        let canvas = (even(first.width), even(first.height));
        debug!("Carousel canvas {}x{}", canvas.0, canvas.1);

        Ok(PreparedSources {
            items: chosen,
            local,
            frame: canvas,
            trim: None,
        })
    }

    /// Description from the first document in the texts folder, reference
    /// captions from the reference folder; configured values fill the gaps.
    pub async fn load_profile(&self) -> Result<HotelProfile> {
        let folders = &self.config.folders;
        let hotel = &self.config.hotel;

        let docs = self.list(&folders.texts, &ExtensionFilter::any()).await?;
        let mut description = match docs.first() {
            Some(doc) => {
                debug!("Hotel description from {}", doc.name);
                self.read_text(doc).await?
            }
            None => String::new(),
        };
        if description.trim().is_empty() {
            description = hotel.description.clone().unwrap_or_default();
        }
        if description.trim().is_empty() {
            return Err(PipelineError::Configuration(format!(
                "no hotel description: '{}' is empty and [hotel].description is unset",
                folders.texts
            )));
        }

        let refs = self
            .list(&folders.reference_posts, &ExtensionFilter::any())
            .await?;
        let mut reference_captions = Vec::new();
        for doc in refs.iter().take(self.config.run.max_reference_captions) {
            let text = self.read_text(doc).await?;
            if !text.trim().is_empty() {
                reference_captions.push(text);
            }
        }
        if reference_captions.is_empty() {
            debug!("No reference posts in store, using configured captions");
            reference_captions.clone_from(&hotel.reference_captions);
        }
        info!(
            "Profile: {} chars of description, {} reference caption(s)",
            description.chars().count(),
            reference_captions.len()
        );

        Ok(HotelProfile {
            description,
            reference_captions,
        })
    }

    async fn generate_text(&self, profile: &HotelProfile, kind: ContentKind) -> Result<GeneratedText> {
        let generator = Arc::clone(&self.generator);
        let raw = collab::call(Role::Generate, &self.retry, || generator.generate(profile, kind)).await?;

        let caption = raw.caption.trim().to_string();
        let overlay = clean_overlay(&raw.overlay);
        if caption.is_empty() {
            return Err(PipelineError::Generation("caption is empty".into()));
        }
        if overlay.is_empty() {
            return Err(PipelineError::Generation("overlay text is empty".into()));
        }
        info!("Caption: {}", caption);
        info!("Overlay: {}", overlay);
        Ok(GeneratedText { caption, overlay })
    }

    async fn archive(&self, output: &Path) -> Result<Option<ContentItem>> {
        let Some(folder) = self.config.folders.archive.as_deref() else {
            return Ok(None);
        };
        let store = Arc::clone(&self.store);
        let item = collab::call(Role::Archive, &self.retry, || store.upload(output, folder)).await?;
        info!("Archived to '{}' as {}", folder, item.id);
        Ok(Some(item))
    }

    fn output_path(&self, kind: ContentKind, tag: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.config
            .run
            .output_dir
            .join(format!("{}_{stamp}_{tag}.mp4", kind.as_str()))
    }
}

/// Round down to an even pixel count (H.264 4:2:0 needs even dimensions)
fn even(px: u32) -> u32 {
    (px & !1).max(2)
}

/// Removes the run's final output and its `.part` on drop unless disarmed.
/// Lives in the run future, so cancelling the run cleans up too.
#[derive(Default)]
struct OutputGuard(Mutex<Option<PathBuf>>);

impl OutputGuard {
    fn arm(&self, output: PathBuf) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Some(output);
    }

    fn disarm(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        let pending = self.0.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(output) = pending {
            for path in [compose::part_path(&output), output] {
                if let Err(e) = compose::remove_if_exists(&path) {
                    warn!("Failed to remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

/// Removes the run's work directory on drop
struct WorkDirGuard(PathBuf);

impl Drop for WorkDirGuard {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.0) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                warn!("Failed to remove work dir {}: {}", self.0.display(), e);
            }
            _ => {}
        }
    }
}
