//! `promoreel` - automated hotel promo reels
//!
//! # Features
//!
//! - **Content store**: Google Drive (REST v3) or a local folder tree
//! - **Copywriting**: caption + short overlay phrase from an OpenAI-compatible API
//! - **Layout**: word-wrapped overlay with random color/position from a style table
//! - **Rendering**: ffmpeg trim + drawtext, or an image carousel with cross-fades
//! - **Approval**: Telegram video message with approve / reject buttons
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use promoreel::{AppConfig, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Arc::new(AppConfig::load(None)?);
//!     let mut orchestrator = Orchestrator::from_config(config)?;
//!     let result = orchestrator.run().await?;
//!     println!("Rendered {}", result.output_path.display());
//!     Ok(())
//! }
//! ```

pub mod collab;
pub mod compose;
pub mod config;
pub mod error;
pub mod generate;
pub mod layout;
pub mod logging;
pub mod notify;
pub mod orchestrator;
pub mod schedule;
pub mod store;
pub mod style;
pub mod types;

pub use collab::{RetryPolicy, Role};
pub use compose::{FfmpegEngine, MediaComposer, MediaEngine, MediaInfo, RenderJob};
pub use config::AppConfig;
pub use error::{PipelineError, Result};
pub use generate::{OpenAiGenerator, TextGenerator};
pub use layout::{LayoutPlan, Position, TextLayoutEngine};
pub use notify::{Notifier, TelegramNotifier};
pub use orchestrator::{Orchestrator, RunId};
pub use store::{ContentStore, DriveStore, LocalStore};
pub use style::StyleConfig;
pub use types::{
    ApprovalDecision, ApprovalStatus, ContentItem, ContentKind, DeliveryAck, ExtensionFilter,
    GeneratedText, HotelProfile, MediaKind, RunResult, TrimWindow,
};

/// Version of promoreel
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
