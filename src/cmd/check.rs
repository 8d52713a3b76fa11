use std::path::Path;

use anyhow::Result;

use promoreel::config::StorageBackend;
use promoreel::{AppConfig, FfmpegEngine, MediaEngine, PipelineError};

pub async fn cmd_check(config: Option<&Path>) -> Result<()> {
    let path = config.map_or_else(promoreel::config::config_path, Path::to_path_buf);
    let app = AppConfig::load(config)?;
    match Some(path).filter(|p| p.exists()) {
        Some(p) => eprintln!("✅ Config: {}", p.display()),
        None => eprintln!("ℹ️  Config: built-in defaults"),
    }

    let style = app.style()?;
    eprintln!(
        "✅ Style: {} colors, {} positions",
        style.colors.len(),
        style.positions.len()
    );

    let mut missing = 0;
    match app.storage.backend {
        StorageBackend::Drive => report(
            "Drive credentials",
            app.storage.drive_credentials().is_ok(),
            &mut missing,
        ),
        StorageBackend::Local => report(
            "Local content root",
            app.storage.local_root().is_ok(),
            &mut missing,
        ),
    }
    report("OpenAI API key", app.generator.require_api_key().is_ok(), &mut missing);
    report("Telegram bot", app.telegram.require().is_ok(), &mut missing);

    let engine = FfmpegEngine::new(&app.encoder);
    let available = engine.available().await;
    report(
        &format!("ffmpeg / ffprobe ({} / {})", app.encoder.ffmpeg_path, app.encoder.ffprobe_path),
        available,
        &mut missing,
    );

    if missing > 0 {
        return Err(PipelineError::Configuration(format!("{missing} check(s) failed")).into());
    }
    eprintln!("🎉 Ready to run");
    Ok(())
}

fn report(label: &str, ok: bool, missing: &mut usize) {
    if ok {
        eprintln!("✅ {label}");
    } else {
        eprintln!("❌ {label}");
        *missing += 1;
    }
}
