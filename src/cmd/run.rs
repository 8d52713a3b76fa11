use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use promoreel::{schedule, AppConfig};

pub async fn cmd_run(config: Option<&Path>, seed: Option<u64>, json: bool, verbose: bool) -> Result<()> {
    let config = Arc::new(AppConfig::load(config)?);

    eprintln!("🎬 Starting run");
    eprintln!(
        "   Mix: {}% video / {}% carousel",
        config.run.video_percentage, config.run.carousel_percentage
    );
    if let Some(seed) = seed.or(config.run.seed) {
        eprintln!("   Seed: {seed}");
    }

    let result = schedule::run_once(config, seed, verbose).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    eprintln!("✅ {} ready in {:.1}s", result.content_kind, result.elapsed_secs);
    eprintln!("   Sources: {}", result.sources.join(", "));
    eprintln!("   Overlay: {}", result.overlay);
    eprintln!("   Caption: {}", result.caption);
    if let Some(archived) = &result.archived {
        eprintln!("   Archived: {}", archived.id);
    }
    eprintln!("📨 Sent for approval (awaiting decision)");
    println!("{}", result.output_path.display());
    Ok(())
}
