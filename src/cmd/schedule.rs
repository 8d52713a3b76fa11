use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use promoreel::{schedule, AppConfig};

pub async fn cmd_schedule(config: Option<&Path>, at: &str, verbose: bool) -> Result<()> {
    let at = schedule::parse_time(at)?;
    let config = Arc::new(AppConfig::load(config)?);

    eprintln!("⏰ Daily run at {} (Ctrl-C to stop)", at.format("%H:%M"));
    schedule::run_daily(config, at, verbose).await?;
    Ok(())
}
