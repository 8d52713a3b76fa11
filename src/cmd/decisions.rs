use std::path::Path;

use anyhow::Result;

use promoreel::{AppConfig, TelegramNotifier};

pub async fn cmd_decisions(config: Option<&Path>, json: bool) -> Result<()> {
    let app = AppConfig::load(config)?;
    let notifier = TelegramNotifier::new(&app.telegram)?;

    let decisions = notifier.poll_decisions().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&decisions)?);
        return Ok(());
    }

    if decisions.is_empty() {
        eprintln!("📭 No new decisions");
        return Ok(());
    }

    for decision in &decisions {
        let (icon, verdict) = if decision.approved {
            ("✅", "approved")
        } else {
            ("❌", "rejected")
        };
        let by = decision.decided_by.as_deref().unwrap_or("unknown");
        println!(
            "{icon} {} {verdict} by {by} at {}",
            decision.run_tag,
            decision.decided_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}
