use std::path::Path;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;

use promoreel::compose::filter::{drawtext_filters, FontSpec};
use promoreel::{AppConfig, StyleConfig, TextLayoutEngine};

#[allow(clippy::too_many_arguments)]
pub fn cmd_plan(
    config: Option<&Path>,
    text: &str,
    width: u32,
    height: u32,
    seed: Option<u64>,
    style_path: Option<&Path>,
    size: &str,
    json: bool,
) -> Result<()> {
    let app = AppConfig::load(config)?;
    let style = match style_path {
        Some(path) => StyleConfig::load(path)?,
        None => app.style()?,
    };
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let plan = TextLayoutEngine::new()
        .with_size(size)
        .plan(text, width, height, &style, &mut rng)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    eprintln!("📐 {width}x{height}, {} line(s)", plan.wrapped_lines.len());
    eprintln!("   Color: {} (stroke {} {}px)", plan.color, plan.stroke_color, plan.stroke_width);
    eprintln!("   Position: {}", plan.position);
    eprintln!("   Font: {}px, line height {}px", plan.font_size, plan.line_height);
    eprintln!("   Fade: {}s in / {}s out", plan.fade_in_s, plan.fade_out_s);
    for line in &plan.wrapped_lines {
        println!("{line}");
    }

    let font = match &app.encoder.fontfile {
        Some(path) => FontSpec::File(path.clone()),
        None => FontSpec::Family(app.encoder.font.clone()),
    };
    for filter in drawtext_filters(&plan, app.run.carousel_image_duration, &font) {
        tracing::debug!(%filter, "drawtext");
    }
    Ok(())
}
