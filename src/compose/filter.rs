//! ffmpeg filter-graph construction
//!
//! Pure string builders, kept separate from process handling so the graphs
//! can be checked without an encoder.

use std::path::PathBuf;

use crate::layout::LayoutPlan;

/// Font selection for drawtext
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSpec {
    /// Explicit font file
    File(PathBuf),
    /// fontconfig family name
    Family(String),
}

impl FontSpec {
    fn to_option(&self) -> String {
        match self {
            Self::File(path) => format!("fontfile={}", escape_text(&path.to_string_lossy())),
            Self::Family(name) => format!("font={}", escape_text(name)),
        }
    }
}

/// Escape an unquoted drawtext option value.
///
/// The value is unescaped twice: once by the filtergraph parser, which
/// splits on `[],;`, and once by the option parser, which splits on `:`.
/// Both passes consume backslashes and single quotes. Text expansion is turned off in the
/// filter itself, so `%` needs no escaping.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    escape_chars(&escape_chars(&single_line, "\\':"), "\\'[],;")
}

fn escape_chars(text: &str, special: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if special.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `#RRGGBB` -> `0xRRGGBB`; names pass through
#[must_use]
pub fn ffmpeg_color(color: &str) -> String {
    match color.strip_prefix('#') {
        Some(hex) => format!("0x{hex}"),
        None => color.to_string(),
    }
}

/// Opacity expression: ramps 0->1 over `fade_in`, 1->0 over the last
/// `fade_out` seconds of a `duration`-long timeline.
///
/// When the two fades together exceed the timeline they are scaled down
/// proportionally so the text is still fully visible at the midpoint.
#[must_use]
pub fn alpha_expr(fade_in: f64, fade_out: f64, duration: f64) -> String {
    let (mut fi, mut fo) = (fade_in.max(0.0), fade_out.max(0.0));
    if fi + fo > duration && fi + fo > 0.0 {
        let scale = duration.max(0.0) / (fi + fo);
        fi *= scale;
        fo *= scale;
    }

    let out_start = duration - fo;
    let tail = if fo > 0.0 {
        format!("if(gt(t,{out_start:.3}),({duration:.3}-t)/{fo:.3},1)")
    } else {
        "1".to_string()
    };
    if fi > 0.0 {
        format!("if(lt(t,{fi:.3}),t/{fi:.3},{tail})")
    } else {
        tail
    }
}

/// One drawtext filter per wrapped line of `plan`
#[must_use]
pub fn drawtext_filters(plan: &LayoutPlan, duration: f64, font: &FontSpec) -> Vec<String> {
    let alpha = alpha_expr(plan.fade_in_s, plan.fade_out_s, duration);
    let font = font.to_option();

    plan.wrapped_lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let (x, y) = plan.line_position(i);
            format!(
                "drawtext=text={text}:expansion=none:{font}:\
                 fontsize={size}:\
                 fontcolor={color}:\
                 borderw={borderw}:\
                 bordercolor={border}:\
                 x={x}:y={y}:\
                 alpha='{alpha}'",
                text = escape_text(line),
                size = plan.font_size,
                color = ffmpeg_color(&plan.color),
                borderw = plan.stroke_width,
                border = ffmpeg_color(&plan.stroke_color),
            )
        })
        .collect()
}

/// `-vf` chain for a trimmed video: picture fade in/out, overlay, pixel format
#[must_use]
pub fn video_filter(plan: &LayoutPlan, duration: f64, clip_fade: f64, font: &FontSpec) -> String {
    let mut filters = Vec::new();

    let fade = clip_fade.min(duration / 2.0);
    if fade > 0.0 {
        filters.push(format!("fade=t=in:st=0:d={fade:.3}"));
        filters.push(format!(
            "fade=t=out:st={:.3}:d={fade:.3}",
            (duration - fade).max(0.0)
        ));
    }
    filters.extend(drawtext_filters(plan, duration, font));
    filters.push("format=yuv420p".to_string());

    filters.join(",")
}

/// Length of a carousel timeline: `n·d − (n−1)·T`
#[must_use]
pub fn carousel_duration(count: usize, image_duration: f64, crossfade: f64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    count as f64 * image_duration - (count - 1) as f64 * crossfade
}

/// Start of the `k`-th cross-fade (1-based): `k·(d − T)`
#[must_use]
pub fn xfade_offset(k: usize, image_duration: f64, crossfade: f64) -> f64 {
    k as f64 * (image_duration - crossfade)
}

/// Geometry and timing of a carousel render
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarouselTiming {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub image_duration: f64,
    pub crossfade: f64,
}

/// `-filter_complex` graph for `count` looped still inputs.
///
/// Each input is scaled to fit and padded into the canvas, consecutive images
/// are joined by `xfade`, and the overlay is drawn over the whole timeline.
/// The final stream is labelled `[out]`.
#[must_use]
pub fn carousel_graph(count: usize, timing: &CarouselTiming, plan: &LayoutPlan, font: &FontSpec) -> String {
    let CarouselTiming {
        width: w,
        height: h,
        fps,
        image_duration: d,
        crossfade: t,
    } = *timing;
    let mut chains = Vec::with_capacity(count * 2 + 1);

    for i in 0..count {
        chains.push(format!(
            "[{i}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
             pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,\
             setsar=1,fps={fps},format=yuv420p[v{i}]"
        ));
    }

    let mut last = "v0".to_string();
    for k in 1..count {
        let label = format!("x{k}");
        chains.push(format!(
            "[{last}][v{k}]xfade=transition=fade:duration={t:.3}:offset={:.3}[{label}]",
            xfade_offset(k, d, t)
        ));
        last = label;
    }

    let total = carousel_duration(count, d, t);
    let mut overlay = drawtext_filters(plan, total, font);
    overlay.push("format=yuv420p".to_string());
    chains.push(format!("[{last}]{}[out]", overlay.join(",")));

    chains.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Position;

    fn plan(lines: &[&str]) -> LayoutPlan {
        LayoutPlan {
            text: lines.join(" "),
            wrapped_lines: lines.iter().map(|s| (*s).to_string()).collect(),
            color: "#FFE5B4".into(),
            stroke_color: "black".into(),
            stroke_width: 2,
            position: Position::Bottom,
            font_size: 60,
            line_height: 72,
            margin: 50,
            fade_in_s: 0.5,
            fade_out_s: 0.5,
        }
    }

    fn family() -> FontSpec {
        FontSpec::Family("Arial".into())
    }

    /// ffmpeg's `av_get_token`: `\` escapes the next char, `'...'` is literal,
    /// stops at an unescaped char from `term`.
    fn get_token<'a>(input: &'a str, term: &str) -> (String, &'a str) {
        let input = input.trim_start();
        let mut out = String::new();
        let mut chars = input.char_indices();
        while let Some((i, c)) = chars.next() {
            if term.contains(c) {
                return (out, &input[i..]);
            }
            match c {
                '\\' => {
                    if let Some((_, next)) = chars.next() {
                        out.push(next);
                    }
                }
                '\'' => {
                    for (_, q) in chars.by_ref() {
                        if q == '\'' {
                            break;
                        }
                        out.push(q);
                    }
                }
                _ => out.push(c),
            }
        }
        (out, "")
    }

    /// Options a drawtext filter receives after both parse passes
    fn parsed_options(filter: &str) -> Vec<(String, String)> {
        let args = filter.strip_prefix("drawtext=").unwrap();
        let (args, rest) = get_token(args, "[],;");
        assert!(rest.is_empty(), "filter args ended early at {rest:?}");

        let mut options = Vec::new();
        let mut rest = args.as_str();
        while !rest.is_empty() {
            let (key, after_key) = get_token(rest, "=");
            let (value, after_value) = get_token(after_key.strip_prefix('=').unwrap(), ":");
            options.push((key, value));
            rest = after_value.strip_prefix(':').unwrap_or(after_value);
        }
        options
    }

    fn option<'a>(options: &'a [(String, String)], key: &str) -> &'a str {
        &options.iter().find(|(k, _)| k == key).unwrap().1
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("10:00"), "10\\\\:00");
        assert_eq!(escape_text("it's"), "it\\\\\\'s");
        assert_eq!(escape_text("a,b"), "a\\,b");
        assert_eq!(escape_text("100%"), "100%");
        assert_eq!(escape_text("two\nlines"), "two lines");
    }

    #[test]
    fn test_overlay_punctuation_survives_parsing() {
        for line in [
            "Atlas Apart's view",
            "Скидка 20% до пятницы",
            "Заезд с 14:00; выезд до 12:00",
            "[Лето], 'море' \\ солнце",
        ] {
            let filters = drawtext_filters(&plan(&[line]), 10.0, &family());
            let options = parsed_options(&filters[0]);
            assert_eq!(option(&options, "text"), line);
            assert_eq!(option(&options, "expansion"), "none");
            assert_eq!(option(&options, "font"), "Arial");
            assert!(option(&options, "alpha").starts_with("if(lt(t,0.500),"));
        }
    }

    #[test]
    fn test_font_path_survives_parsing() {
        let font = FontSpec::File(PathBuf::from("C:/Fonts/O'Brien Sans.ttf"));
        let filters = drawtext_filters(&plan(&["Atlas"]), 5.0, &font);
        let options = parsed_options(&filters[0]);
        assert_eq!(option(&options, "fontfile"), "C:/Fonts/O'Brien Sans.ttf");
    }

    #[test]
    fn test_ffmpeg_color() {
        assert_eq!(ffmpeg_color("#ADD8E6"), "0xADD8E6");
        assert_eq!(ffmpeg_color("white"), "white");
    }

    #[test]
    fn test_alpha_expr_fades() {
        assert_eq!(
            alpha_expr(0.5, 0.5, 10.0),
            "if(lt(t,0.500),t/0.500,if(gt(t,9.500),(10.000-t)/0.500,1))"
        );
        assert_eq!(alpha_expr(0.0, 0.0, 10.0), "1");
        assert_eq!(alpha_expr(0.0, 1.0, 4.0), "if(gt(t,3.000),(4.000-t)/1.000,1)");
    }

    #[test]
    fn test_alpha_expr_scales_long_fades() {
        // 2+2 on a 2 s timeline -> 1+1
        assert_eq!(
            alpha_expr(2.0, 2.0, 2.0),
            "if(lt(t,1.000),t/1.000,if(gt(t,1.000),(2.000-t)/1.000,1))"
        );
    }

    #[test]
    fn test_drawtext_per_line_with_stroke() {
        let filters = drawtext_filters(&plan(&["Комфорт в", "центре города"]), 12.0, &family());
        assert_eq!(filters.len(), 2);
        for f in &filters {
            assert!(f.starts_with("drawtext=text="));
            assert!(f.contains(":expansion=none:"));
            assert!(f.contains("borderw=2"));
            assert!(f.contains("bordercolor=black"));
            assert!(f.contains("fontcolor=0xFFE5B4"));
            assert!(f.contains("fontsize=60"));
            assert!(f.contains(":font=Arial:"));
            assert!(f.contains("alpha='if(lt(t,0.500)"));
        }
        assert!(filters[0].contains("y=h-144-50+0"));
        assert!(filters[1].contains("y=h-144-50+72"));
        assert!(filters[1].contains("text=центре города:"));
    }

    #[test]
    fn test_fontfile_option() {
        let filters = drawtext_filters(
            &plan(&["Atlas"]),
            5.0,
            &FontSpec::File(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf")),
        );
        assert!(filters[0].contains("fontfile=/usr/share/fonts/DejaVuSans.ttf:"));
    }

    #[test]
    fn test_video_filter_chain() {
        let vf = video_filter(&plan(&["Твой идеальный отдых"]), 15.0, 0.5, &family());
        assert!(vf.starts_with("fade=t=in:st=0:d=0.500,fade=t=out:st=14.500:d=0.500,drawtext="));
        assert!(vf.ends_with(",format=yuv420p"));
    }

    #[test]
    fn test_video_filter_without_clip_fade() {
        let vf = video_filter(&plan(&["x"]), 15.0, 0.0, &family());
        assert!(vf.starts_with("drawtext="));
    }

    #[test]
    fn test_carousel_timing() {
        assert!((carousel_duration(3, 3.0, 0.5) - 8.0).abs() < 1e-9);
        assert!((carousel_duration(1, 3.0, 0.5) - 3.0).abs() < 1e-9);
        assert!((xfade_offset(1, 3.0, 0.5) - 2.5).abs() < 1e-9);
        assert!((xfade_offset(2, 3.0, 0.5) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_carousel_graph_offsets() {
        let timing = CarouselTiming {
            width: 1080,
            height: 1350,
            fps: 30,
            image_duration: 3.0,
            crossfade: 0.5,
        };
        let graph = carousel_graph(3, &timing, &plan(&["Здесь начинается отпуск"]), &family());

        assert!(graph.contains("[0:v]scale=1080:1350:force_original_aspect_ratio=decrease"));
        assert!(graph.contains("[2:v]scale"));
        assert!(graph.contains("[v0][v1]xfade=transition=fade:duration=0.500:offset=2.500[x1]"));
        assert!(graph.contains("[x1][v2]xfade=transition=fade:duration=0.500:offset=5.000[x2]"));
        assert!(graph.contains("[x2]drawtext="));
        // overlay fade-out lands at the end of the 8 s timeline
        assert!(graph.contains("(8.000-t)/0.500"));
        assert!(graph.ends_with("[out]"));
    }

    #[test]
    fn test_carousel_graph_single_image() {
        let timing = CarouselTiming {
            width: 720,
            height: 720,
            fps: 25,
            image_duration: 3.0,
            crossfade: 0.5,
        };
        let graph = carousel_graph(1, &timing, &plan(&["x"]), &family());
        assert!(!graph.contains("xfade"));
        assert!(graph.contains("[v0]drawtext="));
    }
}
