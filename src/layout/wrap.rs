//! Greedy word wrapping on estimated glyph widths

/// Estimated pixel width of `text` with a fixed per-glyph width.
///
/// Counts Unicode scalar values, so Cyrillic text is measured per letter
/// rather than per UTF-8 byte.
#[must_use]
pub fn estimate_width(text: &str, char_width: f64) -> f64 {
    text.chars().count() as f64 * char_width
}

/// How many glyphs fit in `budget_px` at `char_width` each
#[must_use]
pub fn max_chars_for(budget_px: f64, char_width: f64) -> usize {
    if char_width <= 0.0 || budget_px <= 0.0 {
        return 0;
    }
    (budget_px / char_width).floor() as usize
}

/// Wrap `text` into lines of at most `max_chars` glyphs.
///
/// Breaks only at whitespace. A word longer than `max_chars` is placed on its
/// own line unbroken; nothing is ever truncated.
#[must_use]
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
            continue;
        }

        if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}
