use std::sync::OnceLock;
use regex::Regex;

use crate::config::LayoutConfig;

/// Average rendered character width
pub const CHAR_WIDTH: i64 = 8;
pub const LINE_HEIGHT: i64 = 24;
/// Height of a `###` heading line
pub const HEADER_HEIGHT: i64 = 36;
pub const PADDING_X: i64 = 24;
pub const PADDING_Y: i64 = 20;

/// Estimate the rendered size of a markup text block, clamped to the configured bounds
pub fn measure(text: &str, config: &LayoutConfig) -> (i64, i64) {
    let inner_max = (config.max_width - 2 * PADDING_X).max(CHAR_WIDTH);
    let mut widest = 0;
    let mut height = 2 * PADDING_Y;

    for line in text.lines() {
        let visible = strip_markup(line).chars().count() as i64 * CHAR_WIDTH;
        widest = widest.max(visible);

        let line_height = if line.starts_with('#') { HEADER_HEIGHT } else { LINE_HEIGHT };
        // Lines wider than the node wrap onto extra rows
        let rows = ((visible + inner_max - 1) / inner_max).max(1);
        height += line_height * rows;
    }

    let width = (widest + 2 * PADDING_X).clamp(config.min_width, config.max_width);
    let height = height.clamp(config.min_height, config.max_height);
    (width, height)
}

/// Drop heading markers, emphasis and inline code so only visible characters remain
pub fn strip_markup(line: &str) -> String {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            (r"^#{1,6}\s*", ""),
            (r"\*\*(.+?)\*\*", "$1"),
            (r"\*(.+?)\*", "$1"),
            (r"`(.+?)`", "$1"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).expect("valid markup regex"), replacement))
        .collect()
    });

    patterns
        .iter()
        .fold(line.to_string(), |text, (pattern, replacement)| {
            pattern.replace_all(&text, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("### async load"), "async load");
        assert_eq!(strip_markup("**count** = `3` *note*"), "count = 3 note");
    }

    #[test]
    fn test_short_text_uses_minimums() {
        let config = LayoutConfig::default();
        assert_eq!(measure("### a", &config), (config.min_width, config.min_height));
    }

    #[test]
    fn test_size_grows_with_text_and_is_clamped() {
        let config = LayoutConfig::default();
        let long_line = "x".repeat(40);
        let (width, height) = measure(&format!("### title\n{}\n{}", long_line, long_line), &config);
        assert_eq!(width, 40 * CHAR_WIDTH + 2 * PADDING_X);
        assert_eq!(height, (2 * PADDING_Y + HEADER_HEIGHT + 2 * LINE_HEIGHT).max(config.min_height));

        let huge = "word ".repeat(400);
        let (width, height) = measure(&huge, &config);
        assert_eq!(width, config.max_width);
        assert_eq!(height, config.max_height);
    }
}
