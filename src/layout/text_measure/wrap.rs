//! Word-boundary text wrapping.
//!
//! Wrapping breaks at word boundaries (UAX #29); a single word wider than
//! the line falls back to grapheme breaks. Explicit newlines are hard
//! breaks. `wrapped_height` and `wrap_words` agree by construction: the
//! height of a text is the number of lines wrapping produces.

use unicode_segmentation::UnicodeSegmentation;

use super::width::cluster_width;

/// Wrap by word boundaries into display lines.
pub fn wrap_words(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    if max_width == 0 {
        return text.split('\n').map(str::to_string).collect();
    }

    let mut lines = Vec::new();
    for raw in text.split('\n') {
        wrap_line(raw, max_width, &mut lines);
    }
    lines
}

fn wrap_line(line: &str, max_width: usize, lines: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_width = 0usize;

    for segment in line.split_word_bounds() {
        let seg_width: usize = segment.graphemes(true).map(cluster_width).sum();

        if current_width + seg_width > max_width {
            if current_width > 0 {
                lines.push(current.trim_end().to_string());
                current = String::new();
                current_width = 0;
            }
            if seg_width > max_width {
                break_clusters(segment, max_width, lines, &mut current, &mut current_width);
                continue;
            }
            // Whitespace that caused the wrap is swallowed.
            if segment.chars().all(char::is_whitespace) {
                continue;
            }
        }

        current.push_str(segment);
        current_width += seg_width;
    }

    lines.push(current);
}

/// Grapheme-break fallback for a word wider than the line.
fn break_clusters(
    segment: &str,
    max_width: usize,
    lines: &mut Vec<String>,
    current: &mut String,
    current_width: &mut usize,
) {
    for cluster in segment.graphemes(true) {
        let cw = cluster_width(cluster);
        if *current_width + cw > max_width && !current.is_empty() {
            lines.push(std::mem::take(current));
            *current_width = 0;
        }
        current.push_str(cluster);
        *current_width += cw;
    }
}

/// Wrap at any grapheme boundary (no word awareness).
pub fn wrap_clusters(text: &str, max_width: usize) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    if max_width == 0 {
        return text.split('\n').map(str::to_string).collect();
    }

    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let mut current = String::new();
        let mut current_width = 0usize;
        for cluster in raw.graphemes(true) {
            let cw = cluster_width(cluster);
            if current_width + cw > max_width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            current.push_str(cluster);
            current_width += cw;
        }
        lines.push(current);
    }
    lines
}

/// Line count of `text` wrapped to `max_width` with word breaking.
pub fn wrapped_height(text: &str, max_width: usize) -> usize {
    if text.is_empty() {
        return 0;
    }
    wrap_words(text, max_width).len()
}

/// Clip to `max_width` cells at a grapheme boundary, appending `suffix`
/// when anything was removed.
pub fn clip_to_width(text: &str, max_width: usize, suffix: &str) -> String {
    if max_width == 0 {
        return String::new();
    }
    let total: usize = text.graphemes(true).map(cluster_width).sum();
    if total <= max_width {
        return text.to_string();
    }

    let suffix_width: usize = suffix.graphemes(true).map(cluster_width).sum();
    let budget = max_width.saturating_sub(suffix_width);

    let mut out = String::with_capacity(text.len());
    let mut used = 0usize;
    for cluster in text.graphemes(true) {
        let cw = cluster_width(cluster);
        if used + cw > budget {
            break;
        }
        out.push_str(cluster);
        used += cw;
    }
    if suffix_width <= max_width {
        out.push_str(suffix);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input() {
        assert!(wrap_words("", 10).is_empty());
        assert_eq!(wrapped_height("", 10), 0);
    }

    #[test]
    fn fits_on_one_line() {
        assert_eq!(wrap_words("hello", 10), vec!["hello"]);
    }

    #[test]
    fn wraps_at_word_boundary() {
        assert_eq!(
            wrap_words("hello brave world", 11),
            vec!["hello brave", "world"]
        );
    }

    #[test]
    fn long_word_breaks_on_grapheme() {
        assert_eq!(wrap_words("abcdefgh", 3), vec!["abc", "def", "gh"]);
    }

    #[test]
    fn hard_newlines_kept() {
        assert_eq!(wrap_words("a\n\nb", 10), vec!["a", "", "b"]);
    }

    #[test]
    fn wide_glyphs_count_double() {
        // Each ideograph is two cells, so only two fit per 4-cell line.
        assert_eq!(wrap_clusters("你好世界", 4), vec!["你好", "世界"]);
    }

    #[test]
    fn height_matches_wrap() {
        let text = "the quick brown fox jumps";
        for width in 1..30 {
            assert_eq!(wrapped_height(text, width), wrap_words(text, width).len());
        }
    }

    #[test]
    fn clip_appends_suffix() {
        assert_eq!(clip_to_width("hello world", 8, "…"), "hello w…");
        assert_eq!(clip_to_width("short", 8, "…"), "short");
        assert_eq!(clip_to_width("anything", 0, "…"), "");
    }

    #[test]
    fn clip_never_splits_wide_glyph() {
        // Clipping "你你" to 3 cells leaves one ideograph + suffix.
        assert_eq!(clip_to_width("你你", 3, "…"), "你…");
    }
}
