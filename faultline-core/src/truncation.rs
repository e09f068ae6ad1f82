//! Size limits for source context attached to events.
//!
//! All limits count characters, not bytes, and truncation is silent.

use std::borrow::Cow;

use crate::protocol::Map;

/// The longest source line kept in a frame's code map.
pub const MAX_LINE_LENGTH: usize = 200;

/// The longest script content kept in the `script` metadata tab.
pub const MAX_SCRIPT_LENGTH: usize = 500_000;

/// How many lines before and after the origin line are kept.
pub const SURROUNDING_LINES: u32 = 3;

/// Cuts `s` down to at most `max_chars` characters.
pub fn truncate(s: &str, max_chars: usize) -> Cow<'_, str> {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => Cow::Borrowed(&s[..idx]),
        None => Cow::Borrowed(s),
    }
}

/// Returns the script content to attach to an event.
pub fn script_content(source: &str) -> String {
    truncate(source, MAX_SCRIPT_LENGTH).into_owned()
}

/// Builds the code map for a frame at `line` (1-based).
///
/// Lines within [`SURROUNDING_LINES`] of `line` that exist in `source` are
/// included, each capped at [`MAX_LINE_LENGTH`].
pub fn surrounding_lines(source: &str, line: u32) -> Map<u32, String> {
    let first = line.saturating_sub(SURROUNDING_LINES).max(1);
    let last = line.saturating_add(SURROUNDING_LINES);
    source
        .lines()
        .enumerate()
        .map(|(idx, text)| (idx as u32 + 1, text))
        .skip_while(|(lineno, _)| *lineno < first)
        .take_while(|(lineno, _)| *lineno <= last)
        .map(|(lineno, text)| (lineno, truncate(text, MAX_LINE_LENGTH).into_owned()))
        .collect()
}
