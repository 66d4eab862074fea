//! Slop Detection
//!
//! A post is slop when its text contains an emoji (Unicode `Emoji_Presentation`
//! or `Extended_Pictographic`) or an em dash (U+2014).
//!
//! Matching uses `Regex::is_match`/`Regex::find`, which keep no position state
//! between calls, so the detector is safe to call repeatedly with unrelated
//! inputs.

use std::sync::OnceLock;

use regex::Regex;

/// The em dash character.
pub const EM_DASH: char = '\u{2014}';

static EMOJI_PATTERN: OnceLock<Regex> = OnceLock::new();

fn emoji_pattern() -> &'static Regex {
    EMOJI_PATTERN.get_or_init(|| {
        Regex::new(r"\p{Emoji_Presentation}|\p{Extended_Pictographic}")
            .expect("emoji property pattern is valid")
    })
}

/// What kind of character flagged a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlopKind {
    Emoji,
    EmDash,
}

/// First offending character found in a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlopMatch {
    pub kind: SlopKind,
    /// Byte offset of the character in the scanned text
    pub offset: usize,
    pub ch: char,
}

/// Returns true if `text` contains an emoji or an em dash.
pub fn contains_slop(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    text.contains(EM_DASH) || emoji_pattern().is_match(text)
}

/// Locate the earliest slop character in `text`.
pub fn find_slop(text: &str) -> Option<SlopMatch> {
    if text.is_empty() {
        return None;
    }

    let emoji = emoji_pattern().find(text).map(|m| SlopMatch {
        kind: SlopKind::Emoji,
        offset: m.start(),
        ch: m.as_str().chars().next().unwrap_or_default(),
    });
    let dash = text.find(EM_DASH).map(|offset| SlopMatch {
        kind: SlopKind::EmDash,
        offset,
        ch: EM_DASH,
    });

    match (emoji, dash) {
        (Some(e), Some(d)) => Some(if d.offset < e.offset { d } else { e }),
        (e, d) => e.or(d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_slop_examples() {
        assert!(contains_slop("Great work 🎉"));
        assert!(contains_slop("A — B"));
        assert!(!contains_slop("Plain text."));
        assert!(!contains_slop(""));
    }

    #[test]
    fn test_successive_calls_are_independent() {
        assert!(contains_slop("🎉"));
        assert!(!contains_slop("plain"));
        assert!(contains_slop("🎉"));
        assert!(contains_slop("🎉"));
        assert!(!contains_slop("plain"));
    }

    #[test]
    fn test_dash_lookalikes_are_clean() {
        // en dash, hyphen, horizontal bar
        assert!(!contains_slop("2020\u{2013}2024"));
        assert!(!contains_slop("well-known"));
        assert!(!contains_slop("a \u{2015} b"));
    }

    #[test]
    fn test_pictographs_without_presentation() {
        // Extended_Pictographic without default emoji presentation
        assert!(contains_slop("I \u{2764} Rust"));
        assert!(contains_slop("Call \u{260E} now"));
    }

    #[test]
    fn test_plain_digits_and_symbols_are_clean() {
        assert!(!contains_slop("Q3 revenue grew 12% (#1 in EMEA) * see notes"));
    }

    #[test]
    fn test_find_slop_reports_earliest() {
        let m = find_slop("x — then 🚀").unwrap();
        assert_eq!(m.kind, SlopKind::EmDash);
        assert_eq!(m.offset, 2);

        let m = find_slop("🚀 then —").unwrap();
        assert_eq!(m.kind, SlopKind::Emoji);
        assert_eq!(m.offset, 0);
        assert_eq!(m.ch, '🚀');

        assert_eq!(find_slop("nothing here"), None);
        assert_eq!(find_slop(""), None);
    }
}
