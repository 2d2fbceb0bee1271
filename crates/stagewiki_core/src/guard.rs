//! Guarded rewrite: tag exact matches with a marker that cannot occur in the
//! text, then resolve the marker. Only text matched by the pattern is ever
//! touched, even when the replaced value also appears elsewhere.

use regex::{Captures, Regex};

const MARKER_FENCE: char = '\u{E000}';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedOutcome {
    pub text: String,
    pub replaced: usize,
}

/// Replace everything after capture group 1 in each match of `pattern` with
/// `value`. Group 1 is kept verbatim.
pub fn guarded_rewrite(text: &str, pattern: &Regex, value: &str) -> GuardedOutcome {
    let marker = unique_marker(text, value);
    let mut replaced = 0usize;
    let tagged = pattern.replace_all(text, |caps: &Captures<'_>| {
        replaced += 1;
        let kept = caps.get(1).map_or("", |group| group.as_str());
        format!("{kept}{marker}")
    });
    if replaced == 0 {
        return GuardedOutcome {
            text: text.to_string(),
            replaced,
        };
    }
    GuardedOutcome {
        text: tagged.replace(&marker, value),
        replaced,
    }
}

/// A marker absent from both the text and the replacement, so resolving it
/// can neither touch original content nor leave a tag behind.
fn unique_marker(text: &str, value: &str) -> String {
    let mut attempt = 0usize;
    loop {
        let marker = format!("{MARKER_FENCE}guard{attempt}{MARKER_FENCE}");
        if !text.contains(&marker) && !value.contains(&marker) {
            return marker;
        }
        attempt += 1;
    }
}
