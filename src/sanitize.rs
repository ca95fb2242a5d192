//! Cleans captured terminal output for structured transport.

use once_cell::sync::Lazy;
use regex::Regex;

// CSI (colours, cursor movement), OSC (titles, hyperlinks) and two-byte escapes.
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("valid ANSI regex")
});

static CONTROL_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]").expect("valid control regex"));

static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("valid blank-line regex"));

/// Strips escape sequences and stray control characters, normalises line
/// endings to `\n` and collapses runs of blank lines to a single blank line.
///
/// Idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(raw: &str) -> String {
    let without_escapes = ANSI_ESCAPE.replace_all(raw, "");
    let normalized = without_escapes.replace("\r\n", "\n").replace('\r', "\n");
    let without_controls = CONTROL_CHARS.replace_all(&normalized, "");

    let blanked: Vec<&str> = without_controls
        .split('\n')
        .map(|line| if line.trim().is_empty() { "" } else { line })
        .collect();
    let joined = blanked.join("\n");

    BLANK_RUN.replace_all(&joined, "\n\n").into_owned()
}
