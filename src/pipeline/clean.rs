//! Caption cleanup: deterministic normalisation of model-generated text.
//!
//! Vision models occasionally wrap a plain answer in code fences, emit CRLF
//! line endings, or sprinkle zero-width characters. These passes fix that
//! without touching wording.
//!
//! ## Rule Order
//!
//! Fences come off before line endings are normalised so the fence regex sees
//! the raw answer; invisible characters are removed before the final trim so a
//! stray BOM cannot keep an otherwise empty caption alive.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw caption.
///
/// Rules (applied in order):
/// 1. Strip outer code fences (```` ``` ```` / ```` ```text ```` / ```` ```markdown ````)
/// 2. Normalise line endings (CRLF / CR → LF)
/// 3. Trim trailing whitespace per line
/// 4. Collapse runs of blank lines to a single blank line
/// 5. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens…)
/// 6. Trim leading and trailing whitespace
///
/// The result may be empty; callers treat that as a failed caption.
pub fn clean_caption(input: &str) -> String {
    let s = strip_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer fences ───────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_fences(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Collapse blank-line runs ─────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

// ── Rule 5: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
