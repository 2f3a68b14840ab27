//! Post-processing: deterministic cleanup of model output before it is stored.
//!
//! Even well-prompted models add artefacts that carry no content: a code
//! fence around the whole answer, the `---` delimiters of the request echoed
//! back, Windows line endings, zero-width characters. These rules remove them
//! without touching the words.
//!
//! ## Rule Order
//!
//! Fences are stripped before delimiters so a fenced answer that also echoes
//! the delimiters is fully unwrapped; trimming runs last.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model answer.
///
/// 1. Strip an outer code fence (with or without a language tag)
/// 2. Drop echoed `---` delimiter lines at the start and end
/// 3. Normalise line endings (CRLF → LF)
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Collapse runs of blank lines to a single blank line
/// 6. Trim surrounding whitespace
pub fn clean_text(input: &str) -> String {
    let s = strip_outer_fence(input);
    let s = strip_echoed_delimiters(&s);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fence ───────────────────────────────────────────

static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCE.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 2: Drop echoed delimiters ───────────────────────────────────────────

fn strip_echoed_delimiters(input: &str) -> String {
    let mut lines: Vec<&str> = input.lines().collect();
    while lines.first().is_some_and(|l| l.trim() == "---") {
        lines.remove(0);
    }
    while lines.last().is_some_and(|l| l.trim() == "---") {
        lines.pop();
    }
    lines.join("\n")
}

// ── Rule 3: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Collapse blank lines ─────────────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}
