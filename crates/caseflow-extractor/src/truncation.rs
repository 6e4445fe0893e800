//! Truncation heuristics for raw LLM output
//!
//! The finish reason reported by the provider is not always reliable, so the
//! text itself is inspected for signs of having been cut off.

use regex::Regex;
use std::sync::LazyLock;

/// Size of the tail window inspected for unbalanced brackets, in characters
pub const TAIL_WINDOW: usize = 500;

const TERMINAL_CHARS: [char; 6] = ['.', '!', '?', ']', '}', '"'];

static FENCE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```json\s*\{").expect("valid regex"));

static FENCE_CLOSED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json\s*\{.*\}\s*```").expect("valid regex"));

/// Whether `text` looks like it was cut off mid-output
///
/// True when any of these hold:
/// - the text does not end with `. ! ? ] } "` (trailing whitespace ignored)
/// - a ```` ```json { ```` block is never closed, or fence markers are unpaired
/// - the last 500 characters open more `{`/`[` than they close (brackets
///   inside string literals do not count)
///
/// Empty or whitespace-only text is not considered truncated.
///
/// ```
/// use caseflow_extractor::truncation::is_truncated;
///
/// assert!(!is_truncated(r#"{"case_results": []}"#));
/// assert!(is_truncated(r#"{"case_results": [{"age": "#));
/// ```
pub fn is_truncated(text: &str) -> bool {
    let trimmed = text.trim_end();
    let Some(last) = trimmed.chars().last() else {
        return false;
    };

    if !TERMINAL_CHARS.contains(&last) {
        return true;
    }

    if has_unclosed_fence(trimmed) {
        return true;
    }

    tail_is_unbalanced(trimmed)
}

fn has_unclosed_fence(text: &str) -> bool {
    if FENCE_OPEN.is_match(text) && !FENCE_CLOSED.is_match(text) {
        return true;
    }
    text.matches("```").count() % 2 == 1
}

/// Counts brackets in the tail window, skipping string literal contents.
///
/// String state is tracked from the start of the text so that a window
/// beginning inside a literal is still classified correctly.
fn tail_is_unbalanced(text: &str) -> bool {
    let total = text.chars().count();
    let window_start = total.saturating_sub(TAIL_WINDOW);

    let (mut open_braces, mut close_braces) = (0usize, 0usize);
    let (mut open_brackets, mut close_brackets) = (0usize, 0usize);
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.chars().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            continue;
        }
        if i < window_start {
            continue;
        }
        match c {
            '{' => open_braces += 1,
            '}' => close_braces += 1,
            '[' => open_brackets += 1,
            ']' => close_brackets += 1,
            _ => {}
        }
    }

    open_braces > close_braces || open_brackets > close_brackets
}
