//! Resilient recovery of JSON objects from raw LLM output
//!
//! LLM responses wrap JSON in markdown fences, add `//` comments and
//! trailing commas, swap in typographic quotes, surround the object with
//! prose, and get cut off mid-object. [`extract`] runs a fixed sequence of
//! strategies and returns the first object that parses strictly.

use caseflow_domain::Record;
use serde_json::{Map, Value};
use tracing::debug;

/// Upper bound on cut points tried per tier during tail repair
const MAX_REPAIR_CUTS: usize = 64;

/// Which recovery strategy produced an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// First `{` to last `}`, cleaned
    DirectScan,
    /// The whole text, cleaned
    CleanedFullText,
    /// First brace-balanced span that parses
    BalancedScan,
    /// Truncated text closed off with the missing brackets
    TailRepair,
}

/// An object recovered from raw text
#[derive(Debug, Clone, PartialEq)]
pub struct Recovery {
    /// The recovered top-level object
    pub object: Map<String, Value>,
    /// Strategy that succeeded
    pub strategy: Strategy,
}

/// Recover a JSON object from raw LLM output
///
/// Returns `None` when no strategy yields an object. Never panics.
///
/// ```
/// use caseflow_extractor::parser::extract;
///
/// let text = "Sure!\n```json\n{\"case_results\": [1, 2,],}\n```";
/// let object = extract(text).unwrap();
/// assert_eq!(object["case_results"].as_array().unwrap().len(), 2);
/// ```
pub fn extract(text: &str) -> Option<Map<String, Value>> {
    extract_with_strategy(text).map(|r| r.object)
}

/// Like [`extract`], also reporting which strategy succeeded
pub fn extract_with_strategy(text: &str) -> Option<Recovery> {
    let attempts: [(Strategy, fn(&str) -> Option<Map<String, Value>>); 4] = [
        (Strategy::DirectScan, direct_scan),
        (Strategy::CleanedFullText, cleaned_full_text),
        (Strategy::BalancedScan, balanced_scan),
        (Strategy::TailRepair, tail_repair),
    ];

    for (strategy, run) in attempts {
        if let Some(object) = run(text) {
            debug!("Recovered JSON object via {:?}", strategy);
            return Some(Recovery { object, strategy });
        }
    }

    debug!("No JSON object recovered from {} chars", text.len());
    None
}

/// Pull the record list stored under `key`
///
/// Returns `None` when the key is missing or does not hold an array.
/// Array elements that are not objects are skipped.
pub fn extract_records(object: &Map<String, Value>, key: &str) -> Option<Vec<Record>> {
    let items = object.get(key)?.as_array()?;
    Some(items.iter().filter_map(Record::from_json).collect())
}

/// Serialize a recovered object so it can be fed back through [`extract`]
pub fn to_text(object: &Map<String, Value>) -> String {
    Value::Object(object.clone()).to_string()
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn direct_scan(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    parse_object(&clean(&text[start..=end]))
}

fn cleaned_full_text(text: &str) -> Option<Map<String, Value>> {
    parse_object(&clean(text))
}

/// Try each top-level brace-balanced span in turn.
///
/// A span that fails to parse is skipped as a whole; scanning resumes at the
/// next `{` after it. Stops when a span never closes.
fn balanced_scan(text: &str) -> Option<Map<String, Value>> {
    let mut from = 0;
    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        let len = balanced_span_len(&text[start..])?;
        if let Some(object) = parse_object(&clean(&text[start..start + len])) {
            return Some(object);
        }
        from = start + len;
    }
    None
}

/// Byte length of the brace-balanced span at the start of `text`
fn balanced_span_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
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
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Close off a truncated object.
///
/// Candidates, first parse wins:
/// 1. cut right after the latest complete array element, so a half-written
///    trailing record is dropped rather than kept partially
/// 2. the whole text with the open string and brackets closed
/// 3. cut right after any other complete value, latest first
fn tail_repair(text: &str) -> Option<Map<String, Value>> {
    let start = text.find('{')?;
    let cleaned = clean(&text[start..]);

    let mut stack: Vec<char> = Vec::new();
    let mut element_cuts: Vec<(usize, Vec<char>)> = Vec::new();
    let mut value_cuts: Vec<(usize, Vec<char>)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut consistent = true;

    for (i, c) in cleaned.char_indices() {
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
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.last() != Some(&c) {
                    consistent = false;
                    break;
                }
                stack.pop();
                if stack.is_empty() {
                    return parse_object(&cleaned[..=i]);
                }
                let cut = (i + 1, stack.clone());
                if stack.last() == Some(&']') {
                    element_cuts.push(cut);
                } else {
                    value_cuts.push(cut);
                }
            }
            _ => {}
        }
    }

    for (end, open) in element_cuts.iter().rev().take(MAX_REPAIR_CUTS) {
        if let Some(object) = parse_object(&clean(&close_with(&cleaned[..*end], open))) {
            return Some(object);
        }
    }

    if consistent {
        let mut body = cleaned.clone();
        if in_string {
            if escaped {
                body.pop();
            }
            body.push('"');
        }
        if let Some(object) = parse_object(&clean(&close_with(&body, &stack))) {
            return Some(object);
        }
    }

    value_cuts
        .iter()
        .rev()
        .take(MAX_REPAIR_CUTS)
        .find_map(|(end, open)| parse_object(&clean(&close_with(&cleaned[..*end], open))))
}

fn close_with(body: &str, open: &[char]) -> String {
    let mut closed = String::with_capacity(body.len() + open.len());
    closed.push_str(body);
    closed.extend(open.iter().rev());
    closed
}

/// Normalize LLM-flavoured JSON towards strict JSON
///
/// Outside string literals this strips markdown fences, `//` and `/* */`
/// comments and trailing commas, and turns typographic quotes into ASCII.
/// A string opened with a typographic double quote may close with one.
/// String literal contents are never altered.
pub fn clean(text: &str) -> String {
    strip_trailing_commas(&strip_noise(text))
}

#[derive(Clone, Copy, PartialEq)]
enum Delimiter {
    Ascii,
    Typographic,
}

fn is_typographic_double(c: char) -> bool {
    matches!(c, '\u{201C}' | '\u{201D}')
}

fn is_typographic_single(c: char) -> bool {
    matches!(c, '\u{2018}' | '\u{2019}')
}

fn starts_with_at(chars: &[char], i: usize, pattern: &str, ignore_case: bool) -> bool {
    pattern.chars().enumerate().all(|(k, p)| match chars.get(i + k) {
        Some(c) if ignore_case => c.to_ascii_lowercase() == p,
        Some(c) => *c == p,
        None => false,
    })
}

fn strip_noise(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut delimiter: Option<Delimiter> = None;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if let Some(kind) = delimiter {
            if escaped {
                escaped = false;
                out.push(c);
            } else if c == '\\' {
                escaped = true;
                out.push(c);
            } else if kind == Delimiter::Ascii && c == '"' {
                delimiter = None;
                out.push(c);
            } else if kind == Delimiter::Typographic && is_typographic_double(c) {
                delimiter = None;
                out.push('"');
            } else if kind == Delimiter::Typographic && c == '"' {
                out.push_str("\\\"");
            } else {
                out.push(c);
            }
            i += 1;
            continue;
        }

        if starts_with_at(&chars, i, "```", false) {
            i += 3;
            if starts_with_at(&chars, i, "json", true) {
                i += 4;
            }
            continue;
        }

        if starts_with_at(&chars, i, "//", false) {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if starts_with_at(&chars, i, "/*", false) {
            i += 2;
            while i < chars.len() && !starts_with_at(&chars, i, "*/", false) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }

        if c == '"' {
            delimiter = Some(Delimiter::Ascii);
            out.push(c);
        } else if is_typographic_double(c) {
            delimiter = Some(Delimiter::Typographic);
            out.push('"');
        } else if is_typographic_single(c) {
            out.push('\'');
        } else {
            out.push(c);
        }
        i += 1;
    }

    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            out.push(c);
            continue;
        }

        if c == ',' {
            let next = chars[i + 1..]
                .iter()
                .find(|n| !n.is_whitespace() && **n != ',');
            if matches!(next, Some('}') | Some(']')) {
                continue;
            }
        } else if c == '"' {
            in_string = true;
        }
        out.push(c);
    }

    out
}
