//! Raw header block parsing, whitelisting, and content-type classification.

use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

/// Response headers that are passed through to the client.
pub const FORWARDED_HEADERS: &[&str] = &[
    "Set-Cookie",
    "Expires",
    "Last-Modified",
    "Cache-Control",
    "Content-Type",
    "Pragma",
];

/// Obsolete line folding: a line break followed by spaces or tabs.
static FOLDED_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n[\t ]+").unwrap());

/// Value(s) recorded for one header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderEntry {
    Single(String),
    Multiple(Vec<String>),
}

impl HeaderEntry {
    /// The first value seen for this name.
    pub fn first(&self) -> &str {
        match self {
            HeaderEntry::Single(value) => value,
            HeaderEntry::Multiple(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// All values in the order they appeared.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            HeaderEntry::Single(value) => std::slice::from_ref(value),
            HeaderEntry::Multiple(values) => values,
        };
        slice.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderEntry::Single(first) => {
                *self = HeaderEntry::Multiple(vec![std::mem::take(first), value]);
            }
            HeaderEntry::Multiple(values) => values.push(value),
        }
    }
}

/// Headers keyed by normalized (Title-Case) name, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedHeaders {
    entries: IndexMap<String, HeaderEntry>,
}

impl ParsedHeaders {
    pub fn get(&self, name: &str) -> Option<&HeaderEntry> {
        self.entries.get(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Record a value, appending to any existing values for the same name.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        let name = normalize_name(name);
        let value = value.into();
        match self.entries.get_mut(&name) {
            Some(entry) => entry.push(value),
            None => {
                self.entries.insert(name, HeaderEntry::Single(value));
            }
        }
    }

    /// Overwrite an existing header with one value, keeping its position.
    pub fn replace(&mut self, name: &str, value: impl Into<String>) {
        if let Some(entry) = self.entries.get_mut(&normalize_name(name)) {
            *entry = HeaderEntry::Single(value.into());
        }
    }

    /// Flatten into header lines; a repeated name yields one line per value.
    pub fn lines(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .flat_map(|(name, entry)| {
                entry
                    .values()
                    .map(move |value| (name.clone(), value.to_owned()))
            })
            .collect()
    }
}

/// Parse a single header section (status line plus `Name: value` lines).
///
/// Lines without a `": "` separator, such as the status line, are skipped.
pub fn parse(raw: &str) -> ParsedHeaders {
    let unfolded = FOLDED_LINE.replace_all(raw, " ");
    let mut headers = ParsedHeaders::default();

    for line in unfolded.lines() {
        let Some((name, value)) = line.split_once(": ") else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        headers.append(name, value);
    }

    headers
}

/// Keep only the headers whose names appear in `allowed`.
pub fn select_forwardable(headers: &ParsedHeaders, allowed: &[String]) -> ParsedHeaders {
    let allowed: Vec<String> = allowed.iter().map(|name| normalize_name(name)).collect();
    let entries = headers
        .entries
        .iter()
        .filter(|(name, _)| allowed.contains(name))
        .map(|(name, entry)| (name.clone(), entry.clone()))
        .collect();
    ParsedHeaders { entries }
}

/// MIME type of the response, without parameters (`text/html; charset=utf-8` -> `text/html`).
pub fn classify_content_type(headers: &ParsedHeaders) -> Option<String> {
    let value = headers.get("Content-Type")?.first();
    let mime = value.split(';').next().unwrap_or_default().trim();
    if mime.is_empty() {
        return None;
    }
    Some(mime.to_ascii_lowercase())
}

/// Return the final section of a header block.
///
/// When a transport follows redirects it reports every intermediate response,
/// each starting with its own `HTTP/x` status line. Only the last one
/// describes the body.
pub fn last_section(raw: &str) -> &str {
    let mut rest = raw.trim_start();
    loop {
        let Some((_, next)) = split_blank_line(rest) else {
            return rest;
        };
        let next = next.trim_start_matches(['\r', '\n']);
        if next.starts_with("HTTP") {
            rest = next;
        } else {
            return rest;
        }
    }
}

fn split_blank_line(raw: &str) -> Option<(&str, &str)> {
    match (raw.find("\r\n\r\n"), raw.find("\n\n")) {
        (Some(crlf), Some(lf)) if lf < crlf => Some((&raw[..lf], &raw[lf + 2..])),
        (Some(crlf), _) => Some((&raw[..crlf], &raw[crlf + 4..])),
        (None, Some(lf)) => Some((&raw[..lf], &raw[lf + 2..])),
        (None, None) => None,
    }
}

/// Lower-case a header name, then upper-case the first letter of each word.
///
/// Words are separated by spaces, tabs, or hyphens (`x-FORWARDED-for` -> `X-Forwarded-For`).
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut word_start = true;
    for ch in name.trim().chars() {
        if word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        word_start = matches!(ch, ' ' | '\t' | '-');
    }
    out
}
