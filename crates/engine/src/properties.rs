//! Property bags and their string form.
//!
//! Job parameters and artifact properties are plain string maps. When an
//! execution is persisted its parameters travel as a single string, one
//! `key=value` line per entry.

use std::collections::BTreeMap;

/// Ordered string-to-string property map.
pub type Properties = BTreeMap<String, String>;

/// Encode properties as `key=value` lines.
///
/// Backslash, line breaks, and tabs are escaped everywhere; `=` and `:` are
/// escaped in keys, as is a leading `#` or `!` so the line is not read back
/// as a comment.
pub fn properties_to_string(props: &Properties) -> String {
    let mut out = String::new();
    for (key, value) in props {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

/// Decode the output of [`properties_to_string`].
///
/// Blank lines and lines starting with `#` or `!` are skipped. A line with no
/// unescaped `=` is a key with an empty value.
pub fn string_to_properties(text: &str) -> Properties {
    let mut props = Properties::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let (key, value) = split_entry(line);
        props.insert(unescape(key), unescape(value));
    }
    props
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '=' | ':' if is_key => {
                out.push('\\');
                out.push(c);
            }
            '#' | '!' if is_key && i == 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Split at the first `=` not preceded by an escaping backslash.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' => return (&line[..i], &line[i + 1..]),
            _ => {}
        }
    }
    (line, "")
}
