// File: kousen-core/src/parsing.rs
//
// String helpers for prefix stripping, command-name tokens and argument
// splitting. Pure functions, no suspension points.

/// Split off the first whitespace-delimited token. Leading whitespace is
/// skipped; the remainder keeps its own leading whitespace.
pub fn split_first_token(content: &str) -> (&str, &str) {
    let content = content.trim_start();
    match content.find(char::is_whitespace) {
        Some(idx) => (&content[..idx], &content[idx..]),
        None => (content, ""),
    }
}

/// Strip `prefix` from the start of `content`, comparing case-insensitively
/// when asked. Returns the text after the prefix.
pub fn strip_prefix<'a>(content: &'a str, prefix: &str, case_insensitive: bool) -> Option<&'a str> {
    if !case_insensitive {
        return content.strip_prefix(prefix);
    }

    // Walk char by char so the byte offset is taken from `content` itself;
    // lowercasing can change byte lengths.
    let mut content_chars = content.char_indices();
    for p in prefix.chars() {
        let (_, c) = content_chars.next()?;
        if !c.to_lowercase().eq(p.to_lowercase()) {
            return None;
        }
    }
    match content_chars.next() {
        Some((idx, _)) => Some(&content[idx..]),
        None => Some(""),
    }
}

/// Order candidate prefixes longest first. Equal lengths keep their original
/// order.
pub fn sort_prefixes(prefixes: &mut [String]) {
    prefixes.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
}

/// Find the prefix `content` starts with. `prefixes` must already be sorted by
/// [`sort_prefixes`]; the first match, i.e. the longest, wins.
pub fn match_prefix<'p>(content: &str, prefixes: &'p [String], case_insensitive: bool) -> Option<&'p str> {
    prefixes
        .iter()
        .find(|p| strip_prefix(content, p, case_insensitive).is_some())
        .map(|p| p.as_str())
}

/// Split argument text on `separator`. A whitespace-only separator splits on
/// any run of whitespace. Empty pieces are dropped.
pub fn split_arguments<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.trim().is_empty() {
        return text.split_whitespace().collect();
    }
    text.split(separator)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
