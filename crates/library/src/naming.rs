//! Numbered file and folder names.
//!
//! Everything cdman writes is named `"<zero-padded ordinal> <name>"`. The
//! helpers here build those names and strip them back to the canonical name
//! used to recognise an entry across reorderings.

use regex::Regex;
use std::sync::LazyLock;

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\s+(.*)$").unwrap());

/// Strip a leading `"<digits><whitespace>"` prefix, if any.
pub fn unnumber(name: &str) -> &str {
    match NUMBERED.captures(name).and_then(|c| c.get(1)) {
        Some(rest) => rest.as_str(),
        None => name,
    }
}

/// Digits used for ordinals among `count` siblings; never fewer than two.
pub fn width(count: usize) -> usize {
    count.to_string().len().max(2)
}

/// Zero-padded ordinal for position `ordinal` (1-based) of `count`.
pub fn prefix(ordinal: usize, count: usize) -> String {
    format!("{ordinal:0width$}", width = width(count))
}

/// `"<prefix> <name>"`.
pub fn numbered(ordinal: usize, count: usize, name: &str) -> String {
    format!("{} {name}", prefix(ordinal, count))
}
