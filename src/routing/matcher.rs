//! Route matching logic.
//!
//! # Responsibilities
//! - Normalize path prefixes and header names for storage and lookup
//! - Pick the claimed prefix a request path falls under
//!
//! # Design Decisions
//! - Paths are case-insensitive (lowercased on both sides)
//! - Header names are case-insensitive as in HTTP; values are exact
//! - Prefix semantics are plain string prefixes, not path segments:
//!   `/foo` claims `/foo`, `/foo/x` and also `/foobar`
//! - When several prefixes match, the longest wins. This makes resolution
//!   deterministic regardless of map iteration order
//! - O(n) scan over registered prefixes; no trie

use std::collections::HashMap;

/// Lowercase a path or prefix.
pub fn normalize_path(path: &str) -> String {
    path.to_lowercase()
}

/// Lowercase a header name.
pub fn normalize_header_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Find the longest registered prefix of an already-normalized `path`.
pub fn longest_prefix_match<'a, V>(prefixes: &'a HashMap<String, V>, path: &str) -> Option<(&'a str, &'a V)> {
    prefixes
        .iter()
        .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(prefix, value)| (prefix.as_str(), value))
}
