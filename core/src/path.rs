//! URL prefix and resource path derivation.
//!
//! # Design
//! Pure string functions with no I/O and no configuration of their own.
//! `RequestBuilder` resolves the root path once per adapter and calls
//! `resource_path` per request.
//!
//! Pluralization covers regular English forms only (`s`, `es`, consonant +
//! `y` to `ies`). Irregular nouns such as "person" come out as "persons";
//! services that use other segments should name the resource type after the
//! segment they expect.

/// Combine a base service address and an optional namespace into a prefix
/// with no trailing slash.
///
/// A namespace starting with `/` replaces the base address's path; any other
/// namespace is appended to it. Repeated separators collapse to one.
pub fn root_path(base_url: &str, namespace: Option<&str>) -> String {
    let (origin, base_path) = split_origin(base_url);
    let base_path = base_path.split(['?', '#']).next().unwrap_or_default();

    let path = match namespace.filter(|ns| !ns.is_empty()) {
        Some(ns) if ns.starts_with('/') => ns.to_string(),
        Some(ns) => format!("{base_path}/{ns}"),
        None => base_path.to_string(),
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return origin.trim_end_matches('/').to_string();
    }
    format!("{origin}/{}", segments.join("/"))
}

/// Split `scheme://authority/path` into `("scheme://authority", "/path")`.
/// Addresses without a scheme are treated as path-only.
fn split_origin(url: &str) -> (&str, &str) {
    let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    match url[authority_start..].find('/') {
        Some(i) => url.split_at(authority_start + i),
        None if authority_start > 0 => (url, ""),
        None => ("", url),
    }
}

/// `"PostGroup"` → `"post_groups"`.
pub fn resource_path(resource_name: &str) -> String {
    pluralize(&decamelize(resource_name))
}

/// Insert `_` between a lowercase letter or digit and a following uppercase
/// letter, then lowercase everything. Runs of capitals stay joined
/// (`"HTMLPage"` → `"htmlpage"`).
pub fn decamelize(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if let Some(p) = prev {
            if (p.is_ascii_lowercase() || p.is_ascii_digit()) && c.is_ascii_uppercase() {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
        prev = Some(c);
    }
    out
}

pub fn pluralize(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    if let Some(stem) = word.strip_suffix('y') {
        let after_consonant = stem
            .chars()
            .last()
            .is_some_and(|c| c.is_ascii_alphabetic() && !"aeiou".contains(c));
        if after_consonant {
            return format!("{stem}ies");
        }
    }
    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }
    format!("{word}s")
}
