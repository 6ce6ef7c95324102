//! POSIX-style path helpers for archive-internal references.
//!
//! Archive paths never start with `/`; every helper here works on plain
//! strings and never touches the filesystem.

use std::borrow::Cow;

/// Strip leading `./` segments and collapse repeated separators.
pub fn normalize(path: &str) -> String {
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped.trim_start_matches('/');
    }

    let mut out = String::with_capacity(rest.len());
    let mut prev_slash = false;
    for c in rest.chars() {
        if c == '/' {
            if !prev_slash {
                out.push(c);
            }
            prev_slash = true;
        } else {
            out.push(c);
            prev_slash = false;
        }
    }
    out
}

/// Resolve `relative` against the directory containing `base`.
///
/// `base` is treated as a file path: its last segment is dropped, so
/// `resolve("OEBPS/content.opf", "text/ch1.xhtml")` is `OEBPS/text/ch1.xhtml`
/// and a trailing slash (`"OEBPS/"`) means "this directory". `..` pops a
/// segment and is clamped at the archive root.
pub fn resolve(base: &str, relative: &str) -> String {
    let mut segments: Vec<&str> = base.split('/').collect();
    segments.pop();
    segments.retain(|s| !s.is_empty() && *s != ".");

    for part in relative.split('/') {
        match part {
            ".." => {
                if segments.pop().is_none() {
                    tracing::debug!("Path {relative} climbs above the archive root from {base}");
                }
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }

    segments.join("/")
}

/// Directory part of a path including the trailing slash (`"a/b/c.x"` → `"a/b/"`).
pub fn dirname(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..=i]).unwrap_or("")
}

/// Last path segment.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// File name without its final extension.
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(i) => &name[..i],
    }
}

/// Lower-cased final extension, if any.
pub fn extension(path: &str) -> Option<String> {
    let name = file_name(path);
    name.rfind('.')
        .filter(|&i| i > 0 && i + 1 < name.len())
        .map(|i| name[i + 1..].to_ascii_lowercase())
}

/// Split `path#fragment` into its parts. The fragment excludes the `#`.
pub fn split_fragment(href: &str) -> (&str, Option<&str>) {
    match href.split_once('#') {
        Some((base, frag)) => (base, Some(frag)),
        None => (href, None),
    }
}

/// Percent-decode a reference; returns the input unchanged if it is not valid UTF-8 once decoded.
pub fn decode(href: &str) -> Cow<'_, str> {
    percent_encoding::percent_decode_str(href)
        .decode_utf8()
        .unwrap_or(Cow::Borrowed(href))
}

/// True if the reference carries a URI scheme (`mailto:`, `http:`, ...).
pub fn has_scheme(href: &str) -> bool {
    let end = href.find(['/', '?', '#']).unwrap_or(href.len());
    match href[..end].find(':') {
        Some(i) if i > 0 => {
            let scheme = &href[..i];
            scheme.starts_with(|c: char| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// Absolute web reference (`http://`, `https://`, protocol-relative `//`).
pub fn is_external(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
}
