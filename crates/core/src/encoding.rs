//! Text decoding of archive entries and Unicode normalization of display strings.

use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode an archive entry as UTF-8, dropping a leading BOM.
///
/// Invalid sequences are replaced rather than rejected; the caller is told
/// through the second tuple element so it can log the lossy decode.
pub fn decode_text(bytes: &[u8]) -> (String, bool) {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match String::from_utf8_lossy(bytes) {
        Cow::Borrowed(s) => (s.to_string(), false),
        Cow::Owned(s) => (s, true),
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// NFC-normalize and whitespace-collapse a title or label.
pub fn normalize_display(s: &str) -> String {
    collapse_whitespace(&s.nfc().collect::<String>())
}
