//! Image extraction: every image in the manifest becomes an inline `data:` URI.

use base64::Engine as _;
use indexmap::IndexMap;

use crate::archive::EpubArchive;
use crate::package::{ManifestItem, PackageDocument};
use crate::path;

/// Inline image data keyed by the normalized manifest href.
///
/// Keys are manifest-relative (`images/a.png`), not archive paths
/// (`OEBPS/images/a.png`): chapter references resolved against a
/// manifest-relative chapter href land on the same key.
#[derive(Debug, Clone, Default)]
pub struct ImageMap {
    images: IndexMap<String, String>,
}

impl ImageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, data_uri: String) {
        self.images.insert(key, data_uri);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.images.get(key).map(String::as_str)
    }

    /// Look up a resolved reference: exact key, then percent-decoded key, then
    /// the first key whose final segment equals the reference's file name.
    pub fn lookup(&self, resolved: &str) -> Option<&str> {
        if let Some(uri) = self.get(resolved) {
            return Some(uri);
        }
        let decoded = path::decode(resolved);
        if let Some(uri) = self.get(&decoded) {
            return Some(uri);
        }

        let name = path::file_name(&decoded);
        if name.is_empty() {
            return None;
        }
        let suffix = format!("/{name}");
        self.images
            .iter()
            .find(|(key, _)| key.as_str() == name || key.ends_with(&suffix))
            .map(|(key, uri)| {
                tracing::debug!("Image {} matched by file name to {}", resolved, key);
                uri.as_str()
            })
    }

    /// Entries in insertion (manifest) order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.images.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn first(&self) -> Option<&str> {
        self.images.values().next().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Read every image-typed manifest entry and encode it as a data URI.
/// Missing or unreadable files are skipped with a warning.
pub fn extract_images(archive: &mut EpubArchive, package: &PackageDocument) -> ImageMap {
    let mut map = ImageMap::new();

    for item in package.image_items() {
        let full_path = package.resolve(&item.href);
        match archive.read_bytes(&full_path) {
            Ok(data) => {
                let key = path::normalize(&item.href);
                map.insert(key, data_uri(&mime_type(item, &full_path), &data));
            }
            Err(e) => {
                tracing::warn!("Skipping image '{}': {}", item.id, e);
            }
        }
    }

    tracing::debug!("Extracted {} images", map.len());
    map
}

pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(data)
    )
}

/// MIME type from the manifest when it is a standard image type, else from the extension.
fn mime_type(item: &ManifestItem, full_path: &str) -> String {
    let declared = item.media_type.trim().to_ascii_lowercase();
    match declared.as_str() {
        "image/jpeg" | "image/png" | "image/gif" | "image/svg+xml" | "image/webp" => declared,
        _ => mime_from_extension(full_path).to_string(),
    }
}

pub fn mime_from_extension(p: &str) -> &'static str {
    match path::extension(p).as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}
