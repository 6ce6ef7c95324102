//! Cover selection over the extracted images.

use crate::fallback::FallbackChain;
use crate::images::ImageMap;
use crate::package::PackageDocument;
use crate::path;

struct CoverInput<'a> {
    package: &'a PackageDocument,
    images: &'a ImageMap,
}

/// Pick the book cover as a data URI.
///
/// 1. the package's designated cover (`<meta name="cover">`, then an EPUB 3
///    `cover-image` item), looked up by manifest href and by archive path;
/// 2. the first image whose key contains "cover" (case-insensitive);
/// 3. the first image in manifest order.
pub fn resolve_cover(package: &PackageDocument, images: &ImageMap) -> Option<String> {
    let chain: FallbackChain<'_, CoverInput<'_>, String> = FallbackChain::new()
        .rule("cover-meta", |input: &CoverInput<'_>| {
            let id = input.package.metadata.cover_id.as_deref()?;
            let item = input.package.item(id)?;
            designated(input, &item.href)
        })
        .rule("cover-image-property", |input: &CoverInput<'_>| {
            let item = input.package.cover_image_item()?;
            designated(input, &item.href)
        })
        .rule("file-name", |input: &CoverInput<'_>| {
            input
                .images
                .iter()
                .find(|(key, _)| key.to_lowercase().contains("cover"))
                .map(|(_, uri)| uri.to_string())
        })
        .rule("first-image", |input: &CoverInput<'_>| input.images.first().map(str::to_string));

    let input = CoverInput { package, images };
    match chain.resolve_named(&input) {
        Some((rule, uri)) => {
            tracing::debug!("Cover selected by rule {}", rule);
            Some(uri)
        }
        None => {
            tracing::debug!("No cover image found");
            None
        }
    }
}

/// Look up a manifest href two ways to tolerate path-representation drift.
fn designated(input: &CoverInput<'_>, href: &str) -> Option<String> {
    input
        .images
        .get(&path::normalize(href))
        .or_else(|| input.images.get(&input.package.resolve(href)))
        .map(str::to_string)
}
