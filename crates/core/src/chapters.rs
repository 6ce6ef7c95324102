//! Chapter extraction: one [`Chapter`] per readable spine document.

use crate::archive::EpubArchive;
use crate::document::{chapter_id, Chapter};
use crate::encoding::normalize_display;
use crate::images::ImageMap;
use crate::markup::{find_element, for_each_element_mut, MarkupBackend, Node};
use crate::package::PackageDocument;
use crate::path;
use crate::progress::{emit_progress, IngestStage, ProgressHandler};
use crate::sanitize::Sanitizer;
use crate::title::{derive_title, TitleContext};

/// Turns spine documents into sanitized chapters.
pub struct ChapterExtractor<'a> {
    pub backend: &'a dyn MarkupBackend,
    pub sanitizer: &'a Sanitizer,
    pub images: &'a ImageMap,
    pub book_id: &'a str,
    pub book_title: &'a str,
    /// Replace `img[src]` with inline data URIs.
    pub inline_images: bool,
    /// NFC-normalize and whitespace-collapse titles.
    pub normalize_unicode: bool,
}

impl ChapterExtractor<'_> {
    /// Walk the spine in order. Unresolvable or unreadable items are logged
    /// and skipped, so indices stay dense over the chapters produced.
    pub fn extract(
        &self,
        archive: &mut EpubArchive,
        package: &PackageDocument,
        progress: Option<&dyn ProgressHandler>,
    ) -> Vec<Chapter> {
        let total = package.spine.len() as u64;
        let mut chapters = Vec::with_capacity(package.spine.len());

        for (position, spine_item) in package.spine.iter().enumerate() {
            emit_progress(
                progress,
                IngestStage::Chapters,
                position as u64,
                Some(total),
                None,
            );

            let Some(item) = package.item(&spine_item.idref) else {
                tracing::warn!(
                    "Spine item {} references unknown manifest id '{}'",
                    position,
                    spine_item.idref
                );
                continue;
            };

            let full_path = package.resolve(&item.href);
            let raw = match archive.read_text(&full_path) {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!("Skipping spine item {}: {}", position, e);
                    continue;
                }
            };

            chapters.push(self.build_chapter(chapters.len(), &item.href, &raw));
        }

        tracing::debug!(
            "Extracted {} chapters from {} spine items",
            chapters.len(),
            total
        );
        chapters
    }

    /// Build the chapter at `index` from a document's raw markup.
    pub fn build_chapter(&self, index: usize, href: &str, raw: &str) -> Chapter {
        let href = path::normalize(href);
        let mut nodes = self.backend.parse_document(raw);

        let heading = find_element(&nodes, &|el| matches!(el.name.as_str(), "h1" | "h2" | "h3"))
            .map(|el| el.text_content());

        if self.inline_images {
            let replaced = rewrite_image_sources(&mut nodes, self.images, &href);
            tracing::debug!("Chapter {}: {} images inlined", index, replaced);
        }

        self.sanitizer.sanitize_nodes(&mut nodes);
        let content = self.backend.serialize(&nodes);

        let title = derive_title(&TitleContext {
            heading: heading.as_deref(),
            book_title: self.book_title,
            href: &href,
            index,
        });
        let title = if self.normalize_unicode {
            normalize_display(&title)
        } else {
            title
        };

        Chapter {
            id: chapter_id(self.book_id, index),
            book_id: self.book_id.to_string(),
            index,
            title,
            content,
            href,
            toc_chapter_id: None,
        }
    }
}

/// Point every `img[src]` that resolves into the image map at its data URI.
///
/// Sources are resolved against the chapter's own directory; absolute web
/// references and existing `data:` URIs are left alone. Returns the number
/// of replaced sources.
pub fn rewrite_image_sources(nodes: &mut [Node], images: &ImageMap, chapter_href: &str) -> usize {
    let chapter_dir = path::dirname(chapter_href);
    let mut replaced = 0;

    for_each_element_mut(nodes, &mut |el| {
        if el.name != "img" {
            return;
        }
        let Some(src) = el.attr("src").map(str::trim).filter(|s| !s.is_empty()) else {
            return;
        };
        if path::is_external(src) || path::has_scheme(src) {
            return;
        }

        let (target, _) = path::split_fragment(src);
        let resolved = path::normalize(&path::resolve(chapter_dir, target));
        match images.lookup(&resolved) {
            Some(uri) => {
                let uri = uri.to_string();
                el.set_attr("src", uri);
                replaced += 1;
            }
            None => tracing::debug!("Image {} not found (resolved to {})", src, resolved),
        }
    });

    replaced
}
