//! Internal link rewriting.
//!
//! Every chapter is reachable under several spellings of its path: the
//! manifest href, the same href without a fragment and the archive path
//! resolved against the package directory. [`HrefIndex`] maps all of them
//! to the chapter index; anchors that resolve through it are rewritten to
//! `/reader/{bookId}/{index}[#fragment]`.

use std::collections::HashMap;

use crate::document::Chapter;
use crate::markup::{for_each_element_mut, MarkupBackend};
use crate::path;

pub const READER_ROUTE_PREFIX: &str = "/reader";

/// Reader route for a chapter, with an optional in-document anchor.
pub fn reader_route(book_id: &str, index: usize, fragment: Option<&str>) -> String {
    match fragment.filter(|f| !f.is_empty()) {
        Some(f) => format!("{READER_ROUTE_PREFIX}/{book_id}/{index}#{f}"),
        None => format!("{READER_ROUTE_PREFIX}/{book_id}/{index}"),
    }
}

/// Normalized href → chapter index.
#[derive(Debug, Clone, Default)]
pub struct HrefIndex {
    map: HashMap<String, usize>,
    collisions: usize,
}

impl HrefIndex {
    /// Index every chapter under its href variants. A key bound twice keeps
    /// the later chapter.
    pub fn build(chapters: &[Chapter], base_dir: &str, warn_on_collision: bool) -> Self {
        let mut index = Self::default();
        for chapter in chapters {
            let base_href = path::normalize(path::split_fragment(&chapter.href).0);
            let absolute = path::normalize(&path::resolve(base_dir, &base_href));

            index.bind(base_href, chapter.index, warn_on_collision);
            index.bind(absolute, chapter.index, warn_on_collision);
            index.bind(chapter.href.clone(), chapter.index, warn_on_collision);
        }
        tracing::debug!("Href index: {} keys for {} chapters", index.len(), chapters.len());
        index
    }

    fn bind(&mut self, key: String, chapter_index: usize, warn_on_collision: bool) {
        if key.is_empty() {
            return;
        }
        if let Some(previous) = self.map.insert(key.clone(), chapter_index) {
            if previous != chapter_index {
                self.collisions += 1;
                if warn_on_collision {
                    tracing::warn!(
                        "Href '{}' maps to chapters {} and {}; keeping {}",
                        key,
                        previous,
                        chapter_index,
                        chapter_index
                    );
                }
            }
        }
    }

    /// Chapter index of a normalized, fragment-free path; retried
    /// percent-decoded.
    pub fn get(&self, href: &str) -> Option<usize> {
        self.map
            .get(href)
            .or_else(|| self.map.get(&*path::decode(href)))
            .copied()
    }

    /// Number of keys re-bound to a different chapter.
    pub fn collisions(&self) -> usize {
        self.collisions
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Rewrite internal links in every chapter. Returns the number of rewritten
/// anchors.
pub fn rewrite_links(
    chapters: &mut [Chapter],
    index: &HrefIndex,
    backend: &dyn MarkupBackend,
) -> usize {
    let mut total = 0;
    for chapter in chapters.iter_mut() {
        let (content, rewritten) =
            rewrite_chapter_links(&chapter.content, &chapter.href, &chapter.book_id, index, backend);
        if rewritten > 0 {
            tracing::debug!("Chapter {}: {} links rewritten", chapter.index, rewritten);
            chapter.content = content;
            total += rewritten;
        }
    }
    total
}

/// Rewrite the anchors of one chapter's markup. Unresolvable and external
/// links are kept as they are.
pub fn rewrite_chapter_links(
    content: &str,
    chapter_href: &str,
    book_id: &str,
    index: &HrefIndex,
    backend: &dyn MarkupBackend,
) -> (String, usize) {
    let mut nodes = backend.parse_fragment(content);
    let chapter_dir = path::dirname(chapter_href);
    let mut rewritten = 0;

    for_each_element_mut(&mut nodes, &mut |el| {
        if el.name != "a" {
            return;
        }
        let Some(href) = el.attr("href").map(str::trim) else {
            return;
        };
        if href.is_empty() || href.starts_with('#') || path::is_external(href) || path::has_scheme(href) {
            return;
        }

        let resolved = path::normalize(&path::resolve(chapter_dir, href));
        let (target, fragment) = path::split_fragment(&resolved);
        match index.get(target) {
            Some(chapter_index) => {
                let route = reader_route(book_id, chapter_index, fragment);
                el.set_attr("href", route);
                rewritten += 1;
            }
            None => tracing::debug!("Link target {} not in book", resolved),
        }
    });

    if rewritten == 0 {
        return (content.to_string(), 0);
    }
    (backend.serialize(&nodes), rewritten)
}
