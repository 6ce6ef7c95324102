//! The ingestion entry point: EPUB bytes in, `{ book, chapters, tocChapters }` out.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::archive::EpubArchive;
use crate::chapters::ChapterExtractor;
use crate::cover::resolve_cover;
use crate::document::{book_id, now_millis, Book, Chapter, TocChapter};
use crate::encoding::normalize_display;
use crate::error::IngestError;
use crate::images::extract_images;
use crate::links::{rewrite_links, HrefIndex};
use crate::markup::{Html5Backend, MarkupBackend};
use crate::package::PackageDocument;
use crate::path;
use crate::progress::{emit_progress, IngestStage, ProgressHandler};
use crate::reconcile::{build_toc_chapters, spine_groups};
use crate::sanitize::Sanitizer;
use crate::security::SecurityLimits;
use crate::title::display_chapter_count;
use crate::toc;

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub security: SecurityLimits,
    /// Read the navigation document / NCX. Off means navigation follows the spine.
    pub parse_toc: bool,
    /// Inline chapter images as data URIs.
    pub inline_images: bool,
    /// NFC-normalize and whitespace-collapse titles.
    pub normalize_unicode: bool,
    /// Log a warning when two chapters share an href key.
    pub warn_on_href_collision: bool,
    /// Ingestion time in ms since the epoch; the current time when unset.
    pub added_at: Option<i64>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            security: SecurityLimits::default(),
            parse_toc: true,
            inline_images: true,
            normalize_unicode: true,
            warn_on_href_collision: true,
            added_at: None,
        }
    }
}

/// Result of one ingestion, ready to be persisted by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedBook {
    pub book: Book,
    pub chapters: Vec<Chapter>,
    pub toc_chapters: Vec<TocChapter>,
}

impl ParsedBook {
    /// Navigation groups: the TOC groups, or one group per chapter when the
    /// book has no usable TOC.
    pub fn navigation(&self) -> Vec<TocChapter> {
        if self.toc_chapters.is_empty() {
            spine_groups(&self.chapters)
        } else {
            self.toc_chapters.clone()
        }
    }
}

/// Parse an EPUB from its bytes.
///
/// Fails only on structural faults (not a ZIP, missing container or package
/// document) and security refusals. Unreadable chapters, images, TOC entries
/// and link targets are logged and skipped.
pub fn parse_epub(
    data: Vec<u8>,
    filename: &str,
    folder_id: Option<&str>,
    options: &IngestOptions,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ParsedBook, IngestError> {
    parse_epub_with(&Html5Backend, data, filename, folder_id, options, progress)
}

/// Read and parse an EPUB file from disk.
pub fn parse_epub_file(
    path: &Path,
    folder_id: Option<&str>,
    options: &IngestOptions,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ParsedBook, IngestError> {
    let data = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_epub(data, &filename, folder_id, options, progress)
}

/// [`parse_epub`] with an explicit markup backend.
pub fn parse_epub_with(
    backend: &dyn MarkupBackend,
    data: Vec<u8>,
    filename: &str,
    folder_id: Option<&str>,
    options: &IngestOptions,
    progress: Option<&dyn ProgressHandler>,
) -> Result<ParsedBook, IngestError> {
    emit_progress(progress, IngestStage::Container, 0, None, Some(filename));
    let mut archive = EpubArchive::open(data, &options.security)?;
    archive.check_drm()?;

    emit_progress(progress, IngestStage::Package, 0, None, None);
    let package = PackageDocument::load(&mut archive)?;

    let raw_title = package
        .metadata
        .title
        .clone()
        .unwrap_or_else(|| title_from_filename(filename));
    let title = if options.normalize_unicode {
        normalize_display(&raw_title)
    } else {
        raw_title
    };
    let author = package
        .metadata
        .creator
        .clone()
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());
    tracing::debug!("Book metadata: title={:?} author={:?}", title, author);

    let added_at = options.added_at.unwrap_or_else(now_millis);
    let id = book_id(&title, added_at);

    emit_progress(progress, IngestStage::Toc, 0, None, None);
    let toc_entries = if options.parse_toc {
        toc::parse_toc(&mut archive, &package)
    } else {
        Vec::new()
    };

    emit_progress(progress, IngestStage::Images, 0, None, None);
    let images = extract_images(&mut archive, &package);
    let cover = resolve_cover(&package, &images);

    let sanitizer = Sanitizer::default();
    let extractor = ChapterExtractor {
        backend,
        sanitizer: &sanitizer,
        images: &images,
        book_id: &id,
        book_title: &title,
        inline_images: options.inline_images,
        normalize_unicode: options.normalize_unicode,
    };
    let mut chapters = extractor.extract(&mut archive, &package, progress);

    emit_progress(progress, IngestStage::Links, 0, None, None);
    let href_index = HrefIndex::build(&chapters, &package.base_dir, options.warn_on_href_collision);
    let toc_chapters = build_toc_chapters(&toc_entries, &href_index, &mut chapters);
    let rewritten = rewrite_links(&mut chapters, &href_index, backend);

    let book = Book {
        id,
        title,
        author,
        cover,
        language: package.metadata.language.clone(),
        publisher: package.metadata.publisher.clone(),
        description: package.metadata.description.clone(),
        added_at,
        last_read_at: None,
        total_chapters: display_chapter_count(&toc_chapters, &chapters),
        current_chapter: 0,
        progress: 0.0,
        folder_id: folder_id.filter(|f| !f.is_empty()).map(str::to_string),
    };

    tracing::info!(
        "Ingested '{}': {} chapters, {} TOC groups, {} images, {} links rewritten",
        book.title,
        chapters.len(),
        toc_chapters.len(),
        images.len(),
        rewritten
    );
    emit_progress(progress, IngestStage::Done, chapters.len() as u64, None, None);

    Ok(ParsedBook {
        book,
        chapters,
        toc_chapters,
    })
}

/// Upload file name without its `.epub` extension.
fn title_from_filename(filename: &str) -> String {
    let name = path::file_name(filename.trim());
    let stem = match name.len().checked_sub(5) {
        Some(i) if name.is_char_boundary(i) && name[i..].eq_ignore_ascii_case(".epub") => &name[..i],
        _ => name,
    };
    if stem.trim().is_empty() {
        "Untitled".to_string()
    } else {
        stem.to_string()
    }
}
