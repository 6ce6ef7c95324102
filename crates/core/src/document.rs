use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// One ingested book. Serialized with camelCase keys, the shape the reader
/// UI stores and routes on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    /// Inline `data:` URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub added_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_at: Option<i64>,
    /// Display count, see [`crate::title::display_chapter_count`].
    pub total_chapters: usize,
    pub current_chapter: usize,
    /// 0..=100
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

impl Book {
    /// Record a reading position: current chapter, overall progress and
    /// last-read time.
    pub fn record_progress(
        &mut self,
        chapter_index: usize,
        scroll_percent: f64,
        chapter_count: usize,
        at: i64,
    ) {
        self.current_chapter = chapter_index;
        self.progress = overall_progress(chapter_index, scroll_percent, chapter_count);
        self.last_read_at = Some(at);
    }
}

/// One spine document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// `{bookId}-chapter-{index}`
    pub id: String,
    pub book_id: String,
    /// Dense zero-based position in reading order.
    pub index: usize,
    pub title: String,
    /// Sanitized HTML with internal links rewritten.
    pub content: String,
    /// Normalized manifest href of the source document.
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toc_chapter_id: Option<String>,
}

/// A navigation group: one TOC entry and the inclusive spine range it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocChapter {
    pub id: String,
    pub title: String,
    pub start_index: usize,
    pub end_index: usize,
    pub href: String,
}

impl TocChapter {
    pub fn contains(&self, index: usize) -> bool {
        (self.start_index..=self.end_index).contains(&index)
    }

    /// Number of spine documents in the group.
    pub fn span(&self) -> usize {
        self.end_index + 1 - self.start_index
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: i64,
    pub sort_order: u32,
}

/// Last reading position within a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub book_id: String,
    pub chapter_id: String,
    pub chapter_index: usize,
    /// Scroll position within the chapter, 0..=100.
    pub scroll_position: f64,
    /// Overall book progress, 0..=100.
    pub percentage: f64,
    pub last_read_at: i64,
}

impl ReadingProgress {
    pub fn new(
        book_id: &str,
        chapter_index: usize,
        scroll_position: f64,
        chapter_count: usize,
        at: i64,
    ) -> Self {
        Self {
            book_id: book_id.to_string(),
            chapter_id: chapter_id(book_id, chapter_index),
            chapter_index,
            scroll_position,
            percentage: overall_progress(chapter_index, scroll_position, chapter_count),
            last_read_at: at,
        }
    }
}

/// Overall progress through a book, in percent.
///
/// `min(((chapter_index + scroll_percent / 100) / chapter_count) * 100, 100)`;
/// zero for an empty book.
pub fn overall_progress(chapter_index: usize, scroll_percent: f64, chapter_count: usize) -> f64 {
    if chapter_count == 0 {
        return 0.0;
    }
    let scroll = scroll_percent.clamp(0.0, 100.0);
    let value = ((chapter_index as f64 + scroll / 100.0) / chapter_count as f64) * 100.0;
    value.min(100.0)
}

/// Lower-case ASCII slug: every run of characters outside `[a-z0-9]` becomes `-`.
pub fn slugify(s: &str) -> String {
    RE_NON_SLUG.replace_all(&s.to_lowercase(), "-").into_owned()
}

/// Book id: title slug plus the ingestion timestamp (ms).
pub fn book_id(title: &str, timestamp_ms: i64) -> String {
    format!("{}-{}", slugify(title), timestamp_ms)
}

pub fn chapter_id(book_id: &str, index: usize) -> String {
    format!("{book_id}-chapter-{index}")
}

pub fn toc_chapter_id(position: usize) -> String {
    format!("toc-chapter-{position}")
}

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
