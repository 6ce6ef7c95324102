//! Reading statistics: plain text, word counts, reading time and chunking.

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::document::Chapter;
use crate::markup::{for_each_element_mut, readable_text, Html5Backend, MarkupBackend};

pub const WORDS_PER_MINUTE: u64 = 200;
pub const MAX_WORDS_PER_CHUNK: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterStats {
    pub word_count: u64,
    pub character_count: u64,
    pub image_count: u32,
    pub reading_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookStats {
    pub chapter_count: u32,
    pub word_count: u64,
    pub character_count: u64,
    pub image_count: u32,
    pub reading_minutes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterChunk {
    pub index: usize,
    pub content: String,
    pub word_count: usize,
}

/// Readable text of an HTML document or fragment.
pub fn extract_text_content(html: &str) -> String {
    readable_text(&Html5Backend.parse_document(html))
}

pub fn count_words(text: &str) -> u64 {
    text.unicode_words().count() as u64
}

/// Minutes at [`WORDS_PER_MINUTE`], rounded up.
pub fn reading_minutes(word_count: u64) -> u64 {
    word_count.div_ceil(WORDS_PER_MINUTE)
}

pub fn chapter_stats(chapter: &Chapter) -> ChapterStats {
    let mut nodes = Html5Backend.parse_document(&chapter.content);
    let mut image_count = 0;
    for_each_element_mut(&mut nodes, &mut |el| {
        if el.name == "img" {
            image_count += 1;
        }
    });

    let text = readable_text(&nodes);
    let word_count = count_words(&text);
    ChapterStats {
        word_count,
        character_count: text.chars().filter(|c| !c.is_whitespace()).count() as u64,
        image_count,
        reading_minutes: reading_minutes(word_count),
    }
}

pub fn book_stats(chapters: &[Chapter]) -> BookStats {
    let mut stats = BookStats {
        chapter_count: chapters.len() as u32,
        word_count: 0,
        character_count: 0,
        image_count: 0,
        reading_minutes: 0,
    };
    for chapter in chapters {
        let s = chapter_stats(chapter);
        stats.word_count += s.word_count;
        stats.character_count += s.character_count;
        stats.image_count += s.image_count;
    }
    stats.reading_minutes = reading_minutes(stats.word_count);
    stats
}

/// Split text into chunks of at most `max_words` whitespace-separated words.
/// Text that already fits is returned whole and unchanged.
pub fn split_chapter(text: &str, max_words: usize) -> Vec<ChapterChunk> {
    let max_words = max_words.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return vec![ChapterChunk {
            index: 0,
            content: text.to_string(),
            word_count: words.len(),
        }];
    }

    words
        .chunks(max_words)
        .enumerate()
        .map(|(index, chunk)| ChapterChunk {
            index,
            content: chunk.join(" "),
            word_count: chunk.len(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter(content: &str) -> Chapter {
        Chapter {
            id: "b-chapter-0".into(),
            book_id: "b".into(),
            index: 0,
            title: "T".into(),
            content: content.into(),
            href: "a.xhtml".into(),
            toc_chapter_id: None,
        }
    }

    #[test]
    fn text_content_of_markup() {
        assert_eq!(
            extract_text_content("<h1>Title</h1><p>Hello <b>world</b></p>"),
            "Title Hello world"
        );
    }

    #[test]
    fn chapter_word_and_image_counts() {
        let s = chapter_stats(&chapter(r#"<p>One two, three.</p><img src="x"><p>Four</p>"#));
        assert_eq!(s.word_count, 4);
        assert_eq!(s.image_count, 1);
        assert_eq!(s.reading_minutes, 1);
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(reading_minutes(0), 0);
        assert_eq!(reading_minutes(200), 1);
        assert_eq!(reading_minutes(201), 2);
    }

    #[test]
    fn book_totals() {
        let chapters = vec![chapter("<p>a b</p>"), chapter("<p>c</p>")];
        let s = book_stats(&chapters);
        assert_eq!(s.chapter_count, 2);
        assert_eq!(s.word_count, 3);
    }

    #[test]
    fn split_long_text() {
        let text = (0..12).map(|i| format!("w{i}")).collect::<Vec<_>>().join("  ");
        let chunks = split_chapter(&text, 5);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content, "w0 w1 w2 w3 w4");
        assert_eq!(chunks[2].word_count, 2);
        assert_eq!(chunks[2].index, 2);

        let short = split_chapter("a  b", MAX_WORDS_PER_CHUNK);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].content, "a  b");
    }
}
