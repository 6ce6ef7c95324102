//! Chapter title derivation and the display chapter count.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::document::{Chapter, TocChapter};
use crate::fallback::FallbackChain;
use crate::path;

static RE_MARKUP_EXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.(xhtml|html|xml)$").unwrap());
static RE_CHAPTER_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(ch|chap|chapter)[\s_-]*[0-9]+").unwrap());
static RE_APTER_FILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^apter[\s_-]*[0-9]+").unwrap());
static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").unwrap());
static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_-]+").unwrap());
static RE_CHAPTER_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(ch|chap)\s*[0-9]+").unwrap());
static RE_NUMBERED_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+[.:]").unwrap());

/// Longest heading accepted as a chapter title.
pub const MAX_HEADING_TITLE_CHARS: usize = 100;

/// Inputs of the title cascade for one spine document.
#[derive(Debug, Clone, Copy)]
pub struct TitleContext<'a> {
    /// Text of the first `h1`/`h2`/`h3`, if any.
    pub heading: Option<&'a str>,
    pub book_title: &'a str,
    /// Manifest href of the document.
    pub href: &'a str,
    pub index: usize,
}

/// Derive a chapter title: heading, then file-name conventions, then
/// `Chapter {index + 1}`.
pub fn derive_title(ctx: &TitleContext<'_>) -> String {
    let chain: FallbackChain<'_, TitleContext<'_>, String> = FallbackChain::new()
        .rule("heading", |ctx: &TitleContext<'_>| heading_title(ctx.heading?, ctx.book_title))
        .rule("file-name", |ctx: &TitleContext<'_>| file_name_title(ctx.href))
        .rule("position", |ctx: &TitleContext<'_>| Some(format!("Chapter {}", ctx.index + 1)));

    let (rule, title) = chain
        .resolve_named(ctx)
        .unwrap_or(("position", format!("Chapter {}", ctx.index + 1)));
    tracing::debug!("Chapter {} titled {:?} by rule {}", ctx.index, title, rule);
    title.trim().to_string()
}

fn heading_title(heading: &str, book_title: &str) -> Option<String> {
    let heading = heading.trim();
    let acceptable = !heading.is_empty()
        && heading != book_title.trim()
        && heading.chars().count() <= MAX_HEADING_TITLE_CHARS;
    acceptable.then(|| heading.to_string())
}

/// Title from the document's file name (extension stripped).
pub fn file_name_title(href: &str) -> Option<String> {
    let name = RE_MARKUP_EXT.replace(path::file_name(href), "");
    if name.is_empty() {
        return None;
    }
    let lower = name.to_lowercase();

    let title = if lower.contains("cover") {
        "Cover".to_string()
    } else if lower.contains("copyright") {
        "Copyright".to_string()
    } else if lower.contains("toc") || lower == "contents" {
        "Contents".to_string()
    } else if lower.contains("titlepage") || lower == "title" {
        "Title Page".to_string()
    } else if lower.contains("dedication") {
        "Dedication".to_string()
    } else if lower.contains("preface") || lower.contains("foreword") {
        "Preface".to_string()
    } else if lower.contains("prologue") {
        "Prologue".to_string()
    } else if lower.contains("epilogue") {
        "Epilogue".to_string()
    } else if lower.contains("afterword") {
        "Afterword".to_string()
    } else if lower.contains("insert") || lower.contains("illustration") {
        match RE_DIGITS.find(&name) {
            Some(m) => format!("Insert {}", m.as_str()),
            None => "Insert".to_string(),
        }
    } else if RE_CHAPTER_FILE.is_match(&lower) || RE_APTER_FILE.is_match(&lower) {
        match chapter_number(&name) {
            Some(n) => format!("Chapter {n}"),
            None => title_case(&name),
        }
    } else {
        title_case(&name)
    };

    let title = title.trim().to_string();
    (!title.is_empty()).then_some(title)
}

/// First digit run, without leading zeros.
fn chapter_number(name: &str) -> Option<u64> {
    RE_DIGITS.find(name)?.as_str().parse().ok()
}

/// Separators become single spaces and every word starts upper-case.
pub fn title_case(s: &str) -> String {
    let spaced = RE_SEPARATORS.replace_all(s, " ");
    let mut out = String::with_capacity(spaced.len());
    let mut prev_word = false;
    for c in spaced.chars() {
        let word = c.is_alphanumeric() || c == '_';
        if word && !prev_word {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_word = word;
    }
    out
}

/// Label looks like a numbered story chapter: contains "chapter", starts
/// with `ch`/`chap` plus a number, or starts with `N.` / `N:`.
pub fn is_chapter_like(label: &str) -> bool {
    let label = label.trim();
    label.to_lowercase().contains("chapter")
        || RE_CHAPTER_LABEL.is_match(label)
        || RE_NUMBERED_LABEL.is_match(label)
}

/// Chapter count shown to the reader.
///
/// Chapter-like TOC labels, else chapter-like chapter titles, else the
/// number of TOC groups, else the number of chapters.
pub fn display_chapter_count(toc_chapters: &[TocChapter], chapters: &[Chapter]) -> usize {
    let from_toc = toc_chapters.iter().filter(|t| is_chapter_like(&t.title)).count();
    if from_toc > 0 {
        return from_toc;
    }
    let from_titles = chapters.iter().filter(|c| is_chapter_like(&c.title)).count();
    if from_titles > 0 {
        return from_titles;
    }
    if !toc_chapters.is_empty() {
        return toc_chapters.len();
    }
    chapters.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx<'a>(heading: Option<&'a str>, href: &'a str) -> TitleContext<'a> {
        TitleContext {
            heading,
            book_title: "My Book",
            href,
            index: 4,
        }
    }

    #[test]
    fn heading_wins_when_acceptable() {
        assert_eq!(derive_title(&ctx(Some("  The Storm "), "text/ch05.xhtml")), "The Storm");
    }

    #[test]
    fn heading_rejected_when_book_title_empty_or_long() {
        assert_eq!(derive_title(&ctx(Some("My Book"), "text/ch05.xhtml")), "Chapter 5");
        assert_eq!(derive_title(&ctx(Some("   "), "text/ch05.xhtml")), "Chapter 5");
        let long = "x".repeat(101);
        assert_eq!(derive_title(&ctx(Some(&long), "text/ch05.xhtml")), "Chapter 5");
        let limit = "y".repeat(100);
        assert_eq!(derive_title(&ctx(Some(&limit), "text/ch05.xhtml")), limit);
    }

    #[test]
    fn front_and_back_matter_names() {
        let cases = [
            ("cover.xhtml", "Cover"),
            ("Copyright.html", "Copyright"),
            ("toc.xhtml", "Contents"),
            ("contents.xhtml", "Contents"),
            ("titlepage.xhtml", "Title Page"),
            ("title.xhtml", "Title Page"),
            ("dedication.xhtml", "Dedication"),
            ("foreword.xhtml", "Preface"),
            ("prologue.xhtml", "Prologue"),
            ("epilogue.xhtml", "Epilogue"),
            ("afterword.xhtml", "Afterword"),
            ("insert03.xhtml", "Insert 03"),
            ("illustration.xhtml", "Insert"),
        ];
        for (name, expected) in cases {
            assert_eq!(file_name_title(name).as_deref(), Some(expected), "{name}");
        }
    }

    #[test]
    fn chapter_number_names() {
        assert_eq!(file_name_title("text/chapter_007.xhtml").as_deref(), Some("Chapter 7"));
        assert_eq!(file_name_title("ch-12.html").as_deref(), Some("Chapter 12"));
        assert_eq!(file_name_title("Chap3.xhtml").as_deref(), Some("Chapter 3"));
        assert_eq!(file_name_title("apter 9.xhtml").as_deref(), Some("Chapter 9"));
    }

    #[test]
    fn other_names_are_title_cased() {
        assert_eq!(file_name_title("the_final-battle.xhtml").as_deref(), Some("The Final Battle"));
        assert_eq!(file_name_title("part2.xml").as_deref(), Some("Part2"));
        assert_eq!(file_name_title(".xhtml"), None);
    }

    #[test]
    fn position_fallback() {
        assert_eq!(derive_title(&ctx(None, "")), "Chapter 5");
    }

    #[test]
    fn chapter_like_labels() {
        assert!(is_chapter_like("Chapter One"));
        assert!(is_chapter_like("CH 4"));
        assert!(is_chapter_like("chap12: Night"));
        assert!(is_chapter_like("1. Beginnings"));
        assert!(is_chapter_like("12: Ends"));
        assert!(!is_chapter_like("Prologue"));
        assert!(!is_chapter_like("Cover"));
        assert!(!is_chapter_like("1984"));
    }

    fn toc(title: &str) -> TocChapter {
        TocChapter {
            id: "t".into(),
            title: title.into(),
            start_index: 0,
            end_index: 0,
            href: String::new(),
        }
    }

    fn chapter(title: &str) -> Chapter {
        Chapter {
            id: "c".into(),
            book_id: "b".into(),
            index: 0,
            title: title.into(),
            content: String::new(),
            href: String::new(),
            toc_chapter_id: None,
        }
    }

    #[test]
    fn display_count_cascade() {
        let chapters = vec![chapter("Cover"), chapter("Chapter 1"), chapter("Chapter 2"), chapter("Notes")];
        let tocs = vec![toc("Prologue"), toc("Chapter 1"), toc("Epilogue")];
        assert_eq!(display_chapter_count(&tocs, &chapters), 1);

        let tocs = vec![toc("Part One"), toc("Part Two")];
        assert_eq!(display_chapter_count(&tocs, &chapters), 2);

        let plain = vec![chapter("Cover"), chapter("Notes"), chapter("Index")];
        assert_eq!(display_chapter_count(&tocs, &plain), 2);
        assert_eq!(display_chapter_count(&[], &plain), 3);
        assert_eq!(display_chapter_count(&[], &[]), 0);
    }
}
