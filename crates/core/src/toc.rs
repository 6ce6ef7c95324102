//! Table-of-contents parsing: EPUB 3 navigation documents and EPUB 2 NCX.
//!
//! Both parsers produce the same flat list of [`TocEntry`] values in document
//! order. Nested entries are flattened pre-order, so a part heading comes
//! before its chapters.

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::archive::EpubArchive;
use crate::encoding::collapse_whitespace;
use crate::package::{attr_value, text_value, ManifestItem, PackageDocument};
use crate::path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub label: String,
    /// Archive path of the target, fragment included.
    pub href: String,
}

impl TocEntry {
    /// Build an entry from raw values, rejecting empty labels or hrefs.
    fn from_raw(label: &str, href: &str, source_path: &str) -> Option<Self> {
        let label = collapse_whitespace(label);
        let href = href.trim();
        if label.is_empty() || href.is_empty() {
            return None;
        }
        Some(Self {
            label,
            href: path::normalize(&path::resolve(source_path, href)),
        })
    }

    /// Target path without the fragment.
    pub fn target(&self) -> &str {
        path::split_fragment(&self.href).0
    }
}

pub trait TocParser {
    fn name(&self) -> &'static str;

    /// Parse the book's navigation source; an absent or unreadable source
    /// yields an empty list.
    fn parse(&self, archive: &mut EpubArchive, package: &PackageDocument) -> Vec<TocEntry>;
}

/// EPUB 3 `<nav epub:type="toc">` document.
#[derive(Debug, Default, Clone, Copy)]
pub struct NavDocumentParser;

impl TocParser for NavDocumentParser {
    fn name(&self) -> &'static str {
        "nav"
    }

    fn parse(&self, archive: &mut EpubArchive, package: &PackageDocument) -> Vec<TocEntry> {
        match read_source(archive, package, package.nav_item()) {
            Some((nav_path, content)) => parse_nav_document(&content, &nav_path),
            None => Vec::new(),
        }
    }
}

/// EPUB 2 NCX document.
#[derive(Debug, Default, Clone, Copy)]
pub struct NcxParser;

impl TocParser for NcxParser {
    fn name(&self) -> &'static str {
        "ncx"
    }

    fn parse(&self, archive: &mut EpubArchive, package: &PackageDocument) -> Vec<TocEntry> {
        match read_source(archive, package, package.ncx_item()) {
            Some((ncx_path, content)) => parse_ncx(&content, &ncx_path),
            None => Vec::new(),
        }
    }
}

/// Try the navigation document first, then the NCX. An empty result means
/// the book has no usable TOC.
pub fn parse_toc(archive: &mut EpubArchive, package: &PackageDocument) -> Vec<TocEntry> {
    let parsers: [&dyn TocParser; 2] = [&NavDocumentParser, &NcxParser];
    for parser in parsers {
        let entries = parser.parse(archive, package);
        if !entries.is_empty() {
            tracing::debug!("TOC parsed from {} ({} entries)", parser.name(), entries.len());
            return entries;
        }
    }
    tracing::debug!("No TOC found, navigation follows the spine");
    Vec::new()
}

fn read_source(
    archive: &mut EpubArchive,
    package: &PackageDocument,
    item: Option<&ManifestItem>,
) -> Option<(String, String)> {
    let item = item?;
    let full_path = package.resolve(&item.href);
    match archive.read_text(&full_path) {
        Ok(content) => Some((full_path, content)),
        Err(e) => {
            tracing::warn!("Navigation source unreadable: {}", e);
            None
        }
    }
}

/// Entries of a navigation document located at `nav_path`.
pub fn parse_nav_document(content: &str, nav_path: &str) -> Vec<TocEntry> {
    let (Ok(nav_selector), Ok(item_selector), Ok(link_selector)) = (
        Selector::parse("nav"),
        Selector::parse("ol > li, ul > li"),
        Selector::parse("a"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(content);
    let Some(nav) = document.select(&nav_selector).find(|nav| is_toc_nav(nav.value())) else {
        tracing::debug!("No toc landmark in {}", nav_path);
        return Vec::new();
    };

    nav.select(&item_selector)
        .filter_map(|li| li.select(&link_selector).next())
        .filter_map(|a| {
            let label = a.text().collect::<String>();
            let href = a.value().attr("href").unwrap_or_default();
            TocEntry::from_raw(&label, href, nav_path)
        })
        .collect()
}

/// `epub:type` contains `toc`, or the element id is `toc`.
fn is_toc_nav(nav: &scraper::node::Element) -> bool {
    nav.attr("epub:type")
        .is_some_and(|t| t.split_whitespace().any(|v| v == "toc"))
        || nav.id() == Some("toc")
}

#[derive(Default)]
struct PendingPoint {
    label: Option<String>,
    href: Option<String>,
    emitted: bool,
}

/// Entries of an NCX document located at `ncx_path`, navPoints pre-order.
pub fn parse_ncx(content: &str, ncx_path: &str) -> Vec<TocEntry> {
    let mut reader = XmlReader::from_str(content);
    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut stack: Vec<PendingPoint> = Vec::new();
    let mut in_label = false;
    let mut in_text = false;
    let mut text = String::new();

    let flush = |point: &mut PendingPoint, entries: &mut Vec<TocEntry>| {
        if point.emitted {
            return;
        }
        point.emitted = true;
        if let (Some(label), Some(href)) = (&point.label, &point.href) {
            entries.extend(TocEntry::from_raw(label, href, ncx_path));
        }
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"navPoint" => {
                    if let Some(parent) = stack.last_mut() {
                        flush(parent, &mut entries);
                    }
                    stack.push(PendingPoint::default());
                }
                b"navLabel" => in_label = true,
                b"text" if in_label => {
                    in_text = true;
                    text.clear();
                }
                b"content" => set_content_src(e, &mut stack),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"content" => {
                set_content_src(e, &mut stack);
            }
            Ok(Event::Text(ref e)) if in_text => {
                text.push_str(&text_value(e));
            }
            Ok(Event::CData(ref e)) if in_text => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"navPoint" => {
                    if let Some(mut point) = stack.pop() {
                        flush(&mut point, &mut entries);
                    }
                }
                b"navLabel" => in_label = false,
                b"text" if in_text => {
                    in_text = false;
                    if let Some(point) = stack.last_mut() {
                        if point.label.is_none() {
                            point.label = Some(text.clone());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!("Malformed NCX {}: {}", ncx_path, e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    entries
}

fn set_content_src(e: &quick_xml::events::BytesStart, stack: &mut [PendingPoint]) {
    if let Some(point) = stack.last_mut() {
        if point.href.is_none() {
            point.href = attr_value(e, "src");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(label: &str, href: &str) -> TocEntry {
        TocEntry {
            label: label.into(),
            href: href.into(),
        }
    }

    const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="text/cover.xhtml">Cover</a></li></ol></nav>
  <nav epub:type="toc" id="toc">
    <h1>Contents</h1>
    <ol>
      <li><a href="text/ch1.xhtml">Part
          One</a>
        <ol><li><a href="text/ch2.xhtml#s1">Section</a></li></ol>
      </li>
      <li><a href="">Empty href</a></li>
      <li><a href="text/ch3.xhtml">  </a></li>
      <li><span>No link</span></li>
      <li><a href="text/ch3.xhtml">Part Two</a></li>
    </ol>
  </nav>
</body></html>"#;

    #[test]
    fn nav_document_entries_in_document_order() {
        let entries = parse_nav_document(NAV, "OEBPS/nav.xhtml");
        assert_eq!(
            entries,
            vec![
                entry("Part One", "OEBPS/text/ch1.xhtml"),
                entry("Section", "OEBPS/text/ch2.xhtml#s1"),
                entry("Part Two", "OEBPS/text/ch3.xhtml"),
            ]
        );
        assert_eq!(entries[1].target(), "OEBPS/text/ch2.xhtml");
    }

    #[test]
    fn nav_document_by_id() {
        let html = r#"<html><body><nav id="toc"><ul><li><a href="a.xhtml">A</a></li></ul></nav></body></html>"#;
        assert_eq!(parse_nav_document(html, "nav.xhtml"), vec![entry("A", "a.xhtml")]);
    }

    #[test]
    fn nav_document_without_toc_landmark() {
        let html = r#"<html><body><nav epub:type="page-list"><ol><li><a href="a.xhtml">1</a></li></ol></nav></body></html>"#;
        assert!(parse_nav_document(html, "nav.xhtml").is_empty());
    }

    const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head/>
  <docTitle><text>Book</text></docTitle>
  <navMap>
    <navPoint id="p1" playOrder="1">
      <navLabel><text>Part One</text></navLabel>
      <content src="text/ch1.xhtml"/>
      <navPoint id="p1-1" playOrder="2">
        <navLabel><text>Chapter 1</text></navLabel>
        <content src="text/ch1.xhtml#c1"/>
      </navPoint>
    </navPoint>
    <navPoint id="p2" playOrder="3">
      <navLabel><text></text></navLabel>
      <content src="text/ch2.xhtml"/>
    </navPoint>
    <navPoint id="p3" playOrder="4">
      <navLabel><text>Part &amp; Two</text></navLabel>
      <content src="../ch3.xhtml"/>
    </navPoint>
  </navMap>
</ncx>"#;

    #[test]
    fn ncx_entries_pre_order() {
        let entries = parse_ncx(NCX, "OEBPS/toc.ncx");
        assert_eq!(
            entries,
            vec![
                entry("Part One", "OEBPS/text/ch1.xhtml"),
                entry("Chapter 1", "OEBPS/text/ch1.xhtml#c1"),
                entry("Part & Two", "ch3.xhtml"),
            ]
        );
    }

    #[test]
    fn ncx_doc_title_is_not_an_entry() {
        let entries = parse_ncx(NCX, "toc.ncx");
        assert!(entries.iter().all(|e| e.label != "Book"));
    }

    #[test]
    fn ncx_labels_with_html_entities() {
        let ncx = r#"<ncx><navMap>
<navPoint><navLabel><text>One&mdash;Two&hellip;</text></navLabel><content src="a.xhtml"/></navPoint>
<navPoint><navLabel><text>Caf&bogus; Noir</text></navLabel><content src="b.xhtml"/></navPoint>
</navMap></ncx>"#;
        assert_eq!(
            parse_ncx(ncx, "toc.ncx"),
            vec![
                entry("One\u{2014}Two\u{2026}", "a.xhtml"),
                entry("Caf&bogus; Noir", "b.xhtml"),
            ]
        );
    }

    #[test]
    fn truncated_ncx_keeps_complete_points() {
        let ncx = r#"<ncx><navMap><navPoint><navLabel><text>A</text></navLabel><content src="a.xhtml"/></navPoint><navPoint><navLabel>"#;
        assert_eq!(parse_ncx(ncx, "toc.ncx"), vec![entry("A", "a.xhtml")]);
    }
}
