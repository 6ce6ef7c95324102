//! Container descriptor and package (OPF) document parsing.
//!
//! `META-INF/container.xml` points at the package document, which carries the
//! book metadata, the manifest (id → href/media-type) and the spine (reading
//! order of manifest ids). Both EPUB 2 and EPUB 3 layouts are accepted.

use indexmap::IndexMap;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader as XmlReader;

use crate::archive::{EpubArchive, CONTAINER_PATH};
use crate::error::IngestError;
use crate::path;

pub const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

#[derive(Debug, Clone, Default)]
pub struct PackageMetadata {
    pub title: Option<String>,
    pub creator: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    /// Manifest id named by `<meta name="cover" content="...">`.
    pub cover_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    pub id: String,
    /// Href exactly as written in the manifest (relative to the package document).
    pub href: String,
    pub media_type: String,
    pub properties: Option<String>,
}

impl ManifestItem {
    /// True if the space-separated `properties` attribute contains `prop`.
    pub fn has_property(&self, prop: &str) -> bool {
        self.properties
            .as_deref()
            .map_or(false, |p| p.split_whitespace().any(|t| t == prop))
    }

    pub fn is_image(&self) -> bool {
        self.media_type.trim().to_ascii_lowercase().starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    pub idref: String,
    pub linear: bool,
}

#[derive(Debug, Clone)]
pub struct PackageDocument {
    /// Archive path of the OPF file.
    pub path: String,
    /// Directory of the OPF file, with trailing slash (empty at the archive root).
    pub base_dir: String,
    pub metadata: PackageMetadata,
    /// Manifest in document order.
    pub manifest: IndexMap<String, ManifestItem>,
    pub spine: Vec<SpineItem>,
    /// The spine's `toc` attribute (EPUB 2 NCX id).
    pub spine_toc: Option<String>,
}

impl PackageDocument {
    /// Locate and parse the package document of an opened archive.
    pub fn load(archive: &mut EpubArchive) -> Result<Self, IngestError> {
        if !archive.contains(CONTAINER_PATH) {
            return Err(IngestError::MalformedArchive(format!(
                "{CONTAINER_PATH} not found"
            )));
        }
        let container = archive.read_text(CONTAINER_PATH)?;
        let opf_path = find_package_path(&container)?;

        if !archive.contains(&opf_path) {
            return Err(IngestError::MalformedArchive(format!(
                "Package document {opf_path} not found"
            )));
        }
        let opf = archive.read_text(&opf_path)?;
        Self::parse(&opf_path, &opf)
    }

    /// Parse OPF content that lives at `opf_path` inside the archive.
    pub fn parse(opf_path: &str, content: &str) -> Result<Self, IngestError> {
        let mut reader = XmlReader::from_str(content);
        reader.config_mut().check_end_names = false;
        let mut buf = Vec::new();

        let mut metadata = PackageMetadata::default();
        let mut manifest = IndexMap::new();
        let mut spine = Vec::new();
        let mut spine_toc = None;

        let mut in_metadata = false;
        let mut current_element: Option<String> = None;
        let mut current_text = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    let name = local_name(e);
                    match name.as_str() {
                        "metadata" => in_metadata = true,
                        "title" | "creator" | "language" | "publisher" | "description"
                            if in_metadata =>
                        {
                            current_element = Some(name.clone());
                            current_text.clear();
                        }
                        "meta" if in_metadata => read_cover_meta(e, &mut metadata),
                        _ => read_structural(e, &name, &mut manifest, &mut spine, &mut spine_toc),
                    }
                }
                Ok(Event::Empty(ref e)) => {
                    let name = local_name(e);
                    if name == "meta" && in_metadata {
                        read_cover_meta(e, &mut metadata);
                    } else {
                        read_structural(e, &name, &mut manifest, &mut spine, &mut spine_toc);
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if current_element.is_some() {
                        current_text.push_str(&text_value(e));
                    }
                }
                Ok(Event::CData(ref e)) => {
                    if current_element.is_some() {
                        current_text.push_str(&String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::End(ref e)) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                    if name == "metadata" {
                        in_metadata = false;
                    }
                    if current_element.as_deref() == Some(name.as_str()) {
                        let text = current_text.trim().to_string();
                        if !text.is_empty() {
                            // First occurrence wins for every field.
                            let slot = match name.as_str() {
                                "title" => &mut metadata.title,
                                "creator" => &mut metadata.creator,
                                "language" => &mut metadata.language,
                                "publisher" => &mut metadata.publisher,
                                _ => &mut metadata.description,
                            };
                            if slot.is_none() {
                                *slot = Some(text);
                            }
                        }
                        current_element = None;
                        current_text.clear();
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    if manifest.is_empty() && spine.is_empty() {
                        return Err(IngestError::MalformedArchive(format!(
                            "Failed to parse package document {opf_path}: {e}"
                        )));
                    }
                    tracing::warn!(
                        "Package document {} is damaged at byte {}, keeping what was read: {}",
                        opf_path,
                        reader.error_position(),
                        e
                    );
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        tracing::debug!(
            "Package {}: {} manifest items, {} spine items",
            opf_path,
            manifest.len(),
            spine.len()
        );

        Ok(Self {
            path: opf_path.to_string(),
            base_dir: path::dirname(opf_path).to_string(),
            metadata,
            manifest,
            spine,
            spine_toc,
        })
    }

    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.get(id)
    }

    /// Archive path of a manifest href.
    pub fn resolve(&self, href: &str) -> String {
        path::normalize(&path::resolve(&self.base_dir, href))
    }

    /// EPUB 3 navigation document.
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.values().find(|item| item.has_property("nav"))
    }

    /// EPUB 2 NCX: by media type first, then by the spine's `toc` attribute.
    pub fn ncx_item(&self) -> Option<&ManifestItem> {
        self.manifest
            .values()
            .find(|item| item.media_type.trim() == NCX_MEDIA_TYPE)
            .or_else(|| self.spine_toc.as_deref().and_then(|id| self.item(id)))
    }

    /// EPUB 3 `properties="cover-image"` manifest item.
    pub fn cover_image_item(&self) -> Option<&ManifestItem> {
        self.manifest.values().find(|item| item.has_property("cover-image"))
    }

    pub fn image_items(&self) -> impl Iterator<Item = &ManifestItem> {
        self.manifest.values().filter(|item| item.is_image())
    }
}

/// Extract the `full-path` of the first `rootfile` in `container.xml`.
pub fn find_package_path(container: &str) -> Result<String, IngestError> {
    let mut reader = XmlReader::from_str(container);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(p) = attr_value(e, "full-path").filter(|p| !p.trim().is_empty()) {
                    return Ok(path::normalize(p.trim()));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::MalformedArchive(format!(
                    "Failed to parse {CONTAINER_PATH}: {e}"
                )));
            }
            _ => {}
        }
        buf.clear();
    }

    Err(IngestError::MalformedArchive(format!(
        "No package document path in {CONTAINER_PATH}"
    )))
}

fn local_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_string()
}

/// HTML entities common in hand-edited package and NCX files.
fn html_entity(name: &str) -> Option<&'static str> {
    if let Some(xml) = resolve_predefined_entity(name) {
        return Some(xml);
    }
    Some(match name {
        "nbsp" => "\u{a0}",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "hellip" => "\u{2026}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201c}",
        "rdquo" => "\u{201d}",
        "laquo" => "\u{ab}",
        "raquo" => "\u{bb}",
        "copy" => "\u{a9}",
        "reg" => "\u{ae}",
        "trade" => "\u{2122}",
        "eacute" => "\u{e9}",
        "egrave" => "\u{e8}",
        "aacute" => "\u{e1}",
        "ouml" => "\u{f6}",
        "uuml" => "\u{fc}",
        "auml" => "\u{e4}",
        "szlig" => "\u{df}",
        _ => return None,
    })
}

/// Text node content, unescaped. XML entities and a set of common HTML
/// entities are resolved; anything else keeps the raw text.
pub(crate) fn text_value(e: &BytesText) -> String {
    match e.unescape_with(html_entity) {
        Ok(text) => text.into_owned(),
        Err(err) => {
            tracing::warn!("Keeping raw text for unresolved entity: {}", err);
            String::from_utf8_lossy(e).into_owned()
        }
    }
}

/// Attribute by local name, unescaped.
pub(crate) fn attr_value(e: &BytesStart, key: &str) -> Option<String> {
    e.attributes().flatten().find_map(|attr| {
        if attr.key.local_name().as_ref() == key.as_bytes() {
            Some(
                attr.unescape_value()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string()),
            )
        } else {
            None
        }
    })
}

/// EPUB 2 style: `<meta name="cover" content="cover-image-id"/>`.
fn read_cover_meta(e: &BytesStart, metadata: &mut PackageMetadata) {
    if attr_value(e, "name").as_deref() == Some("cover") && metadata.cover_id.is_none() {
        metadata.cover_id = attr_value(e, "content").filter(|c| !c.trim().is_empty());
    }
}

fn read_structural(
    e: &BytesStart,
    name: &str,
    manifest: &mut IndexMap<String, ManifestItem>,
    spine: &mut Vec<SpineItem>,
    spine_toc: &mut Option<String>,
) {
    match name {
        "item" => {
            let id = attr_value(e, "id").unwrap_or_default();
            let href = attr_value(e, "href").unwrap_or_default();
            if id.is_empty() || href.is_empty() {
                tracing::debug!("Skipping manifest item without id or href");
                return;
            }
            manifest.insert(
                id.clone(),
                ManifestItem {
                    id,
                    href,
                    media_type: attr_value(e, "media-type").unwrap_or_default(),
                    properties: attr_value(e, "properties"),
                },
            );
        }
        "spine" => {
            *spine_toc = attr_value(e, "toc");
        }
        "itemref" => {
            if let Some(idref) = attr_value(e, "idref").filter(|i| !i.is_empty()) {
                let linear = attr_value(e, "linear").map_or(true, |l| l.trim() != "no");
                spine.push(SpineItem { idref, linear });
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>The Long &amp; Winding Road</dc:title>
    <dc:title>Subtitle Ignored</dc:title>
    <dc:creator>Jane Doe</dc:creator>
    <dc:language>en</dc:language>
    <meta name="cover" content="cover-img"/>
    <meta property="dcterms:modified">2024-01-01T00:00:00Z</meta>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover-img" href="images/cover.jpg" media-type="image/jpeg"/>
    <item id="ch1" href="text/ch1.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="ch1"/>
    <itemref idref="ch2" linear="no"/>
  </spine>
</package>"#;

    #[test]
    fn container_rootfile() {
        let xml = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles>
</container>"#;
        assert_eq!(find_package_path(xml).unwrap(), "OEBPS/content.opf");
    }

    #[test]
    fn container_without_rootfile_is_malformed() {
        let xml = r#"<container><rootfiles/></container>"#;
        assert!(matches!(
            find_package_path(xml),
            Err(IngestError::MalformedArchive(_))
        ));
    }

    #[test]
    fn parse_metadata_manifest_spine() {
        let pkg = PackageDocument::parse("OEBPS/content.opf", OPF).unwrap();
        assert_eq!(pkg.base_dir, "OEBPS/");
        assert_eq!(pkg.metadata.title.as_deref(), Some("The Long & Winding Road"));
        assert_eq!(pkg.metadata.creator.as_deref(), Some("Jane Doe"));
        assert_eq!(pkg.metadata.language.as_deref(), Some("en"));
        assert_eq!(pkg.metadata.cover_id.as_deref(), Some("cover-img"));
        assert_eq!(
            pkg.manifest.keys().cloned().collect::<Vec<_>>(),
            vec!["nav", "ncx", "cover-img", "ch1", "ch2"]
        );
        assert_eq!(
            pkg.spine,
            vec![
                SpineItem { idref: "ch1".into(), linear: true },
                SpineItem { idref: "ch2".into(), linear: false },
            ]
        );
        assert_eq!(pkg.spine_toc.as_deref(), Some("ncx"));
    }

    #[test]
    fn navigation_items_and_images() {
        let pkg = PackageDocument::parse("OEBPS/content.opf", OPF).unwrap();
        assert_eq!(pkg.nav_item().map(|i| i.href.as_str()), Some("nav.xhtml"));
        assert_eq!(pkg.ncx_item().map(|i| i.href.as_str()), Some("toc.ncx"));
        assert_eq!(pkg.image_items().count(), 1);
        assert_eq!(pkg.resolve("text/ch1.xhtml"), "OEBPS/text/ch1.xhtml");
    }

    #[test]
    fn html_entities_in_metadata_text() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
<dc:title>A&nbsp;B</dc:title><dc:creator>Jos&eacute; &amp; Ana</dc:creator><dc:publisher>X&unknown;Y</dc:publisher>
</metadata><manifest><item id="c" href="c.xhtml" media-type="application/xhtml+xml"/></manifest>
<spine><itemref idref="c"/></spine></package>"#;
        let pkg = PackageDocument::parse("content.opf", opf).unwrap();
        assert_eq!(pkg.metadata.title.as_deref(), Some("A\u{a0}B"));
        assert_eq!(pkg.metadata.creator.as_deref(), Some("Jos\u{e9} & Ana"));
        assert_eq!(pkg.metadata.publisher.as_deref(), Some("X&unknown;Y"));
    }

    #[test]
    fn mismatched_end_tag_is_tolerated() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></metadata>
<manifest><item id="c" href="c.xhtml" media-type="application/xhtml+xml"/></manifst>
<spine><itemref idref="c"/></spine></package>"#;
        let pkg = PackageDocument::parse("content.opf", opf).unwrap();
        assert_eq!(pkg.metadata.title.as_deref(), Some("T"));
        assert_eq!(pkg.spine.len(), 1);
    }

    #[test]
    fn damaged_tail_keeps_parsed_state() {
        let opf = r#"<package><metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>T</dc:title></metadata>
<manifest><item id="c" href="c.xhtml" media-type="application/xhtml+xml"/></manifest>
<spine><itemref idref="c"/></spine><guide><reference type="x"#;
        let pkg = PackageDocument::parse("content.opf", opf).unwrap();
        assert_eq!(pkg.metadata.title.as_deref(), Some("T"));
        assert_eq!(pkg.manifest.len(), 1);
        assert_eq!(pkg.spine, vec![SpineItem { idref: "c".into(), linear: true }]);
    }

    #[test]
    fn damage_before_any_structure_is_malformed() {
        let opf = r#"<package><metadata><dc:title>T</dc:title><meta name="cover" content="x"#;
        assert!(matches!(
            PackageDocument::parse("content.opf", opf),
            Err(IngestError::MalformedArchive(_))
        ));
    }

    #[test]
    fn package_at_archive_root() {
        let pkg = PackageDocument::parse("content.opf", OPF).unwrap();
        assert_eq!(pkg.base_dir, "");
        assert_eq!(pkg.resolve("./text/ch1.xhtml"), "text/ch1.xhtml");
    }
}
