//! A small owned markup tree plus the parse/serialize capability used by the
//! sanitizer, the chapter extractor and the link rewriter.
//!
//! Parsing goes through [`MarkupBackend`]; the default backend is the
//! html5ever-based `scraper` parser, so no browser DOM is needed.

use scraper::{ElementRef, Html};

use crate::encoding::collapse_whitespace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lower-case local name.
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attrs.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(k, _)| k != name);
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

pub trait MarkupBackend {
    /// Parse a full (X)HTML document and return the children of its body.
    fn parse_document(&self, html: &str) -> Vec<Node>;

    /// Parse a body-level fragment.
    fn parse_fragment(&self, html: &str) -> Vec<Node>;

    fn serialize(&self, nodes: &[Node]) -> String {
        serialize(nodes)
    }
}

/// html5ever parsing via `scraper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Html5Backend;

impl MarkupBackend for Html5Backend {
    fn parse_document(&self, html: &str) -> Vec<Node> {
        let doc = Html::parse_document(html);
        let root = doc.root_element();
        root.children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .map(convert_children)
            .unwrap_or_default()
    }

    fn parse_fragment(&self, html: &str) -> Vec<Node> {
        let frag = Html::parse_fragment(html);
        convert_children(frag.root_element())
    }
}

fn convert_children(el: ElementRef<'_>) -> Vec<Node> {
    let mut out = Vec::new();
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(t) => out.push(Node::Text(t.to_string())),
            scraper::Node::Comment(c) => out.push(Node::Comment(c.comment.to_string())),
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push(Node::Element(convert_element(child_el)));
                }
            }
            _ => {}
        }
    }
    out
}

fn convert_element(el: ElementRef<'_>) -> Element {
    Element {
        name: el.value().name().to_ascii_lowercase(),
        attrs: el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        children: convert_children(el),
    }
}

// --- Tree helpers ---

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) => {}
        }
    }
}

pub fn text_content(nodes: &[Node]) -> String {
    let mut out = String::new();
    collect_text(nodes, &mut out);
    out
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "ol", "p",
    "pre", "section", "table", "td", "th", "tr", "ul",
];

fn collect_readable_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) => {
                let block = BLOCK_ELEMENTS.contains(&el.name.as_str());
                if block {
                    out.push(' ');
                }
                collect_readable_text(&el.children, out);
                if block {
                    out.push(' ');
                }
            }
            Node::Comment(_) => {}
        }
    }
}

/// Text as read: block boundaries separate words, whitespace collapsed.
pub fn readable_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    collect_readable_text(nodes, &mut out);
    collapse_whitespace(&out)
}

/// First element in document order matching `pred`.
pub fn find_element<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    for node in nodes {
        if let Node::Element(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_element(&el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

/// Visit every element in document order.
pub fn for_each_element_mut(nodes: &mut [Node], f: &mut dyn FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            for_each_element_mut(&mut el.children, f);
        }
    }
}

// --- Serialization ---

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

/// Serialize nodes as HTML (inner-HTML style).
pub fn serialize(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_nodes(nodes, false, &mut out);
    out
}

fn write_nodes(nodes: &[Node], raw_text: bool, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) if raw_text => out.push_str(t),
            Node::Text(t) => escape_into(t, false, out),
            Node::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            Node::Element(el) => {
                out.push('<');
                out.push_str(&el.name);
                for (k, v) in &el.attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_into(v, true, out);
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    continue;
                }
                write_nodes(
                    &el.children,
                    RAW_TEXT_ELEMENTS.contains(&el.name.as_str()),
                    out,
                );
                out.push_str("</");
                out.push_str(&el.name);
                out.push('>');
            }
        }
    }
}

fn escape_into(s: &str, attr: bool, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attr => out.push_str("&quot;"),
            '<' if !attr => out.push_str("&lt;"),
            '>' if !attr => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_document_returns_body_children() {
        let html = r#"<?xml version="1.0"?><html xmlns="http://www.w3.org/1999/xhtml">
<head><title>ignored</title></head><body><h1 class="t">Hi</h1><p>a &amp; b</p></body></html>"#;
        let nodes = Html5Backend.parse_document(html);
        let h1 = find_element(&nodes, &|e| e.name == "h1").unwrap();
        assert_eq!(h1.attr("class"), Some("t"));
        assert_eq!(h1.text_content(), "Hi");
        assert!(!text_content(&nodes).contains("ignored"));
    }

    #[test]
    fn serialize_escapes_text_and_attributes() {
        let nodes = Html5Backend.parse_fragment(r#"<p title="a &quot;q&quot;">1 &lt; 2 &amp; 3</p><br><img src="x.png">"#);
        assert_eq!(
            serialize(&nodes),
            r#"<p title="a &quot;q&quot;">1 &lt; 2 &amp; 3</p><br><img src="x.png">"#
        );
    }

    #[test]
    fn fragment_round_trip_is_stable() {
        let html = r#"<div id="x"><a href="/reader/b/1#n">link</a><!--c--></div>"#;
        let once = serialize(&Html5Backend.parse_fragment(html));
        let twice = serialize(&Html5Backend.parse_fragment(&once));
        assert_eq!(once, twice);
        assert_eq!(once, html);
    }

    #[test]
    fn attributes_keep_source_order() {
        let html = r#"<img src="a.png" alt="A" class="wide" id="fig"><a title="t" href="x.xhtml">x</a>"#;
        let mut nodes = Html5Backend.parse_fragment(html);
        assert_eq!(serialize(&nodes), html);

        for_each_element_mut(&mut nodes, &mut |el| {
            if el.name == "img" {
                el.set_attr("src", "data:image/png;base64,AAAA");
            }
        });
        assert_eq!(
            serialize(&nodes),
            r#"<img src="data:image/png;base64,AAAA" alt="A" class="wide" id="fig"><a title="t" href="x.xhtml">x</a>"#
        );
    }

    #[test]
    fn readable_text_separates_blocks() {
        let nodes = Html5Backend.parse_fragment("<h1>Title</h1><p>One <b>two</b>,\n three.</p><p>Four<br>five</p>");
        assert_eq!(readable_text(&nodes), "Title One two, three. Four five");
        assert_eq!(text_content(&nodes), "TitleOne two,\n three.Fourfive");
    }

    #[test]
    fn element_attribute_editing() {
        let mut el = Element::new("A");
        el.set_attr("href", "x");
        el.set_attr("href", "y");
        el.set_attr("id", "z");
        assert_eq!(el.name, "a");
        assert_eq!(el.attr("href"), Some("y"));
        el.remove_attr("href");
        assert_eq!(el.attr("href"), None);
        assert_eq!(el.attrs.len(), 1);
    }

    #[test]
    fn visit_elements_in_document_order() {
        let mut nodes = Html5Backend.parse_fragment("<div><p>1</p><span>2</span></div><em>3</em>");
        let mut seen = Vec::new();
        for_each_element_mut(&mut nodes, &mut |el| seen.push(el.name.clone()));
        assert_eq!(seen, vec!["div", "p", "span", "em"]);
    }
}
