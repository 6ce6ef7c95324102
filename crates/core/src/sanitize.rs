//! Allow-list HTML sanitizer for chapter markup.

use crate::markup::{Element, Html5Backend, MarkupBackend, Node};

pub const ALLOWED_TAGS: &[&str] = &[
    "p", "div", "span", "h1", "h2", "h3", "h4", "h5", "h6", "em", "strong", "i", "b", "u", "s",
    "sup", "sub", "br", "hr", "img", "a", "ul", "ol", "li", "blockquote", "pre", "code", "table",
    "thead", "tbody", "tr", "th", "td", "figure", "figcaption", "section", "article", "aside",
    "header", "footer", "nav", "main",
];

pub const ALLOWED_ATTRIBUTES: &[&str] = &[
    "href", "src", "alt", "title", "class", "id", "width", "height", "style",
];

pub const DANGEROUS_PROTOCOLS: &[&str] = &["javascript:", "data:", "vbscript:"];

/// Tree sanitizer.
///
/// Disallowed elements are removed together with their subtree, comments
/// are dropped, attributes are filtered against [`ALLOWED_ATTRIBUTES`] and
/// `on*` handlers are always removed. `href`/`src` values starting with a
/// dangerous protocol are removed, except `data:image/` on `img[src]` when
/// inline images are allowed.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    pub allow_inline_images: bool,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self {
            allow_inline_images: true,
        }
    }
}

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize a whole document and return the inner markup of its body.
    pub fn sanitize_document<B: MarkupBackend + ?Sized>(&self, backend: &B, html: &str) -> String {
        let mut nodes = backend.parse_document(html);
        self.sanitize_nodes(&mut nodes);
        backend.serialize(&nodes)
    }

    pub fn sanitize_nodes(&self, nodes: &mut Vec<Node>) {
        nodes.retain(|node| match node {
            Node::Element(el) => ALLOWED_TAGS.contains(&el.name.as_str()),
            Node::Comment(_) => false,
            Node::Text(_) => true,
        });

        for node in nodes.iter_mut() {
            if let Node::Element(el) = node {
                self.sanitize_attributes(el);
                self.sanitize_nodes(&mut el.children);
            }
        }
    }

    fn sanitize_attributes(&self, el: &mut Element) {
        let tag = el.name.clone();
        el.attrs.retain(|(name, value)| {
            let name = name.to_ascii_lowercase();
            if name.starts_with("on") || !ALLOWED_ATTRIBUTES.contains(&name.as_str()) {
                return false;
            }
            if name == "href" || name == "src" {
                return !self.is_dangerous(&tag, &name, value);
            }
            true
        });
    }

    fn is_dangerous(&self, tag: &str, attr: &str, value: &str) -> bool {
        let value = value.trim().to_ascii_lowercase();
        if self.allow_inline_images
            && tag == "img"
            && attr == "src"
            && value.starts_with("data:image/")
        {
            return false;
        }
        DANGEROUS_PROTOCOLS.iter().any(|p| value.starts_with(p))
    }
}

/// Sanitize a document with the default parser and policy.
pub fn sanitize_html(html: &str) -> String {
    Sanitizer::default().sanitize_document(&Html5Backend, html)
}
