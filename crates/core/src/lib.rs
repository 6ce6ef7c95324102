pub mod archive;
pub mod chapters;
pub mod config;
pub mod cover;
pub mod document;
pub mod encoding;
pub mod error;
pub mod fallback;
pub mod images;
pub mod ingest;
pub mod library;
pub mod links;
pub mod markup;
pub mod package;
pub mod path;
pub mod progress;
pub mod reconcile;
pub mod sanitize;
pub mod security;
pub mod session;
pub mod stats;
pub mod title;
pub mod toc;

pub use ingest::{parse_epub, parse_epub_file, IngestOptions, ParsedBook};

pub mod prelude {
    pub use crate::document::*;
    pub use crate::error::*;
    pub use crate::ingest::{parse_epub, parse_epub_file, IngestOptions, ParsedBook};
}
