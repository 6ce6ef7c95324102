//! WASM bindings for shelf.

use shelf_core::config::{ingest_options_from_config, AppConfig};
use shelf_core::{parse_epub as ingest, IngestOptions};
use wasm_bindgen::prelude::*;

fn options(added_at: f64) -> IngestOptions {
    IngestOptions {
        added_at: Some(added_at as i64),
        ..ingest_options_from_config(&AppConfig::default())
    }
}

/// Parse EPUB bytes. Returns a JSON string `{ book, chapters, tocChapters }`.
///
/// `added_at` is the caller's clock in epoch milliseconds (`Date.now()`).
#[wasm_bindgen]
pub fn parse_epub(
    data: &[u8],
    filename: &str,
    folder_id: Option<String>,
    added_at: f64,
) -> Result<String, JsValue> {
    let parsed = ingest(data.to_vec(), filename, folder_id.as_deref(), &options(added_at), None)
        .map_err(|e| JsValue::from_str(&e.to_string()))?;
    serde_json::to_string(&parsed).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Sanitize an HTML fragment for rendering.
#[wasm_bindgen]
pub fn sanitize_html(html: &str) -> String {
    shelf_core::sanitize::sanitize_html(html)
}

/// Word count and reading time for a chapter's HTML, as JSON.
#[wasm_bindgen]
pub fn chapter_stats(html: &str) -> Result<String, JsValue> {
    let text = shelf_core::stats::extract_text_content(html);
    let words = shelf_core::stats::count_words(&text);
    let stats = serde_json::json!({
        "wordCount": words,
        "readingMinutes": shelf_core::stats::reading_minutes(words),
    });
    serde_json::to_string(&stats).map_err(|e| JsValue::from_str(&e.to_string()))
}
