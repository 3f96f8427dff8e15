// src/ocr/text_layer.rs

use super::{OcrEngine, OcrOutcome};
use crate::error::OcrError;
use async_trait::async_trait;
use lopdf::Document;
use tracing::{info, warn};

/// Below this many non-whitespace characters a PDF is treated as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Offline engine: reads the text layer a PDF already carries.
/// Image-only or unparsable uploads come back as `Failed`.
pub struct TextLayerEngine;

#[async_trait]
impl OcrEngine for TextLayerEngine {
    async fn recognize(&self, file_name: &str, bytes: Vec<u8>) -> Result<OcrOutcome, OcrError> {
        info!(file = %file_name, bytes = bytes.len(), "Reading embedded text layer");
        let outcome = tokio::task::spawn_blocking(move || read_text_layer(&bytes))
            .await
            .unwrap_or_else(|e| OcrOutcome::Failed(format!("text extraction panicked: {e}")));
        Ok(outcome)
    }
}

fn read_text_layer(pdf_bytes: &[u8]) -> OcrOutcome {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return OcrOutcome::Failed(format!("not a readable PDF: {e}")),
    };

    if mostly_image_pages(&doc) {
        info!("Every page looks scanned, no text layer to read");
        return OcrOutcome::Failed("document is image-only".to_string());
    }

    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "Text layer too thin");
                OcrOutcome::Failed(format!("text layer has only {meaningful} characters"))
            } else {
                info!(chars = meaningful, "Text layer extracted");
                OcrOutcome::Text(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed");
            OcrOutcome::Failed(format!("text extraction failed: {e}"))
        }
    }
}

/// A page with XObject images but no fonts is almost certainly a scan.
/// True when at least 80% of pages look like that.
fn mostly_image_pages(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let image_only = pages
        .values()
        .filter(|id| {
            let Some(resources) = doc
                .get_object(**id)
                .ok()
                .and_then(|page| page.as_dict().ok())
                .and_then(|page| page.get(b"Resources").ok())
                .and_then(|r| doc.dereference(r).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok())
            else {
                return false;
            };
            let non_empty = |name: &[u8]| {
                resources
                    .get(name)
                    .ok()
                    .and_then(|o| doc.dereference(o).ok())
                    .and_then(|(_, resolved)| resolved.as_dict().ok())
                    .is_some_and(|d| !d.is_empty())
            };
            non_empty(b"XObject") && !non_empty(b"Font")
        })
        .count();

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        total_pages = pages.len(),
        image_only,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );
    ratio >= 0.8
}
