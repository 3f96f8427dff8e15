// src/ocr/mod.rs

mod ocr_space;
mod text_layer;

pub use ocr_space::OcrSpaceClient;
pub use text_layer::TextLayerEngine;

use crate::config::{OcrBackend, OcrSection};
use crate::error::OcrError;
use async_trait::async_trait;
use tracing::info;

/// What came back from an OCR attempt that completed at the transport level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcrOutcome {
    /// Recognized text, pages joined by newlines.
    Text(String),
    /// The engine answered but without usable text.
    Failed(String),
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, file_name: &str, bytes: Vec<u8>) -> Result<OcrOutcome, OcrError>;
}

/// Build the engine selected in config.
pub fn engine_from_config(ocr: &OcrSection) -> Result<Box<dyn OcrEngine>, OcrError> {
    match ocr.backend {
        OcrBackend::OcrSpace => {
            let api_key = ocr
                .api_key
                .clone()
                .ok_or_else(|| OcrError::Config("OCR_SPACE_API_KEY is not set".to_string()))?;
            info!(endpoint = %ocr.endpoint, language = %ocr.language, "Using OCR.space backend");
            Ok(Box::new(OcrSpaceClient::new(
                ocr.endpoint.clone(),
                api_key,
                ocr.language.clone(),
            )))
        }
        OcrBackend::TextLayer => {
            info!("Using embedded text layer backend");
            Ok(Box::new(TextLayerEngine))
        }
    }
}
