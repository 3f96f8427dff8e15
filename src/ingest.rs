// src/ingest.rs

use crate::doc_store::DocumentStore;
use crate::error::IngestError;
use crate::heuristics::{self, InvoiceFields};
use crate::object_store::ObjectStore;
use crate::ocr::{OcrEngine, OcrOutcome};
use crate::trigger::{ObjectCreated, TriggerEvent};
use serde::Serialize;
use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, info_span, Instrument};

const PREVIEW_CHARS: usize = 500;

/// Status-coded result handed back to whoever fired the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl IngestResponse {
    fn saved() -> Self {
        Self {
            status_code: 200,
            body: "Invoice processed and saved.".to_string(),
        }
    }

    fn ocr_failed() -> Self {
        Self {
            status_code: 500,
            body: "OCR failed".to_string(),
        }
    }
}

/// One invoice as persisted. Built once per event and never changed.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedInvoice {
    #[serde(flatten)]
    pub fields: InvoiceFields,
    pub raw_text: String,
    pub s3_bucket: String,
    pub s3_key: String,
    /// Carries the request id, as existing documents in the collection do.
    pub processed_at: Option<String>,
    pub request_id: Option<String>,
    pub ingested_at: String,
}

impl ExtractedInvoice {
    pub fn new(source: &ObjectCreated, raw_text: String, ingested_at: String) -> Self {
        Self {
            fields: heuristics::extract_invoice_fields(&raw_text),
            raw_text,
            s3_bucket: source.bucket.clone(),
            s3_key: source.key.clone(),
            processed_at: source.request_id.clone(),
            request_id: source.request_id.clone(),
            ingested_at,
        }
    }

    pub fn to_document(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(serde::ser::Error::custom(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

/// The collaborators one ingest run talks to, in call order.
pub struct IngestPipeline<'a> {
    pub store: &'a dyn ObjectStore,
    pub ocr: &'a dyn OcrEngine,
    pub docs: &'a dyn DocumentStore,
    pub collection: &'a str,
}

/// Character count and a bounded preview of recognized text.
fn text_summary(text: &str) -> (usize, String) {
    (text.chars().count(), text.chars().take(PREVIEW_CHARS).collect())
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

impl IngestPipeline<'_> {
    /// fetch -> OCR -> extract -> insert. Stops before extraction if OCR failed.
    pub async fn handle(&self, event: &TriggerEvent) -> Result<IngestResponse, IngestError> {
        let source = event.object_created()?;
        let span = info_span!(
            "ingest",
            bucket = %source.bucket,
            key = %source.key,
            request_id = source.request_id.as_deref().unwrap_or("-"),
        );
        self.process(source).instrument(span).await
    }

    async fn process(&self, source: ObjectCreated) -> Result<IngestResponse, IngestError> {
        info!("Processing file");

        let bytes = self.store.get_object(&source.bucket, &source.key).await?;
        info!(bytes = bytes.len(), "File downloaded");

        let raw_text = match self.ocr.recognize(file_name(&source.key), bytes).await? {
            OcrOutcome::Text(text) => text,
            OcrOutcome::Failed(reason) => {
                tracing::error!(reason = %reason, "OCR failed");
                return Ok(IngestResponse::ocr_failed());
            }
        };
        let (chars, preview) = text_summary(&raw_text);
        info!(chars, preview = %preview, "Text recognized");

        let ingested_at = OffsetDateTime::now_utc().format(&Rfc3339)?;
        let invoice = ExtractedInvoice::new(&source, raw_text, ingested_at);
        let (filled, total) = invoice.fields.coverage();
        info!(
            filled,
            total,
            invoice_no = ?invoice.fields.invoice_no,
            total_amount = ?invoice.fields.total,
            date = ?invoice.fields.date,
            vendor = ?invoice.fields.vendor,
            "Extracted fields"
        );

        let doc = invoice.to_document().map_err(crate::error::DocStoreError::from)?;
        let id = self.docs.insert_one(self.collection, &doc).await?;
        info!(collection = %self.collection, id, "Invoice stored");

        Ok(IngestResponse::saved())
    }
}
