use super::{OcrEngine, OcrOutcome};
use crate::error::OcrError;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

/// Response body of the `/parse/image` endpoint, only the parts we read.
#[derive(Debug, Deserialize)]
struct ParseResponse {
    #[serde(rename = "ParsedResults")]
    parsed_results: Option<Vec<ParsedResult>>,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ParsedResult {
    #[serde(rename = "ParsedText")]
    parsed_text: Option<String>,
}

/// Turn a decoded response body into an outcome.
///
/// The body must carry a non-empty `ParsedResults` list whose entries all have
/// `ParsedText`; anything else is reported as [`OcrOutcome::Failed`].
pub fn parse_ocr_response(body: &Value) -> OcrOutcome {
    let Ok(resp) = ParseResponse::deserialize(body) else {
        return OcrOutcome::Failed("unexpected response shape".to_string());
    };

    let Some(results) = resp.parsed_results.filter(|r| !r.is_empty()) else {
        let reason = match resp.error_message {
            Some(Value::String(s)) => s,
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("; "),
            _ => "response has no ParsedResults".to_string(),
        };
        return OcrOutcome::Failed(reason);
    };

    let mut pages = Vec::with_capacity(results.len());
    for (idx, result) in results.into_iter().enumerate() {
        match result.parsed_text {
            Some(text) => pages.push(text),
            None => return OcrOutcome::Failed(format!("result {idx} has no ParsedText")),
        }
    }
    OcrOutcome::Text(pages.join("\n"))
}

pub struct OcrSpaceClient {
    client: Client,
    endpoint: String,
    api_key: String,
    language: String,
}

impl OcrSpaceClient {
    pub fn new(endpoint: String, api_key: String, language: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
            api_key,
            language,
        }
    }
}

#[async_trait]
impl OcrEngine for OcrSpaceClient {
    async fn recognize(&self, file_name: &str, bytes: Vec<u8>) -> Result<OcrOutcome, OcrError> {
        info!(file = %file_name, bytes = bytes.len(), "Sending to OCR.space");

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("apikey", self.api_key.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        let preview: String = body.to_string().chars().take(1000).collect();
        info!(status = %status, body = %preview, "OCR.space responded");

        let outcome = parse_ocr_response(&body);
        if let OcrOutcome::Failed(reason) = &outcome {
            warn!(reason = %reason, "OCR.space returned no usable text");
        }
        Ok(outcome)
    }
}
