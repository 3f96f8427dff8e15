//! Object-created notification, in the shape the hosting platform delivers it.

use crate::error::TriggerError;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct TriggerEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
pub struct EventRecord {
    pub s3: S3Entity,
    #[serde(rename = "responseElements", default)]
    pub response_elements: Option<ResponseElements>,
}

#[derive(Debug, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

#[derive(Debug, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRef {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct ResponseElements {
    #[serde(rename = "x-amz-request-id")]
    pub request_id: Option<String>,
}

/// The bits of an event the ingest pipeline acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectCreated {
    pub bucket: String,
    pub key: String,
    pub request_id: Option<String>,
}

impl TriggerEvent {
    pub fn from_json(raw: &str) -> Result<Self, TriggerError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read an event from a file, or from stdin when `path` is `-`.
    pub fn read(path: &Path) -> Result<Self, TriggerError> {
        let raw = if path == Path::new("-") {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        } else {
            std::fs::read_to_string(path)?
        };
        Self::from_json(&raw)
    }

    /// First record of the event with its key URL-decoded.
    pub fn object_created(&self) -> Result<ObjectCreated, TriggerError> {
        let record = self.records.first().ok_or(TriggerError::NoRecords)?;
        if self.records.len() > 1 {
            warn!(records = self.records.len(), "Event has several records, only the first is processed");
        }
        Ok(ObjectCreated {
            bucket: record.s3.bucket.name.clone(),
            key: decode_key(&record.s3.object.key)?,
            request_id: record
                .response_elements
                .as_ref()
                .and_then(|r| r.request_id.clone()),
        })
    }
}

/// Keys in notifications are form-encoded: `+` is a space, the rest is `%XX`.
pub fn decode_key(raw: &str) -> Result<String, TriggerError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|k| k.into_owned())
        .map_err(|_| TriggerError::KeyEncoding(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
      "Records": [{
        "eventVersion": "2.1",
        "eventSource": "aws:s3",
        "eventName": "ObjectCreated:Put",
        "responseElements": {
          "x-amz-request-id": "C3D13FE58DE4C810",
          "x-amz-id-2": "FMyUVURIY8/IgAtTv8xRjskZQpcIZ9KG4V5Wp6S7S/JRWeUWerMUE5JgHvANOjpD"
        },
        "s3": {
          "bucket": { "name": "incoming-invoices", "arn": "arn:aws:s3:::incoming-invoices" },
          "object": { "key": "2024/March+Invoice%2301.pdf", "size": 1024 }
        }
      }]
    }"#;

    #[test]
    fn test_parses_sample_event() {
        let event = TriggerEvent::from_json(SAMPLE).unwrap();
        let created = event.object_created().unwrap();
        assert_eq!(created.bucket, "incoming-invoices");
        assert_eq!(created.key, "2024/March Invoice#01.pdf");
        assert_eq!(created.request_id.as_deref(), Some("C3D13FE58DE4C810"));
    }

    #[test]
    fn test_no_records() {
        let event = TriggerEvent::from_json(r#"{"Records": []}"#).unwrap();
        assert!(matches!(event.object_created(), Err(TriggerError::NoRecords)));

        let event = TriggerEvent::from_json("{}").unwrap();
        assert!(matches!(event.object_created(), Err(TriggerError::NoRecords)));
    }

    #[test]
    fn test_missing_response_elements() {
        let event = TriggerEvent::from_json(
            r#"{"Records": [{"s3": {"bucket": {"name": "b"}, "object": {"key": "k.png"}}}]}"#,
        )
        .unwrap();
        let created = event.object_created().unwrap();
        assert_eq!(created.request_id, None);
    }

    #[test]
    fn test_malformed_event() {
        assert!(matches!(
            TriggerEvent::from_json(r#"{"Records": [{"s3": {}}]}"#),
            Err(TriggerError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("plain.pdf").unwrap(), "plain.pdf");
        assert_eq!(decode_key("a%2Bb.pdf").unwrap(), "a+b.pdf");
        assert_eq!(decode_key("caf%C3%A9.png").unwrap(), "café.png");
        assert!(decode_key("%FF%FE").is_err());
    }
}
