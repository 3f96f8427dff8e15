use crate::error::ConfigError;
use serde::Deserialize;
use std::{env, fs, path::Path};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub object_store: ObjectStoreSection,
    #[serde(default)]
    pub dedup: DedupSection,
    #[serde(default)]
    pub ocr: OcrSection,
    #[serde(default)]
    pub document_store: DocumentStoreSection,
}

#[derive(Debug, Deserialize)]
pub struct ObjectStoreSection {
    #[serde(default = "default_store_root")]
    pub root: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ObjectStoreSection {
    fn default() -> Self {
        Self {
            root: default_store_root(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DedupSection {
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl Default for DedupSection {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
        }
    }
}

/// Which engine turns uploaded bytes into text.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OcrBackend {
    /// Remote OCR.space-compatible HTTP endpoint.
    #[default]
    OcrSpace,
    /// Local read of a PDF's embedded text layer, no network.
    TextLayer,
}

#[derive(Debug, Deserialize)]
pub struct OcrSection {
    #[serde(default)]
    pub backend: OcrBackend,
    #[serde(default = "default_ocr_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ocr_language")]
    pub language: String,
}

impl Default for OcrSection {
    fn default() -> Self {
        Self {
            backend: OcrBackend::default(),
            endpoint: default_ocr_endpoint(),
            api_key: None,
            language: default_ocr_language(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DocumentStoreSection {
    #[serde(default = "default_docstore_uri")]
    pub uri: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for DocumentStoreSection {
    fn default() -> Self {
        Self {
            uri: default_docstore_uri(),
            database: default_database(),
            collection: default_collection(),
        }
    }
}

fn default_store_root() -> String {
    "buckets".to_string()
}

fn default_page_size() -> usize {
    1000
}

fn default_bucket() -> String {
    "removeredundancys3".to_string()
}

fn default_ocr_endpoint() -> String {
    "https://api.ocr.space/parse/image".to_string()
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_docstore_uri() -> String {
    "docstore".to_string()
}

fn default_database() -> String {
    "invoices_db".to_string()
}

fn default_collection() -> String {
    "invoices".to_string()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load the optional config file, then let the process environment win.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut cfg = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        cfg.apply_overrides(|name| env::var(name).ok())?;
        Ok(cfg)
    }

    /// Apply `NAME=value` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("OBJECT_STORE_ROOT") {
            self.object_store.root = v;
        }
        if let Some(v) = lookup("OBJECT_STORE_PAGE_SIZE") {
            self.object_store.page_size = match v.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "OBJECT_STORE_PAGE_SIZE",
                        value: v,
                    });
                }
            };
        }
        if let Some(v) = lookup("DEDUP_BUCKET") {
            self.dedup.bucket = v;
        }
        if let Some(v) = lookup("OCR_BACKEND") {
            self.ocr.backend = match v.as_str() {
                "ocr_space" => OcrBackend::OcrSpace,
                "text_layer" => OcrBackend::TextLayer,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: "OCR_BACKEND",
                        value: v,
                    });
                }
            };
        }
        if let Some(v) = lookup("OCR_SPACE_API_KEY") {
            self.ocr.api_key = Some(v);
        }
        if let Some(v) = lookup("OCR_ENDPOINT") {
            self.ocr.endpoint = v;
        }
        if let Some(v) = lookup("OCR_LANGUAGE") {
            self.ocr.language = v;
        }
        if let Some(v) = lookup("DOCSTORE_URI") {
            self.document_store.uri = v;
        }
        if let Some(v) = lookup("DOCSTORE_DB") {
            self.document_store.database = v;
        }
        if let Some(v) = lookup("DOCSTORE_COLLECTION") {
            self.document_store.collection = v;
        }
        Ok(())
    }
}
