// src/dedup.rs

use crate::error::StoreError;
use crate::object_store::ObjectStore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{info, info_span, Instrument};

/// SHA-256 of the full object body, lowercase hex.
pub fn content_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// What the index decided about one key.
#[derive(Debug, PartialEq, Eq)]
pub enum Classification {
    Canonical,
    Duplicate { canonical_key: String },
}

/// Digest -> first-seen key. Lives for one run only.
#[derive(Debug, Default)]
pub struct HashIndex {
    seen: HashMap<String, String>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` under `digest`; the first key per digest stays canonical.
    pub fn observe(&mut self, digest: &str, key: &str) -> Classification {
        match self.seen.get(digest) {
            Some(first) => Classification::Duplicate {
                canonical_key: first.clone(),
            },
            None => {
                self.seen.insert(digest.to_string(), key.to_string());
                Classification::Canonical
            }
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateEntry {
    pub key: String,
    pub digest: String,
    pub canonical_key: String,
}

#[derive(Debug, Default)]
pub struct DedupReport {
    pub scanned: usize,
    pub canonical: Vec<(String, String)>,
    pub duplicates: Vec<DuplicateEntry>,
    pub deleted: Vec<String>,
}

impl DedupReport {
    pub fn bucket_was_empty(&self) -> bool {
        self.scanned == 0
    }
}

/// List every page of `bucket`, in listing order.
async fn list_all_keys(store: &dyn ObjectStore, bucket: &str) -> Result<Vec<String>, StoreError> {
    let mut keys = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = store.list_objects(bucket, token.as_deref()).await?;
        info!(
            keys = page.keys.len(),
            has_next = page.next_continuation_token.is_some(),
            "Page listed"
        );
        keys.extend(page.keys);
        match page.next_continuation_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(keys)
}

/// Hash every object in `bucket` and classify it. Nothing is deleted here,
/// so the caller can show the report before [`delete_duplicates`] runs.
pub async fn find_duplicates(store: &dyn ObjectStore, bucket: &str) -> Result<DedupReport, StoreError> {
    let span = info_span!("dedup_scan", bucket = %bucket);
    async move {
        let mut report = DedupReport::default();

        let keys = list_all_keys(store, bucket).await?;
        if keys.is_empty() {
            info!("Bucket is empty");
            return Ok(report);
        }

        let mut index = HashIndex::new();
        for key in keys {
            let data = store.get_object(bucket, &key).await?;
            let digest = content_digest(&data);
            report.scanned += 1;

            match index.observe(&digest, &key) {
                Classification::Canonical => report.canonical.push((digest, key)),
                Classification::Duplicate { canonical_key } => {
                    report.duplicates.push(DuplicateEntry {
                        key,
                        digest,
                        canonical_key,
                    })
                }
            }
        }

        info!(
            scanned = report.scanned,
            unique = index.len(),
            duplicates = report.duplicates.len(),
            "Hashing complete"
        );
        for dup in &report.duplicates {
            info!(key = %dup.key, canonical = %dup.canonical_key, digest = %dup.digest, "Duplicate");
        }
        Ok(report)
    }
    .instrument(span)
    .await
}

/// Delete every duplicate in `report`, in order. `report.deleted` grows as
/// each delete succeeds, so after an error it still says what is gone.
pub async fn delete_duplicates(
    store: &dyn ObjectStore,
    bucket: &str,
    report: &mut DedupReport,
) -> Result<(), StoreError> {
    let span = info_span!("dedup_delete", bucket = %bucket, pending = report.duplicates.len());
    async move {
        for dup in &report.duplicates {
            if report.deleted.contains(&dup.key) {
                continue;
            }
            store.delete_object(bucket, &dup.key).await?;
            info!(key = %dup.key, "Deleted");
            report.deleted.push(dup.key.clone());
        }
        Ok(())
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{ListPage, MemoryObjectStore};
    use async_trait::async_trait;

    async fn find_then_delete(store: &dyn ObjectStore, bucket: &str) -> DedupReport {
        let mut report = find_duplicates(store, bucket).await.unwrap();
        delete_duplicates(store, bucket, &mut report).await.unwrap();
        report
    }

    /// Lets every listing and fetch through but refuses to delete `refused`.
    struct RefusingDelete {
        inner: MemoryObjectStore,
        refused: &'static str,
    }

    #[async_trait]
    impl ObjectStore for RefusingDelete {
        async fn list_objects(
            &self,
            bucket: &str,
            continuation_token: Option<&str>,
        ) -> Result<ListPage, StoreError> {
            self.inner.list_objects(bucket, continuation_token).await
        }

        async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
            self.inner.get_object(bucket, key).await
        }

        async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
            if key == self.refused {
                return Err(StoreError::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "read-only object",
                )));
            }
            self.inner.delete_object(bucket, key).await
        }
    }

    #[test]
    fn test_digest_is_sha256_hex() {
        assert_eq!(
            content_digest(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_digest(b"abc"), content_digest(b"abc"));
        assert_ne!(content_digest(b"abc"), content_digest(b"abd"));
    }

    #[test]
    fn test_index_first_seen_wins() {
        let mut index = HashIndex::new();
        assert_eq!(index.observe("d1", "z.txt"), Classification::Canonical);
        assert_eq!(
            index.observe("d1", "a.txt"),
            Classification::Duplicate {
                canonical_key: "z.txt".to_string()
            }
        );
        assert_eq!(index.observe("d2", "a.txt"), Classification::Canonical);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_identical_content_keeps_one() {
        let store = MemoryObjectStore::new(1000);
        store.put("b", "copy-2.pdf", b"same bytes");
        store.put("b", "original.pdf", b"same bytes");
        store.put("b", "zz-copy.pdf", b"same bytes");
        store.put("b", "other.pdf", b"different");

        let report = find_then_delete(&store, "b").await;

        assert_eq!(report.scanned, 4);
        assert_eq!(report.canonical.len(), 2);
        let dup_keys: Vec<&str> = report.duplicates.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(dup_keys, vec!["original.pdf", "zz-copy.pdf"]);
        assert!(report
            .duplicates
            .iter()
            .all(|d| d.canonical_key == "copy-2.pdf"));
        assert_eq!(report.deleted, vec!["original.pdf", "zz-copy.pdf"]);
        assert_eq!(store.keys("b"), vec!["copy-2.pdf", "other.pdf"]);
    }

    #[tokio::test]
    async fn test_distinct_content_no_duplicates() {
        let store = MemoryObjectStore::new(1000);
        for i in 0..5 {
            store.put("b", &format!("k{i}"), format!("body {i}").as_bytes());
        }
        let report = find_then_delete(&store, "b").await;
        assert_eq!(report.scanned, 5);
        assert!(report.duplicates.is_empty());
        assert!(report.deleted.is_empty());
        assert_eq!(store.keys("b").len(), 5);
    }

    #[tokio::test]
    async fn test_follows_every_page() {
        let store = MemoryObjectStore::new(2);
        store.put("b", "a", b"x");
        store.put("b", "b", b"y");
        store.put("b", "c", b"x");
        store.put("b", "d", b"z");
        store.put("b", "e", b"y");

        let report = find_then_delete(&store, "b").await;

        assert_eq!(report.scanned, 5);
        assert_eq!(report.deleted, vec!["c", "e"]);
        assert_eq!(store.keys("b"), vec!["a", "b", "d"]);
    }

    #[tokio::test]
    async fn test_finding_deletes_nothing() {
        let store = MemoryObjectStore::new(1000);
        store.put("b", "one", b"dup");
        store.put("b", "two", b"dup");

        let report = find_duplicates(&store, "b").await.unwrap();

        assert_eq!(report.duplicates.len(), 1);
        assert_eq!(report.duplicates[0].key, "two");
        assert!(report.deleted.is_empty());
        assert_eq!(store.keys("b"), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_partial_report() {
        let store = RefusingDelete {
            inner: MemoryObjectStore::new(1000),
            refused: "c",
        };
        store.inner.put("b", "a", b"same");
        store.inner.put("b", "b", b"same");
        store.inner.put("b", "c", b"same");
        store.inner.put("b", "d", b"same");

        let mut report = find_duplicates(&store, "b").await.unwrap();
        let err = delete_duplicates(&store, "b", &mut report)
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(report.duplicates.len(), 3);
        assert_eq!(report.deleted, vec!["b"]);
        assert_eq!(store.inner.keys("b"), vec!["a", "c", "d"]);
    }

    #[tokio::test]
    async fn test_empty_bucket() {
        let store = MemoryObjectStore::new(1000);
        store.create_bucket("empty");
        let report = find_duplicates(&store, "empty").await.unwrap();
        assert!(report.bucket_was_empty());
        assert!(report.duplicates.is_empty());
    }

    #[tokio::test]
    async fn test_listing_error_propagates() {
        let store = MemoryObjectStore::new(1000);
        let err = find_duplicates(&store, "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
    }
}
