//! Object store collaborator: list, fetch and delete objects by key.
//!
//! `FsObjectStore` maps a bucket to a directory beneath `root` and a key to a
//! `/`-separated path inside it. Listing is in byte order of the key and is
//! paged; the continuation token is the last key of the previous page.

use crate::error::StoreError;
use async_trait::async_trait;
use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// One page of a bucket listing.
#[derive(Debug, Default)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next_continuation_token: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of keys, starting after `continuation_token` if given.
    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// Reject keys that could escape the bucket directory.
fn ensure_key_safe(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.split('/').any(|seg| seg == ".." || seg == ".")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\');
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Take at most `page_size` keys after `start_after` from a sorted key list.
fn paginate(sorted: Vec<String>, start_after: Option<&str>, page_size: usize) -> ListPage {
    let mut remaining = sorted
        .into_iter()
        .filter(|k| start_after.is_none_or(|after| k.as_str() > after));
    let keys: Vec<String> = remaining.by_ref().take(page_size).collect();
    let next_continuation_token = match remaining.next() {
        Some(_) => keys.last().cloned(),
        None => None,
    };
    ListPage {
        keys,
        next_continuation_token,
    }
}

pub struct FsObjectStore {
    root: PathBuf,
    page_size: usize,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, page_size: usize) -> Self {
        Self {
            root: root.into(),
            page_size: page_size.max(1),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket == ".." || bucket == "." {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        let dir = self.root.join(bucket);
        if !dir.is_dir() {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }
        Ok(dir)
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        ensure_key_safe(key)?;
        let mut path = self.bucket_dir(bucket)?;
        path.extend(key.split('/'));
        Ok(path)
    }

    /// Walk `dir` collecting every regular file as a key relative to `base`.
    /// Names that `get_object` would refuse are left out of the listing.
    fn collect_keys(base: &Path, dir: &Path, out: &mut Vec<String>) -> Result<(), StoreError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                Self::collect_keys(base, &path, out)?;
            } else if file_type.is_file() {
                let Ok(rel) = path.strip_prefix(base) else {
                    continue;
                };
                let Some(key) = rel
                    .components()
                    .map(|c| c.as_os_str().to_str())
                    .collect::<Option<Vec<_>>>()
                    .map(|parts| parts.join("/"))
                else {
                    warn!(path = %path.display(), "Skipping file with non-UTF-8 name");
                    continue;
                };
                if ensure_key_safe(&key).is_err() {
                    warn!(key = %key, "Skipping file whose name is not a servable key");
                    continue;
                }
                out.push(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn list_objects(
        &self,
        bucket: &str,
        continuation_token: Option<&str>,
    ) -> Result<ListPage, StoreError> {
        let dir = self.bucket_dir(bucket)?;
        let mut keys = Vec::new();
        Self::collect_keys(&dir, &dir, &mut keys)?;
        keys.sort();
        let page = paginate(keys, continuation_token, self.page_size);
        debug!(
            bucket = %bucket,
            keys = page.keys.len(),
            truncated = page.next_continuation_token.is_some(),
            "Listed page"
        );
        Ok(page)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // deleting a missing key is a no-op, as with S3
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub use memory::MemoryObjectStore;


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seeded_store(page_size: usize) -> (TempDir, FsObjectStore) {
        let tmp = TempDir::new().unwrap();
        let bucket = tmp.path().join("docs");
        fs::create_dir_all(bucket.join("2024/q1")).unwrap();
        fs::write(bucket.join("b.txt"), b"bee").unwrap();
        fs::write(bucket.join("a.txt"), b"ay").unwrap();
        fs::write(bucket.join("2024/q1/inv.pdf"), b"%PDF").unwrap();
        let store = FsObjectStore::new(tmp.path(), page_size);
        (tmp, store)
    }

    #[tokio::test]
    async fn test_lists_sorted_nested_keys() {
        let (_tmp, store) = seeded_store(100);
        let page = store.list_objects("docs", None).await.unwrap();
        assert_eq!(page.keys, vec!["2024/q1/inv.pdf", "a.txt", "b.txt"]);
        assert!(page.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_continuation_token_resumes_listing() {
        let (_tmp, store) = seeded_store(2);
        let first = store.list_objects("docs", None).await.unwrap();
        assert_eq!(first.keys, vec!["2024/q1/inv.pdf", "a.txt"]);
        let token = first.next_continuation_token.unwrap();

        let second = store.list_objects("docs", Some(&token)).await.unwrap();
        assert_eq!(second.keys, vec!["b.txt"]);
        assert!(second.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_exact_page_has_no_token() {
        let (_tmp, store) = seeded_store(3);
        let page = store.list_objects("docs", None).await.unwrap();
        assert_eq!(page.keys.len(), 3);
        assert!(page.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let (_tmp, store) = seeded_store(10);
        assert_eq!(store.get_object("docs", "a.txt").await.unwrap(), b"ay");

        store.delete_object("docs", "a.txt").await.unwrap();
        let err = store.get_object("docs", "a.txt").await.unwrap_err();
        assert!(matches!(err, StoreError::ObjectNotFound { .. }));

        // second delete is a no-op
        store.delete_object("docs", "a.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let (_tmp, store) = seeded_store(10);
        for key in ["../secret", "/etc/passwd", "a/../../b", "", "dir\\file"] {
            let err = store.get_object("docs", key).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidKey(_)), "{key:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_bucket() {
        let (_tmp, store) = seeded_store(10);
        let err = store.list_objects("nope", None).await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
        let err = store.list_objects("..", None).await.unwrap_err();
        assert!(matches!(err, StoreError::BucketNotFound(_)));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_unservable_names_are_not_listed() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let bucket = tmp.path().join("b");
        fs::create_dir(&bucket).unwrap();
        fs::write(bucket.join("a.pdf"), b"same").unwrap();
        fs::write(bucket.join("c.pdf"), b"same").unwrap();
        fs::write(bucket.join("scan\\1.pdf"), b"other").unwrap();
        fs::write(bucket.join("tab\tname.pdf"), b"other").unwrap();
        fs::write(bucket.join(OsStr::from_bytes(b"bad\xff.pdf")), b"other").unwrap();
        let store = FsObjectStore::new(tmp.path(), 10);

        let page = store.list_objects("b", None).await.unwrap();
        assert_eq!(page.keys, vec!["a.pdf", "c.pdf"]);

        let mut report = crate::dedup::find_duplicates(&store, "b").await.unwrap();
        crate::dedup::delete_duplicates(&store, "b", &mut report)
            .await
            .unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted, vec!["c.pdf"]);
        assert!(bucket.join("a.pdf").exists());
        assert!(!bucket.join("c.pdf").exists());
        assert!(bucket.join("scan\\1.pdf").exists());
    }

    #[tokio::test]
    async fn test_empty_bucket_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("empty")).unwrap();
        let store = FsObjectStore::new(tmp.path(), 10);
        let page = store.list_objects("empty", None).await.unwrap();
        assert!(page.keys.is_empty());
        assert!(page.next_continuation_token.is_none());
    }
}
