use crate::error::DocStoreError;
use async_trait::async_trait;
use rusqlite::{Connection, params};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Schemaless insert-only store, one collection per invoice feed.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert one JSON object into `collection`, returning its row id.
    async fn insert_one(&self, collection: &str, doc: &Map<String, Value>) -> Result<i64, DocStoreError>;
}

/// Documents kept as JSON text in SQLite, one table per collection.
pub struct SqliteDocumentStore {
    conn: Mutex<Connection>,
}

/// Collection names become table names, so keep them to plain identifiers.
fn ensure_collection_name(name: &str) -> Result<(), DocStoreError> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DocStoreError::InvalidCollection(name.to_string()))
    }
}

impl SqliteDocumentStore {
    /// Open `<uri>/<database>.db`, creating the directory if needed.
    pub fn open(uri: &str, database: &str) -> Result<Self, DocStoreError> {
        let dir = PathBuf::from(uri.strip_prefix("sqlite://").unwrap_or(uri));
        std::fs::create_dir_all(&dir)?;
        Self::open_file(dir.join(format!("{database}.db")))
    }

    pub fn open_file<P: AsRef<Path>>(db_path: P) -> Result<Self, DocStoreError> {
        let conn = Connection::open(db_path)?;
        info!("Document store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DocStoreError> {
        self.conn.lock().map_err(|_| DocStoreError::Poisoned)
    }

    fn ensure_collection(conn: &Connection, collection: &str) -> Result<(), DocStoreError> {
        ensure_collection_name(collection)?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS \"{collection}\" (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    body TEXT NOT NULL,
                    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
                )"
            ),
            [],
        )?;
        Ok(())
    }

    /// Validate `collection` and create its table up front, so a bad name
    /// fails before any work is spent on a document for it.
    pub fn prepare_collection(&self, collection: &str) -> Result<(), DocStoreError> {
        let conn = self.conn()?;
        Self::ensure_collection(&conn, collection)
    }

    /// Number of documents in `collection`; zero if it was never written.
    pub fn count(&self, collection: &str) -> Result<usize, DocStoreError> {
        let conn = self.conn()?;
        Self::ensure_collection(&conn, collection)?;
        let n: usize = conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{collection}\""),
            [],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Most recent documents first, at most `limit`.
    pub fn find_all(&self, collection: &str, limit: usize) -> Result<Vec<(i64, Value)>, DocStoreError> {
        let conn = self.conn()?;
        Self::ensure_collection(&conn, collection)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT id, body FROM \"{collection}\" ORDER BY id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, body) = row?;
            docs.push((id, serde_json::from_str(&body)?));
        }
        Ok(docs)
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn insert_one(&self, collection: &str, doc: &Map<String, Value>) -> Result<i64, DocStoreError> {
        let body = serde_json::to_string(doc)?;
        let conn = self.conn()?;
        Self::ensure_collection(&conn, collection)?;
        conn.execute(
            &format!("INSERT INTO \"{collection}\" (body) VALUES (?1)"),
            params![body],
        )?;
        let id = conn.last_insert_rowid();
        info!(collection = %collection, id, "Document inserted");
        Ok(id)
    }
}

#[cfg(test)]
pub use recording::RecordingDocumentStore;
