use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use crate::errors::{MetadataError, MetadataResult};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS blobs_metadata (
    id TEXT PRIMARY KEY,
    size INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    storage_type TEXT NOT NULL
);";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlobMetadata {
    pub id: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// Tag of the backend that holds the bytes.
    pub storage_type: String,
}

/// Where blob metadata lives, independent of the bytes themselves.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn exists(&self, id: &str) -> MetadataResult<bool>;

    /// Inserts and commits one row. Fails with [`MetadataError::AlreadyExists`]
    /// when the id is taken.
    async fn insert(&self, metadata: &BlobMetadata) -> MetadataResult<()>;

    async fn get(&self, id: &str) -> MetadataResult<Option<BlobMetadata>>;

    /// Returns whether a row was removed.
    async fn delete(&self, id: &str) -> MetadataResult<bool>;
}

#[derive(Clone, Debug)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    pub fn open(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> MetadataResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> MetadataResult<Self> {
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    async fn run<T, F>(&self, f: F) -> MetadataResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> MetadataResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| MetadataError::Poisoned)?;
            f(&mut guard)
        })
        .await?
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn exists(&self, id: &str) -> MetadataResult<bool> {
        let id = id.to_owned();
        self.run(move |conn| {
            let found = conn
                .prepare_cached("SELECT 1 FROM blobs_metadata WHERE id = ?1")?
                .exists([id])?;
            Ok(found)
        })
        .await
    }

    async fn insert(&self, metadata: &BlobMetadata) -> MetadataResult<()> {
        let metadata = metadata.clone();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO blobs_metadata (id, size, created_at, storage_type) VALUES (?1, ?2, ?3, ?4)",
                params![metadata.id, metadata.size, metadata.created_at, metadata.storage_type],
            );
            match inserted {
                Ok(_) => {}
                Err(e) if is_unique_violation(&e) => return Err(MetadataError::AlreadyExists(metadata.id)),
                Err(e) => return Err(e.into()),
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> MetadataResult<Option<BlobMetadata>> {
        let id = id.to_owned();
        self.run(move |conn| {
            let row = conn
                .prepare_cached("SELECT id, size, created_at, storage_type FROM blobs_metadata WHERE id = ?1")?
                .query_row([id], |row| {
                    Ok(BlobMetadata {
                        id: row.get(0)?,
                        size: row.get(1)?,
                        created_at: row.get(2)?,
                        storage_type: row.get(3)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn delete(&self, id: &str) -> MetadataResult<bool> {
        let id = id.to_owned();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute("DELETE FROM blobs_metadata WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(removed > 0)
        })
        .await
    }
}
