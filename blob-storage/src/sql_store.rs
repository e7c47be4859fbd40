use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use crate::errors::BlobStoreError;
use crate::store::{BlobResult, BlobStore};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS blobs_data (
    id TEXT PRIMARY KEY,
    data BLOB NOT NULL
);";

/// Keeps blob bytes in a dedicated `blobs_data` table. Every call runs in
/// its own transaction, independent of whatever the metadata store does.
#[derive(Clone, Debug)]
pub struct SqlBlobStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlBlobStore {
    /// Opens (or creates) the SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> BlobResult<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> BlobResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> BlobResult<Self> {
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> BlobResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| BlobStoreError::Poisoned)?;
            f(&mut guard).map_err(BlobStoreError::from)
        })
        .await?
    }
}

#[async_trait]
impl BlobStore for SqlBlobStore {
    async fn save(&self, id: &str, data: &[u8]) -> BlobResult<()> {
        let id = id.to_owned();
        let data = data.to_vec();
        self.run(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO blobs_data (id, data) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data",
                params![id, data],
            )?;
            tx.commit()
        })
        .await
    }

    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>> {
        let id = id.to_owned();
        self.run(move |conn| {
            conn.prepare_cached("SELECT data FROM blobs_data WHERE id = ?1")?
                .query_row([id], |row| row.get::<_, Vec<u8>>(0))
                .optional()
        })
        .await
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        let id = id.to_owned();
        let removed = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                let removed = tx.execute("DELETE FROM blobs_data WHERE id = ?1", [id])?;
                tx.commit()?;
                Ok(removed)
            })
            .await?;
        tracing::debug!(removed, "deleted blob rows");
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "db"
    }
}
