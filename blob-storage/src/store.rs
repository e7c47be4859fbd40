use std::sync::Arc;
use async_trait::async_trait;
use crate::errors::BlobStoreError;
use crate::local_store::LocalFileBlobStore;
use crate::s3_store::S3BlobStore;
use crate::sql_store::SqlBlobStore;

pub type BlobResult<T> = Result<T, BlobStoreError>;

/// Trait for storing and fetching whole blobs by the caller's id.
///
/// "Not found" is a normal outcome: `get` answers `Ok(None)` and `delete`
/// answers `Ok(())`. Only I/O, transport and auth failures are errors.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the full payload, replacing any previous bytes for `id`.
    async fn save(&self, id: &str, data: &[u8]) -> BlobResult<()>;

    /// Retrieves the bytes for `id`, or `None` if nothing is stored.
    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>>;

    /// Removes the bytes for `id`. Succeeds if they were never there.
    async fn delete(&self, id: &str) -> BlobResult<()>;

    /// Tag recorded in metadata for blobs persisted by this backend.
    fn kind(&self) -> &'static str;
}


/// The backend chosen at start-up.
#[derive(Debug, Clone)]
pub enum BlobStores {
    Local(LocalFileBlobStore),
    Sql(SqlBlobStore),
    S3(S3BlobStore),
}

impl BlobStores {
    /// Returns a reference to the inner value as a trait object.
    pub fn as_trait(&self) -> &dyn BlobStore {
        match self {
            BlobStores::Local(a) => a,
            BlobStores::Sql(b) => b,
            BlobStores::S3(c) => c,
        }
    }

    /// Moves the selected backend behind a shareable, immutable handle.
    pub fn into_shared(self) -> Arc<dyn BlobStore> {
        match self {
            BlobStores::Local(a) => Arc::new(a),
            BlobStores::Sql(b) => Arc::new(b),
            BlobStores::S3(c) => Arc::new(c),
        }
    }
}
