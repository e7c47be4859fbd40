//! Create, read and delete blobs across two independently failing stores.
//!
//! A create is a small saga: the bytes are saved first, then the metadata
//! row is committed. If the commit fails the bytes are deleted again as a
//! best-effort compensation; the caller only ever sees
//! [`BlobServiceErr::MetadataCommitFailed`], whatever the cleanup did.

use std::sync::Arc;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use blob_store::{BlobStore, BlobStoreError, SigningError};
use chrono::Utc;
use dashmap::DashSet;
use crate::errors::{BlobServiceErr, MetadataError};
use crate::metadata::{BlobMetadata, MetadataStore};

/// A blob read back from both stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub metadata: BlobMetadata,
    pub data: Vec<u8>,
}

pub struct BlobService {
    store: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    max_upload_bytes: usize,
    /// Ids with a create currently running in this process.
    in_flight: DashSet<String>,
}

/// Releases an in-flight id when the create finishes, however it finishes.
struct InFlight<'a> {
    ids: &'a DashSet<String>,
    id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}

impl BlobService {
    pub fn new(store: Arc<dyn BlobStore>, metadata: Arc<dyn MetadataStore>, max_upload_bytes: usize) -> Self {
        Self {
            store,
            metadata,
            max_upload_bytes,
            in_flight: DashSet::new(),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.store.kind()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    fn claim(&self, id: &str) -> Option<InFlight<'_>> {
        self.in_flight.insert(id.to_string()).then(|| InFlight {
            ids: &self.in_flight,
            id: id.to_string(),
        })
    }

    pub async fn create_blob(&self, id: &str, encoded: &str) -> Result<BlobMetadata, BlobServiceErr> {
        let Some(_claim) = self.claim(id) else {
            tracing::info!(blob_id = id, "create already in flight");
            return Err(BlobServiceErr::DuplicateId(id.to_string()));
        };

        match self.metadata.exists(id).await {
            Ok(false) => {}
            Ok(true) => return Err(BlobServiceErr::DuplicateId(id.to_string())),
            Err(e) => {
                tracing::error!(blob_id = id, error = ?e, "metadata existence check failed");
                return Err(BlobServiceErr::MetadataLookupFailed);
            }
        }

        let data = decode_payload(encoded)?;
        if data.len() > self.max_upload_bytes {
            return Err(BlobServiceErr::PayloadTooLarge { max: self.max_upload_bytes });
        }

        match self.store.save(id, &data).await {
            Ok(()) => {}
            Err(BlobStoreError::Signing(SigningError::InvalidKey(_))) => {
                tracing::info!(blob_id = id, backend = self.backend(), "id rejected as storage key");
                return Err(BlobServiceErr::SigningInputInvalid(id.to_string()));
            }
            Err(e) => {
                tracing::error!(blob_id = id, backend = self.backend(), error = ?e, "backend save failed");
                return Err(BlobServiceErr::BackendSaveFailed);
            }
        }

        let metadata = BlobMetadata {
            id: id.to_string(),
            size: data.len() as u64,
            created_at: Utc::now(),
            storage_type: self.backend().to_string(),
        };
        match self.metadata.insert(&metadata).await {
            Ok(()) => {
                tracing::info!(blob_id = id, backend = self.backend(), size = metadata.size, "blob created");
                Ok(metadata)
            }
            Err(MetadataError::AlreadyExists(_)) => {
                // another process committed first; our save already replaced their bytes
                tracing::warn!(blob_id = id, "metadata insert lost a concurrent create");
                Err(BlobServiceErr::DuplicateId(id.to_string()))
            }
            Err(e) => {
                tracing::error!(blob_id = id, error = ?e, "metadata commit failed, removing saved bytes");
                self.compensate(id).await;
                Err(BlobServiceErr::MetadataCommitFailed)
            }
        }
    }

    /// Undoes a successful save. Failures are logged and swallowed.
    async fn compensate(&self, id: &str) {
        match self.store.delete(id).await {
            Ok(()) => tracing::info!(blob_id = id, backend = self.backend(), "rolled back saved bytes"),
            Err(e) => tracing::error!(blob_id = id, backend = self.backend(), error = ?e, "cleanup failed"),
        }
    }

    pub async fn read_blob(&self, id: &str) -> Result<StoredBlob, BlobServiceErr> {
        let metadata = match self.metadata.get(id).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return Err(BlobServiceErr::NotFound),
            Err(e) => {
                tracing::error!(blob_id = id, error = ?e, "metadata lookup failed");
                return Err(BlobServiceErr::MetadataLookupFailed);
            }
        };

        match self.store.get(id).await {
            Ok(Some(data)) => Ok(StoredBlob { metadata, data }),
            Ok(None) => {
                tracing::error!(blob_id = id, backend = self.backend(), "metadata present but bytes missing");
                Err(BlobServiceErr::DataMissing)
            }
            Err(e) => {
                tracing::error!(blob_id = id, backend = self.backend(), error = ?e, "backend fetch failed");
                Err(BlobServiceErr::BackendFetchFailed)
            }
        }
    }

    /// Removes the bytes, then the metadata. If the bytes cannot be removed
    /// the metadata is kept so the delete can be retried.
    pub async fn delete_blob(&self, id: &str) -> Result<(), BlobServiceErr> {
        match self.metadata.exists(id).await {
            Ok(true) => {}
            Ok(false) => return Err(BlobServiceErr::NotFound),
            Err(e) => {
                tracing::error!(blob_id = id, error = ?e, "metadata existence check failed");
                return Err(BlobServiceErr::MetadataLookupFailed);
            }
        }

        if let Err(e) = self.store.delete(id).await {
            tracing::error!(blob_id = id, backend = self.backend(), error = ?e, "backend delete failed");
            return Err(BlobServiceErr::BackendDeleteFailed);
        }

        match self.metadata.delete(id).await {
            Ok(_) => {
                tracing::info!(blob_id = id, "blob deleted");
                Ok(())
            }
            Err(e) => {
                tracing::error!(blob_id = id, error = ?e, "metadata delete failed after bytes were removed");
                Err(BlobServiceErr::MetadataCommitFailed)
            }
        }
    }
}

/// Strict standard base64: canonical padding, no whitespace, no url-safe alphabet.
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>, BlobServiceErr> {
    STANDARD.decode(encoded).map_err(|_| BlobServiceErr::InvalidEncoding)
}
