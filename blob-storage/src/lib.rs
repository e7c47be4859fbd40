//! Blob persistence behind a single [`BlobStore`] trait.
//!
//! Three interchangeable backends are provided: a local directory
//! ([`LocalFileBlobStore`]), a SQLite table ([`SqlBlobStore`]) and an
//! S3-compatible HTTP endpoint ([`S3BlobStore`]) signed with AWS SigV4
//! ([`signer`]). Pick one at start-up through [`BlobStores`].

pub mod addressing;
pub mod errors;
pub mod local_store;
pub mod s3_store;
pub mod signer;
pub mod sql_store;
pub mod store;

pub use addressing::name_for;
pub use errors::{BlobStoreError, SigningError};
pub use local_store::LocalFileBlobStore;
pub use s3_store::S3BlobStore;
pub use signer::{SignedHeaders, SigV4Signer};
pub use sql_store::SqlBlobStore;
pub use store::{BlobResult, BlobStore, BlobStores};
