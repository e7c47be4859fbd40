use clap::{Parser, ValueEnum};
use blob_store::{BlobStoreError, BlobStores, LocalFileBlobStore, S3BlobStore, SigV4Signer, SqlBlobStore};
use thiserror::Error;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Local,
    Db,
    S3,
}

#[derive(Debug, Error)]
pub enum ConfigErr {
    #[error("--s3-endpoint / S3_ENDPOINT is required for the s3 backend")]
    MissingS3Endpoint,

    #[error("could not open storage backend: {0}")]
    Storage(#[from] BlobStoreError),

    #[error("could not create storage directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(about = "Blob storage service with local, SQLite and S3-compatible backends")]
pub struct Args {
    #[clap(long, env = "HTTP_ADDR", default_value = "127.0.0.1:8080")]
    pub(crate) http_addr: String,

    #[clap(long, env = "STORAGE_BACKEND", value_enum, ignore_case = true, default_value = "local")]
    pub(crate) storage_backend: StorageBackend,

    #[clap(long, env = "LOCAL_STORAGE_DIR", default_value = "my_local_files")]
    pub(crate) local_storage_dir: String,

    /// SQLite file used for metadata and for the `db` backend.
    #[clap(long, env = "DATABASE_URL", default_value = "sqlite:///./drive.db")]
    pub(crate) database_url: String,

    /// Bucket base URL, e.g. `http://minio:9000/my-bucket`.
    #[clap(long, env = "S3_ENDPOINT", default_value = "")]
    pub(crate) s3_endpoint: String,

    #[clap(long, env = "S3_ACCESS_KEY", default_value = "")]
    pub(crate) s3_access_key: String,

    #[clap(long, env = "S3_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub(crate) s3_secret_key: String,

    #[clap(long, env = "S3_REGION", default_value = "us-east-1")]
    pub(crate) s3_region: String,

    #[clap(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub(crate) max_upload_bytes: usize,

    #[clap(long, env = "AUTH_TOKEN", default_value = "secret-token", hide_env_values = true)]
    pub(crate) auth_token: String,
}

impl Args {
    /// Filesystem path of the SQLite database, accepting `sqlite:///` style urls.
    pub fn database_path(&self) -> &str {
        let url = self.database_url.as_str();
        url.strip_prefix("sqlite:///")
            .or_else(|| url.strip_prefix("sqlite://"))
            .unwrap_or(url)
    }

    /// The one place the storage backend is chosen.
    pub fn blob_store(&self) -> Result<BlobStores, ConfigErr> {
        Ok(match self.storage_backend {
            StorageBackend::Local => BlobStores::Local(LocalFileBlobStore::new(&self.local_storage_dir)?),
            StorageBackend::Db => BlobStores::Sql(SqlBlobStore::open(self.database_path())?),
            StorageBackend::S3 => {
                if self.s3_endpoint.is_empty() {
                    return Err(ConfigErr::MissingS3Endpoint);
                }
                let signer = SigV4Signer::new(&self.s3_access_key, &self.s3_secret_key, &self.s3_region);
                BlobStores::S3(S3BlobStore::new(&self.s3_endpoint, signer))
            }
        })
    }
}
