use thiserror::Error;

/// Raised while building a SigV4 signature, always before any network call.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    #[error("malformed url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid object key `{0}`")]
    InvalidKey(String),

    #[error("hmac rejected the signing key")]
    HmacKey,
}

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("filesystem error")]
    Io(#[from] std::io::Error),

    #[error("sql error")]
    Sql(#[from] rusqlite::Error),

    #[error("http transport error")]
    Http(#[from] reqwest::Error),

    #[error("object store answered {status}")]
    Status { status: u16 },

    #[error("could not sign request")]
    Signing(#[from] SigningError),

    #[error("blocking task failed")]
    Join(#[from] tokio::task::JoinError),

    #[error("connection lock poisoned")]
    Poisoned,
}
