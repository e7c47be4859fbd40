use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::error::Error as SerdeError;
use thiserror::Error;

pub type MetadataResult<T> = Result<T, MetadataError>;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("metadata for `{0}` already exists")]
    AlreadyExists(String),

    #[error("metadata sql error")]
    Sql(#[from] rusqlite::Error),

    #[error("metadata task failed")]
    Join(#[from] tokio::task::JoinError),

    #[error("metadata connection lock poisoned")]
    Poisoned,
}

/// Everything a blob request can fail with. Internal causes are logged where
/// they happen and never rendered into the response body.
#[derive(Debug, Error)]
pub enum BlobServiceErr {
    #[error("ID `{0}` already exists")]
    DuplicateId(String),

    #[error("Invalid Base64 data")]
    InvalidEncoding,

    #[error("Payload too large (max {max} bytes)")]
    PayloadTooLarge { max: usize },

    #[error("ID `{0}` cannot be used as a storage key")]
    SigningInputInvalid(String),

    #[error("Failed to save data")]
    BackendSaveFailed,

    #[error("Failed to persist metadata; uploaded data cleaned up when possible")]
    MetadataCommitFailed,

    #[error("Failed to fetch data from storage backend")]
    BackendFetchFailed,

    #[error("Failed to delete data from storage backend")]
    BackendDeleteFailed,

    #[error("Failed to read blob metadata")]
    MetadataLookupFailed,

    #[error("Blob not found")]
    NotFound,

    #[error("Data missing from storage backend")]
    DataMissing,

    #[error("{0}")]
    Unauthorized(&'static str),

    #[error("Failed to parse JSON")]
    Json(#[from] SerdeError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl ResponseError for BlobServiceErr {
    fn status_code(&self) -> StatusCode {
        match self {
            BlobServiceErr::DuplicateId(_)
            | BlobServiceErr::InvalidEncoding
            | BlobServiceErr::SigningInputInvalid(_)
            | BlobServiceErr::Json(_)
            | BlobServiceErr::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            BlobServiceErr::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            BlobServiceErr::NotFound | BlobServiceErr::DataMissing => StatusCode::NOT_FOUND,
            BlobServiceErr::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BlobServiceErr::BackendFetchFailed => StatusCode::BAD_GATEWAY,
            BlobServiceErr::BackendSaveFailed
            | BlobServiceErr::MetadataCommitFailed
            | BlobServiceErr::BackendDeleteFailed
            | BlobServiceErr::MetadataLookupFailed => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody { detail: self.to_string() })
    }
}
