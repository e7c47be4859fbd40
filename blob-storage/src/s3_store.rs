use async_trait::async_trait;
use percent_encoding::utf8_percent_encode;
use reqwest::{Client, Method, Response, StatusCode};
use crate::errors::{BlobStoreError, SigningError};
use crate::signer::{SigV4Signer, PATH};
use crate::store::{BlobResult, BlobStore};

/// Talks plain HTTP to an S3-compatible endpoint, no vendor SDK.
///
/// `bucket_url` carries the bucket path, e.g. `https://s3.amazonaws.com/my-bucket`
/// or `http://minio:9000/my-bucket`. Objects live at `<bucket_url>/<id>`.
#[derive(Clone, Debug)]
pub struct S3BlobStore {
    bucket_url: String,
    signer: SigV4Signer,
    client: Client,
}

impl S3BlobStore {
    pub fn new(bucket_url: impl Into<String>, signer: SigV4Signer) -> Self {
        Self::with_client(bucket_url, signer, Client::default())
    }

    pub fn with_client(bucket_url: impl Into<String>, signer: SigV4Signer, client: Client) -> Self {
        let bucket_url = bucket_url.into().trim_end_matches('/').to_string();
        Self { bucket_url, signer, client }
    }

    /// Builds the object URL, escaping the id so it cannot rewrite the path.
    pub fn object_url(&self, id: &str) -> Result<String, SigningError> {
        let bad_segment = id.split('/').any(|segment| matches!(segment, "" | "." | ".."));
        if bad_segment {
            return Err(SigningError::InvalidKey(id.to_string()));
        }
        Ok(format!("{}/{}", self.bucket_url, utf8_percent_encode(id, PATH)))
    }

    async fn send_signed(&self, method: Method, id: &str, payload: &[u8]) -> BlobResult<Response> {
        let url = self.object_url(id)?;
        let headers = self.signer.sign(method.as_str(), &url, payload)?;

        let mut request = self.client.request(method.clone(), &url);
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }
        if method == Method::PUT {
            request = request.body(payload.to_vec());
        }
        Ok(request.send().await?)
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn save(&self, id: &str, data: &[u8]) -> BlobResult<()> {
        let resp = self.send_signed(Method::PUT, id, data).await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(blob_id = id, status = status.as_u16(), "object store rejected upload");
            return Err(BlobStoreError::Status { status: status.as_u16() });
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>> {
        let resp = self.send_signed(Method::GET, id, b"").await?;
        match resp.status() {
            StatusCode::OK => Ok(Some(resp.bytes().await?.to_vec())),
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                tracing::warn!(blob_id = id, status = status.as_u16(), "object store fetch failed");
                Err(BlobStoreError::Status { status: status.as_u16() })
            }
        }
    }

    async fn delete(&self, id: &str) -> BlobResult<()> {
        let resp = self.send_signed(Method::DELETE, id, b"").await?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(BlobStoreError::Status { status: status.as_u16() })
    }

    fn kind(&self) -> &'static str {
        "s3"
    }
}
