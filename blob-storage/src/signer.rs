//! AWS Signature Version 4 for S3-compatible endpoints.
//!
//! Only the three headers S3 strictly requires are signed: `host`,
//! `x-amz-content-sha256` and `x-amz-date`. The payload hash is always
//! computed over the full body (no `UNSIGNED-PAYLOAD`, no chunked signing)
//! and the caller's clock is trusted as-is.
//!
//! ```
//! use blob_store::SigV4Signer;
//!
//! let signer = SigV4Signer::new("access", "secret", "us-east-1");
//! let headers = signer
//!     .sign("PUT", "http://localhost:9000/bucket/key", b"payload")
//!     .unwrap();
//! assert!(headers.authorization.starts_with("AWS4-HMAC-SHA256 Credential=access/"));
//! ```

use std::fmt;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use percent_encoding::{percent_decode_str, percent_encode, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};
use url::Url;
use crate::errors::SigningError;

const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const SERVICE: &str = "s3";
const SIGNED_HEADERS: &str = "host;x-amz-content-sha256;x-amz-date";

/// RFC 3986 unreserved characters stay as they are, everything else is escaped.
const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`UNRESERVED`] but keeps path separators.
pub(crate) const PATH: &AsciiSet = &UNRESERVED.remove(b'/');

type HmacSha256 = Hmac<Sha256>;

/// Headers to attach to a signed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeaders {
    pub host: String,
    pub amz_date: String,
    pub content_sha256: String,
    pub authorization: String,
}

impl SignedHeaders {
    /// Header name/value pairs in the order they were signed, `Authorization` last.
    pub fn pairs(&self) -> [(&'static str, &str); 4] {
        [
            ("Host", self.host.as_str()),
            ("x-amz-content-sha256", self.content_sha256.as_str()),
            ("x-amz-date", self.amz_date.as_str()),
            ("Authorization", self.authorization.as_str()),
        ]
    }
}

/// Credentials and region used to sign every request of one S3 backend.
#[derive(Clone)]
pub struct SigV4Signer {
    access_key: String,
    secret_key: String,
    region: String,
}

impl fmt::Debug for SigV4Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigV4Signer")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .finish()
    }
}

impl SigV4Signer {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: region.into(),
        }
    }

    /// Signs a request stamped with the current UTC time.
    pub fn sign(&self, method: &str, url: &str, payload: &[u8]) -> Result<SignedHeaders, SigningError> {
        self.sign_at(method, url, payload, Utc::now())
    }

    /// Signs a request as if issued at `now`.
    pub fn sign_at(
        &self,
        method: &str,
        url: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Result<SignedHeaders, SigningError> {
        let url = parse_url(url)?;
        let host = host_header(&url)?;

        // captured once so headers and scope can never disagree
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = now.format("%Y%m%d").to_string();

        let payload_hash = hex_sha256(payload);
        let canonical_request = canonical_request(method, &url, &host, &payload_hash, &amz_date);

        let credential_scope = format!("{}/{}/{}/aws4_request", date_stamp, self.region, SERVICE);
        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            ALGORITHM,
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(&self.secret_key, &date_stamp, &self.region, SERVICE)?;
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes())?);

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM, self.access_key, credential_scope, SIGNED_HEADERS, signature
        );

        Ok(SignedHeaders {
            host,
            amz_date,
            content_sha256: payload_hash,
            authorization,
        })
    }
}

fn parse_url(raw: &str) -> Result<Url, SigningError> {
    let invalid = |reason: String| SigningError::InvalidUrl { url: raw.to_string(), reason };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme `{other}`"))),
    }
}

fn host_header(url: &Url) -> Result<String, SigningError> {
    let host = url.host_str().ok_or_else(|| SigningError::InvalidUrl {
        url: url.to_string(),
        reason: "missing host".to_string(),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

fn canonical_request(method: &str, url: &Url, host: &str, payload_hash: &str, amz_date: &str) -> String {
    let canonical_headers = format!(
        "host:{}\nx-amz-content-sha256:{}\nx-amz-date:{}\n",
        host, payload_hash, amz_date
    );
    let canonical_uri = canonical_uri(url);
    let canonical_query = canonical_query(url);
    let parts: [&str; 6] = [
        method,
        &canonical_uri,
        &canonical_query,
        &canonical_headers,
        SIGNED_HEADERS,
        payload_hash,
    ];
    parts.join("\n")
}

/// The path as raw bytes, escaped exactly once.
fn canonical_uri(url: &Url) -> String {
    let path = match url.path() {
        "" => "/",
        path => path,
    };
    let raw: Vec<u8> = percent_decode_str(path).collect();
    percent_encode(&raw, PATH).to_string()
}

fn canonical_query(url: &Url) -> String {
    if url.query().map_or(true, str::is_empty) {
        return String::new();
    }
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    params
        .iter()
        .map(|(k, v)| format!("{}={}", utf8_percent_encode(k, UNRESERVED), utf8_percent_encode(v, UNRESERVED)))
        .collect::<Vec<_>>()
        .join("&")
}

/// kSigning = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
pub(crate) fn derive_signing_key(
    secret_key: &str,
    date_stamp: &str,
    region: &str,
    service: &str,
) -> Result<Vec<u8>, SigningError> {
    let k_date = hmac_sha256(format!("AWS4{}", secret_key).as_bytes(), date_stamp.as_bytes())?;
    let k_region = hmac_sha256(&k_date, region.as_bytes())?;
    let k_service = hmac_sha256(&k_region, service.as_bytes())?;
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SigningError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SigningError::HmacKey)?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

pub(crate) fn hex_sha256(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}
