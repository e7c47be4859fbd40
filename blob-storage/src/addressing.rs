use sha2::{Digest, Sha256};

/// Maps an untrusted blob id to a fixed-length, filesystem-safe name:
/// the lower-case hex SHA-256 of its UTF-8 bytes.
pub fn name_for(id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(id.as_bytes());
    hex::encode(hasher.finalize())
}
