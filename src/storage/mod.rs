//! Key-addressed blob storage for node outputs and uploaded artifacts.
//!
//! Keys are relative, slash-separated paths (`nodes/7/<uuid>.txt`). The bucket is created
//! lazily on first write and creating it again is a no-op.

mod fs_store;

use std::future::Future;
use std::pin::Pin;

use sha2::{Digest, Sha256};
use thiserror::Error;

pub use fs_store::FsObjectStore;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StorageError>> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("object '{0}' not found")]
    MissingObject(String),

    #[error("object '{0}' is not valid UTF-8 text")]
    NotText(String),

    #[error("storage I/O failed for '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
}

/// What a successful put wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub byte_length: u64,
    pub content_hash: String,
}

impl StoredObject {
    #[must_use]
    pub fn describe(key: &str, bytes: &[u8]) -> Self {
        Self {
            key: key.to_string(),
            byte_length: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            content_hash: sha256_hex(bytes),
        }
    }
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Rejects keys that could escape the bucket.
///
/// # Errors
/// Returns `InvalidKey` for empty, absolute, backslashed or `..`-containing keys.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = key.trim().is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");
    if invalid {
        Err(StorageError::InvalidKey(key.to_string()))
    } else {
        Ok(())
    }
}

pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Creates the bucket if it does not exist. Safe to call any number of times.
    fn ensure_bucket(&self) -> StoreFuture<'_, ()>;

    fn bucket_exists(&self) -> StoreFuture<'_, bool>;

    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
    ) -> StoreFuture<'a, StoredObject>;

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>>;

    fn put_text<'a>(&'a self, key: &'a str, text: &'a str) -> StoreFuture<'a, StoredObject> {
        self.put(key, text.as_bytes().to_vec(), "text/plain")
    }

    fn get_text<'a>(&'a self, key: &'a str) -> StoreFuture<'a, String> {
        Box::pin(async move {
            let bytes = self.get(key).await?;
            String::from_utf8(bytes).map_err(|_| StorageError::NotText(key.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{sha256_hex, validate_key, StoredObject};

    #[test]
    fn given_escaping_keys_when_validating_then_rejected() {
        for key in ["", "/etc/passwd", "a/../b", "..", "a\\b", "a//b", "./a"] {
            assert!(validate_key(key).is_err(), "{key:?} should be rejected");
        }
        assert!(validate_key("nodes/7/out.txt").is_ok());
        assert!(validate_key("artifacts/report.v2.pdf").is_ok());
    }

    #[test]
    fn stored_object_reports_length_and_hash() {
        let described = StoredObject::describe("k", b"abc");
        assert_eq!(described.byte_length, 3);
        assert_eq!(
            described.content_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
