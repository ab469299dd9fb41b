use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{validate_key, ObjectStore, StorageError, StoreFuture, StoredObject};

/// Bucket = directory `<root>/<bucket>`; object = file at `<bucket>/<key>`.
#[derive(Debug)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
    bucket_ready: OnceCell<()>,
}

impl FsObjectStore {
    /// # Errors
    /// Returns `InvalidKey` when the bucket name is not a single path segment.
    pub fn new(root: impl Into<PathBuf>, bucket: &str) -> Result<Self, StorageError> {
        validate_key(bucket)?;
        if bucket.contains('/') {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        Ok(Self {
            root: root.into(),
            bucket: bucket.to_string(),
            bucket_ready: OnceCell::new(),
        })
    }

    fn bucket_dir(&self) -> PathBuf {
        self.root.join(&self.bucket)
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.bucket_dir(), |path, segment| path.join(segment)))
    }

    async fn create_bucket_dir(&self) -> Result<(), StorageError> {
        self.bucket_ready
            .get_or_try_init(|| async {
                let dir = self.bucket_dir();
                tokio::fs::create_dir_all(&dir)
                    .await
                    .map_err(|source| StorageError::Io {
                        key: self.bucket.clone(),
                        source,
                    })?;
                info!(bucket = %self.bucket, path = %dir.display(), "Object bucket ready");
                Ok::<(), StorageError>(())
            })
            .await?;
        Ok(())
    }
}

async fn write_object(path: &Path, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
    let io_err = |source| StorageError::Io {
        key: key.to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(io_err)
}

impl ObjectStore for FsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn ensure_bucket(&self) -> StoreFuture<'_, ()> {
        Box::pin(self.create_bucket_dir())
    }

    fn bucket_exists(&self) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            match tokio::fs::metadata(self.bucket_dir()).await {
                Ok(meta) => Ok(meta.is_dir()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(source) => Err(StorageError::Io {
                    key: self.bucket.clone(),
                    source,
                }),
            }
        })
    }

    fn put<'a>(
        &'a self,
        key: &'a str,
        bytes: Vec<u8>,
        content_type: &'a str,
    ) -> StoreFuture<'a, StoredObject> {
        Box::pin(async move {
            let path = self.object_path(key)?;
            self.create_bucket_dir().await?;
            write_object(&path, key, &bytes).await?;
            let stored = StoredObject::describe(key, &bytes);
            debug!(
                bucket = %self.bucket,
                key,
                content_type,
                bytes = stored.byte_length,
                "Stored object"
            );
            Ok(stored)
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let path = self.object_path(key)?;
            tokio::fs::read(&path).await.map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    StorageError::MissingObject(key.to_string())
                } else {
                    StorageError::Io {
                        key: key.to_string(),
                        source,
                    }
                }
            })
        })
    }
}
