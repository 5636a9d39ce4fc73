//! Filesystem store implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::{ContentStore, StoreError};
use crate::ident::shard_prefixes;

/// Payloads are always stored as JPEG; the downstream validator consumes
/// JPEG bytes and a fixed extension keeps the existence check a single
/// stat call.
const PAYLOAD_EXT: &str = "jpg";

/// Filesystem-backed content store with two-level hex shard layout:
/// `{root}/{id[0:2]}/{id[2:4]}/{id}.jpg`.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Create a store rooted at the given directory.
    ///
    /// The root itself is created lazily by the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute path for an id.
    fn abs_path(&self, id: &str) -> PathBuf {
        self.root.join(self.rel_path(id))
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentStore for FsStore {
    async fn exists(&self, id: &str) -> bool {
        fs::try_exists(self.abs_path(id)).await.unwrap_or(false)
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.abs_path(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write(&self, id: &str, bytes: &[u8]) -> Result<String, StoreError> {
        let path = self.abs_path(id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(self.rel_path(id))
    }

    fn rel_path(&self, id: &str) -> String {
        let (a, b) = shard_prefixes(id);
        format!("{}/{}/{}.{}", a, b, id, PAYLOAD_EXT)
    }
}
