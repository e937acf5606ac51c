//! Filesystem-backed blob store rooted at a prefix directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{prefixed, BlobStore};

pub struct FsBlobStore {
    root: PathBuf,
    prefix: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            prefix: prefix.into(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are pipeline-generated; reject anything that escapes the root.
        if key.split('/').any(|part| part == "..") || key.starts_with('/') {
            anyhow::bail!("invalid blob key: {key}");
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read blob {key}"))
    }

    async fn put(&self, key: &str, bytes: &[u8], _content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create blob directory for {key}"))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write blob {key}"))?;
        Ok(prefixed(&self.prefix, key))
    }
}

impl FsBlobStore {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "");

        let full = store
            .put("reports/m1/report.json", b"{}", "application/json")
            .await
            .unwrap();
        assert_eq!(full, "reports/m1/report.json");

        let bytes = store.get("reports/m1/report.json").await.unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[tokio::test]
    async fn test_put_returns_prefixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "prod");
        let full = store.put("inbox/m1/x.mp4", b"abc", "video/mp4").await.unwrap();
        assert_eq!(full, "prod/inbox/m1/x.mp4");
    }

    #[tokio::test]
    async fn test_missing_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "");
        assert!(store.get("nope/missing.json").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path(), "");
        assert!(store.get("../etc/passwd").await.is_err());
        assert!(store.put("/abs/path", b"", "").await.is_err());
    }
}
