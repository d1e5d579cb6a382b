//! File Storage
//!
//! Stores uploaded bytes under a root directory. Paths handed out and
//! accepted are relative to that root (e.g. `pdfs/pdfFile-...pdf`).

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::error::{Result, VaultError};

/// Byte storage trait
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store bytes in `folder`, returning the relative path
    async fn store(&self, folder: &str, extension: &str, bytes: &[u8]) -> Result<String>;

    /// Read bytes at a relative path
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete bytes at a relative path; missing files are not an error
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Local disk storage
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path, refusing anything that escapes the root
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        let safe = !relative.is_empty()
            && path.components().all(|c| matches!(c, Component::Normal(_)));

        if !safe {
            return Err(VaultError::InvalidRequest(format!("invalid storage path: {relative}")));
        }
        Ok(self.root.join(path))
    }
}

/// Generate a unique file name, e.g. `pdfFile-1718000000000-3f2a9c1b0d.pdf`
fn unique_name(extension: &str) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    let extension = extension.trim_start_matches('.');
    format!("pdfFile-{}-{}.{extension}", Utc::now().timestamp_millis(), &suffix[..10])
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn store(&self, folder: &str, extension: &str, bytes: &[u8]) -> Result<String> {
        let relative = format!("{folder}/{}", unique_name(extension));
        let target = self.resolve(&relative)?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        tracing::debug!(path = %relative, bytes = bytes.len(), "Stored file");
        Ok(relative)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VaultError::NotFound("File".into()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        let path = store.store("pdfs", ".pdf", b"%PDF-1.4").await.unwrap();
        assert!(path.starts_with("pdfs/pdfFile-"));
        assert!(path.ends_with(".pdf"));
        assert_eq!(store.read(&path).await.unwrap(), b"%PDF-1.4");

        store.delete(&path).await.unwrap();
        assert!(matches!(store.read(&path).await, Err(VaultError::NotFound(_))));

        // Deleting twice is fine
        store.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFileStore::new(dir.path());

        assert!(store.read("../etc/passwd").await.is_err());
        assert!(store.read("/etc/passwd").await.is_err());
        assert!(store.delete("").await.is_err());
    }
}
