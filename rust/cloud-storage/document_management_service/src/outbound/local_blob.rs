//! Blob storage on the local filesystem

use std::path::{Component, Path, PathBuf};

use anyhow::Context;

use crate::domain::ports::BlobStorage;

/// Stores every blob as a file under `root`, at the path given by its key
#[derive(Debug, Clone)]
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Keys are `/` separated relative paths. Anything that could escape the root is refused.
    fn path_for(&self, key: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(key);
        anyhow::ensure!(
            !key.is_empty()
                && relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_))),
            "invalid blob key {key}"
        );
        Ok(self.root.join(relative))
    }
}

impl BlobStorage for LocalBlobStorage {
    #[tracing::instrument(err, skip(self, bytes), fields(size=bytes.len()))]
    async fn put(&self, key: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("unable to create {}", parent.display()))?;
        }

        // write next to the target and rename so readers never see a partial file
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, bytes)
            .await
            .with_context(|| format!("unable to write {}", partial.display()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .with_context(|| format!("unable to move blob into {}", path.display()))?;
        Ok(())
    }

    #[tracing::instrument(err, skip(self))]
    async fn get(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("unable to read {}", path.display()))
    }

    #[tracing::instrument(err, skip(self))]
    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("unable to delete {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_reads_and_deletes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = LocalBlobStorage::new(dir.path());

        storage.put("org/doc", b"hello").await?;
        assert_eq!(storage.get("org/doc").await?, b"hello");
        assert!(dir.path().join("org").join("doc").exists());

        storage.delete("org/doc").await?;
        assert!(storage.get("org/doc").await.is_err());
        // deleting twice is fine
        storage.delete("org/doc").await?;
        Ok(())
    }

    #[tokio::test]
    async fn refuses_keys_outside_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalBlobStorage::new(dir.path());

        assert!(storage.put("../escape", b"x").await.is_err());
        assert!(storage.put("/etc/passwd", b"x").await.is_err());
        assert!(storage.get("").await.is_err());
    }
}
