// mongotool/src/restore/local_storage.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// The local mongod data directory a backup is restored into.
#[async_trait]
pub trait DataDirectory: Send + Sync {
    fn db_path(&self) -> &Path;

    /// Fails when the lock file shows a running or uncleanly stopped mongod.
    async fn ensure_lock_file_empty(&self) -> Result<()>;

    /// Removes everything inside the data directory.
    async fn cleanup(&self) -> Result<()>;
}

pub struct LocalStorage {
    db_path: PathBuf,
    lock_file: PathBuf,
}

impl LocalStorage {
    pub fn new(db_path: impl Into<PathBuf>, lock_file: impl Into<PathBuf>) -> Self {
        LocalStorage {
            db_path: db_path.into(),
            lock_file: lock_file.into(),
        }
    }
}

#[async_trait]
impl DataDirectory for LocalStorage {
    fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn ensure_lock_file_empty(&self) -> Result<()> {
        let metadata = match tokio::fs::metadata(&self.lock_file).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to inspect mongod lock file {}", self.lock_file.display())
                });
            }
        };

        if metadata.len() > 0 {
            anyhow::bail!(
                "mongod lock file {} is not empty: is mongod still running?",
                self.lock_file.display()
            );
        }
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        info!(db_path = %self.db_path.display(), "cleaning up mongod data directory");
        tokio::fs::create_dir_all(&self.db_path)
            .await
            .with_context(|| format!("Failed to create data directory {}", self.db_path.display()))?;

        let mut entries = tokio::fs::read_dir(&self.db_path)
            .await
            .with_context(|| format!("Failed to list data directory {}", self.db_path.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            let removed = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            removed.with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_or_empty_lock_file_is_accepted() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = LocalStorage::new(dir.path(), dir.path().join("mongod.lock"));
        storage.ensure_lock_file_empty().await?;

        std::fs::write(dir.path().join("mongod.lock"), b"")?;
        storage.ensure_lock_file_empty().await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_non_empty_lock_file_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("mongod.lock"), b"4242\n")?;
        let storage = LocalStorage::new(dir.path(), dir.path().join("mongod.lock"));

        let err = storage.ensure_lock_file_empty().await.unwrap_err();
        assert!(err.to_string().contains("is not empty"));
        Ok(())
    }

    #[tokio::test]
    async fn test_cleanup_removes_contents_but_keeps_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("db");
        std::fs::create_dir_all(db_path.join("journal"))?;
        std::fs::write(db_path.join("journal/WiredTigerLog.1"), b"log")?;
        std::fs::write(db_path.join("collection-0.wt"), b"data")?;

        let storage = LocalStorage::new(&db_path, db_path.join("mongod.lock"));
        storage.cleanup().await?;

        assert!(db_path.is_dir());
        assert_eq!(std::fs::read_dir(&db_path)?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_cleanup_creates_missing_directory() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let db_path = dir.path().join("fresh");
        let storage = LocalStorage::new(&db_path, db_path.join("mongod.lock"));
        storage.cleanup().await?;
        assert!(db_path.is_dir());
        Ok(())
    }
}
