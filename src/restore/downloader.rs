// mongotool/src/restore/downloader.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::io::SyncIoBridge;
use tracing::{debug, info};

use super::sentinel::archives_prefix;
use super::storage::BackupStorage;

#[async_trait]
pub trait ArchiveDownloader: Send + Sync {
    /// Fetches every archive member of `backup_name` and unpacks it into `target_dir`.
    async fn download(&self, backup_name: &str, target_dir: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveFormat {
    Tar,
    TarGz,
}

fn archive_format(key: &str) -> Option<ArchiveFormat> {
    if key.ends_with(".tar") {
        Some(ArchiveFormat::Tar)
    } else if key.ends_with(".tar.gz") || key.ends_with(".tgz") {
        Some(ArchiveFormat::TarGz)
    } else {
        None
    }
}

/// Downloads archive members with a bounded number of transfers in flight.
pub struct ConcurrentDownloader {
    storage: Arc<dyn BackupStorage>,
    concurrency: usize,
}

impl ConcurrentDownloader {
    pub fn new(storage: Arc<dyn BackupStorage>, concurrency: usize) -> Self {
        ConcurrentDownloader {
            storage,
            concurrency: concurrency.max(1),
        }
    }
}

#[async_trait]
impl ArchiveDownloader for ConcurrentDownloader {
    async fn download(&self, backup_name: &str, target_dir: &Path) -> Result<()> {
        let prefix = archives_prefix(backup_name);
        let mut members = Vec::new();
        for key in self.storage.list_objects(&prefix).await? {
            let format = archive_format(&key)
                .with_context(|| format!("Unsupported archive member {} in backup {}", key, backup_name))?;
            members.push((key, format));
        }
        if members.is_empty() {
            anyhow::bail!("Backup {} has no archive members under {}", backup_name, prefix);
        }

        info!(backup_name, members = members.len(), concurrency = self.concurrency, "downloading archives");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut transfers = JoinSet::new();
        for (key, format) in members {
            let storage = Arc::clone(&self.storage);
            let semaphore = Arc::clone(&semaphore);
            let target_dir = target_dir.to_path_buf();
            transfers.spawn(async move {
                let _permit = semaphore.acquire_owned().await.context("Download semaphore closed")?;
                fetch_and_unpack(storage.as_ref(), key, format, target_dir).await
            });
        }

        while let Some(joined) = transfers.join_next().await {
            let outcome = joined.context("Download task panicked").and_then(|r| r);
            if let Err(e) = outcome {
                transfers.abort_all();
                return Err(e);
            }
        }

        info!(backup_name, target_dir = %target_dir.display(), "all archives unpacked");
        Ok(())
    }
}

async fn fetch_and_unpack(
    storage: &dyn BackupStorage,
    key: String,
    format: ArchiveFormat,
    target_dir: PathBuf,
) -> Result<()> {
    let stream = storage.open_object(&key).await?;
    debug!(key = %key, ?format, "unpacking archive member while downloading");
    let bridge = SyncIoBridge::new(stream);

    tokio::task::spawn_blocking(move || {
        let reader: Box<dyn Read> = match format {
            ArchiveFormat::Tar => Box::new(bridge),
            ArchiveFormat::TarGz => Box::new(GzDecoder::new(bridge)),
        };
        Archive::new(reader)
            .unpack(&target_dir)
            .with_context(|| format!("Failed to unpack {} into {}", key, target_dir.display()))
    })
    .await
    .context("Unpack task panicked")?
}
