// mongotool/src/restore/storage.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::AsyncRead;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::SpacesConfig;

/// Byte stream of one stored object.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Read-only view of the place backups live in. Keys are `/`-separated and
/// relative to the storage root.
#[async_trait]
pub trait BackupStorage: Send + Sync {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>>;

    /// Reads a small object whole, e.g. a sentinel.
    async fn read_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Opens an object for streaming, e.g. an archive member.
    async fn open_object(&self, key: &str) -> Result<ObjectReader>;
}

/// Backups kept in an S3-compatible object store (DigitalOcean Spaces, MinIO, AWS).
pub struct S3Storage {
    client: s3::Client,
    bucket: String,
    prefix: String,
}

impl S3Storage {
    pub async fn connect(spaces_config: &SpacesConfig, bucket: &str, prefix: &str) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&spaces_config.endpoint_url)
            .region(Region::new(spaces_config.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &spaces_config.access_key_id,
                &spaces_config.secret_access_key,
                None, // session_token
                None, // expiry
                "Static",
            ))
            .load()
            .await;

        S3Storage {
            client: s3::Client::new(&sdk_config),
            bucket: bucket.to_string(),
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }
}

#[async_trait]
impl BackupStorage for S3Storage {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let full_prefix = self.full_key(prefix);
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&full_prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .with_context(|| format!("Failed to list objects under s3://{}/{}", self.bucket, full_prefix))?;

            for object in page.contents() {
                if let Some(key) = object.key() {
                    let relative = match self.prefix.is_empty() {
                        true => key,
                        false => key.strip_prefix(&self.prefix).unwrap_or(key).trim_start_matches('/'),
                    };
                    keys.push(relative.to_string());
                }
            }

            match (page.is_truncated(), page.next_continuation_token()) {
                (Some(true), Some(token)) => continuation_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(bucket = %self.bucket, prefix = %full_prefix, count = keys.len(), "listed backup objects");
        Ok(keys)
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        let full_key = self.full_key(key);
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .with_context(|| format!("Failed to get object s3://{}/{}", self.bucket, full_key))?;

        let data = object
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of s3://{}/{}", self.bucket, full_key))?;
        Ok(data.into_bytes().to_vec())
    }

    async fn open_object(&self, key: &str) -> Result<ObjectReader> {
        let full_key = self.full_key(key);
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&full_key)
            .send()
            .await
            .with_context(|| format!("Failed to get object s3://{}/{}", self.bucket, full_key))?;
        debug!(bucket = %self.bucket, key = %full_key, size = ?object.content_length(), "streaming backup object");
        Ok(Box::pin(object.body.into_async_read()))
    }
}

/// Backups kept in a local (or mounted) directory.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStorage { root: root.into() }
    }

    fn relative_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }
}

#[async_trait]
impl BackupStorage for FsStorage {
    async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let start = self.root.join(prefix);
        if !start.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&start) {
            let entry = entry.with_context(|| format!("Failed to walk directory: {}", start.display()))?;
            if entry.file_type().is_file() {
                if let Some(key) = self.relative_key(entry.path()) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.root.join(key);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read backup object {}", path.display()))
    }

    async fn open_object(&self, key: &str) -> Result<ObjectReader> {
        let path = self.root.join(key);
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("Failed to open backup object {}", path.display()))?;
        Ok(Box::pin(file))
    }
}
