// mongotool/src/restore/sentinel.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use std::sync::Arc;

use super::storage::BackupStorage;

pub const BASE_BACKUP_PATH: &str = "basebackups_005";
const SENTINEL_SUFFIX: &str = "_backup_stop_sentinel.json";

/// Oplog timestamps recorded around the backup.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct OplogTimestamp {
    #[serde(rename = "TS")]
    pub ts: u32,
    pub inc: u32,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MongoMeta {
    #[serde(default)]
    pub before: Option<OplogTimestamp>,
    #[serde(default)]
    pub after: Option<OplogTimestamp>,
    pub version: String,
}

/// Description of a finished binary backup, written next to its archives.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct BackupSentinel {
    #[serde(default)]
    pub backup_name: String,
    #[serde(default)]
    pub backup_type: String,
    #[serde(default)]
    pub hostname: String,
    pub start_local_time: Option<DateTime<FixedOffset>>,
    pub finish_local_time: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub user_data: Option<serde_json::Value>,
    pub mongo_meta: MongoMeta,
    #[serde(default)]
    pub permanent: bool,
    #[serde(default)]
    pub uncompressed_size: u64,
    #[serde(default)]
    pub compressed_size: u64,
}

impl BackupSentinel {
    pub fn version(&self) -> &str {
        &self.mongo_meta.version
    }
}

pub fn sentinel_key(backup_name: &str) -> String {
    format!("{}/{}{}", BASE_BACKUP_PATH, backup_name, SENTINEL_SUFFIX)
}

pub fn archives_prefix(backup_name: &str) -> String {
    format!("{}/{}/", BASE_BACKUP_PATH, backup_name)
}

#[async_trait]
pub trait SentinelSource: Send + Sync {
    async fn fetch_sentinel(&self, backup_name: &str) -> Result<BackupSentinel>;
}

/// Reads sentinels from backup storage.
pub struct SentinelStore {
    storage: Arc<dyn BackupStorage>,
}

impl SentinelStore {
    pub fn new(storage: Arc<dyn BackupStorage>) -> Self {
        SentinelStore { storage }
    }
}

#[async_trait]
impl SentinelSource for SentinelStore {
    async fn fetch_sentinel(&self, backup_name: &str) -> Result<BackupSentinel> {
        let key = sentinel_key(backup_name);
        let raw = self
            .storage
            .read_object(&key)
            .await
            .with_context(|| format!("Failed to download sentinel {}", key))?;
        serde_json::from_slice(&raw).with_context(|| format!("Failed to decode sentinel {}", key))
    }
}
