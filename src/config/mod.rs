// mongotool/src/config/mod.rs
pub(crate) mod settings;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::restore::compatibility::{CompatibilityPolicy, CompatibilityRule};
pub use settings::{SettingSource, Settings};

const DEFAULT_DOWNLOAD_CONCURRENCY: usize = 4;
const DEFAULT_LOCK_FILE_NAME: &str = "mongod.lock";

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonS3StorageConfig {
    pub bucket_name: Option<String>,
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonMongodConfig {
    pub db_path: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub binary_path: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawJsonConfig {
    pub backup_source: Option<String>,
    pub s3_storage: Option<JsonS3StorageConfig>,
    pub mongod: Option<JsonMongodConfig>,
    pub download_concurrency: Option<usize>,
    #[serde(default)]
    pub settings: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub compatibility_rules: Vec<CompatibilityRule>,
}

// Application's internal configuration structs
#[derive(Debug, Clone)]
pub struct SpacesConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Where backups are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupSource {
    S3 { bucket: String, prefix: String },
    Local(PathBuf),
}

#[derive(Debug, Clone)]
pub struct MongodConfig {
    pub db_path: PathBuf,
    /// Minimal config handed to transient mongod instances.
    pub config_path: PathBuf,
    pub binary_path: Option<PathBuf>,
    pub lock_file: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backup_source: BackupSource,
    pub spaces_config: Option<SpacesConfig>,
    pub mongod: MongodConfig,
    pub download_concurrency: usize,
    pub settings: Settings,
    pub compatibility: CompatibilityPolicy,
}

impl AppConfig {
    /// Reads `config_path` and overlays process environment variables on its settings.
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;

        Self::from_raw(raw_json_config, std::env::vars())
    }

    pub fn from_raw<I>(raw: RawJsonConfig, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let spaces_config = raw.s3_storage.as_ref().and_then(parse_spaces_config);

        let backup_source_str = raw
            .backup_source
            .as_ref()
            .filter(|s| !s.trim().is_empty())
            .context("backup_source must be set in config.json")?;

        let backup_source = if backup_source_str.starts_with("s3://") {
            if spaces_config.is_none() {
                anyhow::bail!(
                    "backup_source in config.json is an S3 URI, but S3 storage (s3_storage) is not fully configured or is missing required fields."
                );
            }
            let (bucket, prefix) = parse_s3_uri(backup_source_str)?;
            if let Some(configured) = raw
                .s3_storage
                .as_ref()
                .and_then(|s3| s3.bucket_name.as_deref())
                .filter(|b| !b.is_empty())
            {
                if configured != bucket {
                    anyhow::bail!(
                        "s3_storage.bucket_name '{}' does not match the bucket '{}' in backup_source.",
                        configured,
                        bucket
                    );
                }
            }
            BackupSource::S3 { bucket, prefix }
        } else {
            BackupSource::Local(PathBuf::from(backup_source_str))
        };

        let mongod = load_mongod_config(raw.mongod.as_ref())?;

        let download_concurrency = raw.download_concurrency.unwrap_or(DEFAULT_DOWNLOAD_CONCURRENCY);
        if download_concurrency == 0 {
            anyhow::bail!("download_concurrency must be greater than zero in config.json.");
        }

        let settings = Settings::from_json_map(&raw.settings)?.with_overrides(env);

        Ok(AppConfig {
            backup_source,
            spaces_config,
            mongod,
            download_concurrency,
            settings,
            compatibility: CompatibilityPolicy::new(raw.compatibility_rules),
        })
    }
}

fn parse_spaces_config(s3_raw: &JsonS3StorageConfig) -> Option<SpacesConfig> {
    if let (Some(region), Some(key_id), Some(secret), Some(endpoint)) = (
        s3_raw.region.as_ref().filter(|s| !s.is_empty()),
        s3_raw.access_key_id.as_ref().filter(|s| !s.is_empty()),
        s3_raw.secret_access_key.as_ref().filter(|s| !s.is_empty()),
        s3_raw.endpoint_url.as_ref().filter(|s| !s.is_empty()),
    ) {
        Some(SpacesConfig {
            region: region.clone(),
            access_key_id: key_id.clone(),
            secret_access_key: secret.clone(),
            endpoint_url: endpoint.clone(),
        })
    } else {
        warn!(
            "S3 configuration is present in config.json but some required fields (region, access_key_id, secret_access_key, endpoint_url) are missing or empty. S3 operations will be disabled."
        );
        None
    }
}

fn load_mongod_config(raw: Option<&JsonMongodConfig>) -> Result<MongodConfig> {
    let raw = raw.context("mongod section must be defined in config.json")?;
    let db_path = raw
        .db_path
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .context("mongod.db_path must be set in config.json")?;
    let config_path = raw
        .config_path
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
        .context("mongod.config_path must be set in config.json")?;
    let lock_file = raw
        .lock_file
        .clone()
        .unwrap_or_else(|| db_path.join(DEFAULT_LOCK_FILE_NAME));

    Ok(MongodConfig {
        db_path,
        config_path,
        binary_path: raw.binary_path.clone(),
        lock_file,
    })
}

/// Parses an S3 URI (s3://bucket/prefix) into bucket and prefix. The prefix may be empty.
pub fn parse_s3_uri(s3_uri: &str) -> Result<(String, String)> {
    let uri = url::Url::parse(s3_uri)
        .with_context(|| format!("Invalid S3 URI format: {}", s3_uri))?;
    if uri.scheme() != "s3" {
        return Err(anyhow::anyhow!("S3 URI must start with s3://"));
    }
    let bucket = uri.host_str().context("S3 URI missing bucket name")?.to_string();
    let prefix = uri.path().trim_matches('/').to_string();
    Ok((bucket, prefix))
}
