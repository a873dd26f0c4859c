pub(crate) mod compatibility;
pub(crate) mod downloader;
pub(crate) mod local_storage;
mod logic;
pub(crate) mod options;
pub(crate) mod sentinel;
pub(crate) mod storage;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{AppConfig, BackupSource};
use crate::mongod::process::MongodLauncher;
use crate::mongod::service::MongodConnector;
use crate::utils::find_mongod_executable;
use downloader::ConcurrentDownloader;
use local_storage::LocalStorage;
use sentinel::SentinelStore;
use storage::{BackupStorage, FsStorage, S3Storage};

pub use logic::{RestoreRequest, RestoreService};

async fn open_backup_storage(app_config: &AppConfig) -> Result<Arc<dyn BackupStorage>> {
    match &app_config.backup_source {
        BackupSource::S3 { bucket, prefix } => {
            let spaces_config = app_config
                .spaces_config
                .as_ref()
                .context("S3 backup source selected but no s3_storage configuration found.")?;
            Ok(Arc::new(S3Storage::connect(spaces_config, bucket, prefix).await))
        }
        BackupSource::Local(root) => Ok(Arc::new(FsStorage::new(root.clone()))),
    }
}

/// Public entry point for the restore process. Builds the production
/// collaborators from `app_config` and runs one restore.
pub async fn run_restore_flow(
    app_config: &AppConfig,
    request: &RestoreRequest,
    cancel: CancellationToken,
) -> Result<()> {
    let storage = open_backup_storage(app_config).await?;
    let mongod_binary = match &app_config.mongod.binary_path {
        Some(path) => path.clone(),
        None => find_mongod_executable()?,
    };

    info!(
        backup_name = %request.backup_name,
        target_version = %request.target_version,
        db_path = %app_config.mongod.db_path.display(),
        "restoring backup"
    );

    let service = RestoreService {
        settings: Arc::new(app_config.settings.clone()),
        sentinels: Arc::new(SentinelStore::new(Arc::clone(&storage))),
        data_dir: Arc::new(LocalStorage::new(
            app_config.mongod.db_path.clone(),
            app_config.mongod.lock_file.clone(),
        )),
        downloader: Arc::new(ConcurrentDownloader::new(storage, app_config.download_concurrency)),
        launcher: Arc::new(MongodLauncher::new(mongod_binary)),
        admin: Arc::new(MongodConnector),
        compatibility: app_config.compatibility.clone(),
        minimal_config_path: app_config.mongod.config_path.clone(),
        cancel,
    };

    if let Err(e) = service.do_restore(request).await {
        if e.is_cancelled() {
            warn!(
                db_path = %app_config.mongod.db_path.display(),
                "restore was cancelled, the data directory is left as it was at the time"
            );
        }
        return Err(e.into());
    }
    Ok(())
}
