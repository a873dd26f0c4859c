// mongotool/src/restore/logic.rs
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::compatibility::CompatibilityPolicy;
use super::downloader::ArchiveDownloader;
use super::local_storage::DataDirectory;
use super::options::RestoreOptions;
use super::sentinel::{BackupSentinel, SentinelSource};
use crate::config::SettingSource;
use crate::errors::{Cancelled, InstanceStep, RepairPhase, RestoreError, Result};
use crate::mongod::{
    AdminConnector, AdminSession, EngineLauncher, MongoCfgConfig, RsConfig, ShConfig, StartupMode,
    TransientInstance,
};

pub const CLIENT_LABEL: &str = "mongotool restore";

/// Input of one restore. The host configs are handed to the admin session untouched.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub backup_name: String,
    pub target_version: String,
    pub rs_config: RsConfig,
    pub sh_config: ShConfig,
    pub cfg_config: MongoCfgConfig,
}

pub struct RestoreService {
    pub settings: Arc<dyn SettingSource>,
    pub sentinels: Arc<dyn SentinelSource>,
    pub data_dir: Arc<dyn DataDirectory>,
    pub downloader: Arc<dyn ArchiveDownloader>,
    pub launcher: Arc<dyn EngineLauncher>,
    pub admin: Arc<dyn AdminConnector>,
    pub compatibility: CompatibilityPolicy,
    pub minimal_config_path: PathBuf,
    pub cancel: CancellationToken,
}

/// Whether the restored files get their replication metadata and oplog fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostResetup {
    Disabled,
    Enabled {
        fix_system_data_timeout: Duration,
        recovery_timeout: Duration,
    },
}

impl HostResetup {
    fn plan(options: &RestoreOptions, sentinel: &BackupSentinel) -> Self {
        if options.disable_host_resetup {
            HostResetup::Disabled
        } else {
            HostResetup::Enabled {
                fix_system_data_timeout: options.fix_system_data_timeout,
                recovery_timeout: options.recovery_timeout.compute(sentinel.uncompressed_size),
            }
        }
    }
}

/// What a repair phase does through its admin session before shutting mongod down.
enum SessionWork<'a> {
    RepairMetadata(&'a RestoreRequest),
    ShutdownOnly,
}

/// Holds a transient instance and closes it exactly once, at the latest on drop.
struct InstanceGuard {
    instance: Box<dyn TransientInstance>,
    closed: bool,
}

impl InstanceGuard {
    fn new(instance: Box<dyn TransientInstance>) -> Self {
        InstanceGuard { instance, closed: false }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.instance.close();
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.close();
    }
}

impl RestoreService {
    pub async fn do_restore(&self, request: &RestoreRequest) -> Result<()> {
        let options = RestoreOptions::resolve(self.settings.as_ref())?;
        let backup_name = request.backup_name.as_str();

        let sentinel = self
            .sentinels
            .fetch_sentinel(backup_name)
            .await
            .map_err(|source| RestoreError::Metadata {
                backup_name: backup_name.to_string(),
                source,
            })?;

        info!(
            backup_name,
            version = sentinel.version(),
            hostname = %sentinel.hostname,
            uncompressed_size = sentinel.uncompressed_size,
            "fetched backup sentinel"
        );

        self.compatibility
            .ensure_compatible(sentinel.version(), &request.target_version)?;

        self.data_dir
            .ensure_lock_file_empty()
            .await
            .map_err(RestoreError::DirectoryState)?;
        self.data_dir.cleanup().await.map_err(RestoreError::DirectoryState)?;

        info!(backup_name, db_path = %self.data_dir.db_path().display(), "Download backup files to dbPath");
        self.downloader
            .download(backup_name, self.data_dir.db_path())
            .await
            .map_err(|source| RestoreError::Download {
                backup_name: backup_name.to_string(),
                source,
            })?;

        match HostResetup::plan(&options, &sentinel) {
            HostResetup::Disabled => {
                info!(backup_name, "host resetup is disabled, leaving restored metadata as is");
            }
            HostResetup::Enabled {
                fix_system_data_timeout,
                recovery_timeout,
            } => {
                self.run_transient_instance(
                    RepairPhase::FixSystemData,
                    StartupMode::DisableLogicalSessionCacheRefresh,
                    fix_system_data_timeout,
                    SessionWork::RepairMetadata(request),
                )
                .await?;
                self.run_transient_instance(
                    RepairPhase::RecoverFromOplog,
                    StartupMode::RecoverFromOplogAsStandalone,
                    recovery_timeout,
                    SessionWork::ShutdownOnly,
                )
                .await?;
            }
        }

        info!(backup_name, "restore finished");
        Ok(())
    }

    /// Start mongod in `mode`, do `work` through an admin session, shut it
    /// down and wait for the process to exit. The instance is closed on every
    /// path, and waited on before an error is returned.
    async fn run_transient_instance(
        &self,
        phase: RepairPhase,
        mode: StartupMode,
        timeout: Duration,
        work: SessionWork<'_>,
    ) -> Result<()> {
        info!(%phase, %mode, timeout_secs = timeout.as_secs(), "starting repair phase");
        let instance = self
            .launcher
            .start(mode, &self.minimal_config_path)
            .await
            .map_err(|e| RestoreError::transient(phase, InstanceStep::Start, e))?;
        let mut guard = InstanceGuard::new(instance);

        let outcome = self
            .operate(phase, guard.instance.endpoint(), timeout, work)
            .await;

        match outcome {
            Ok(()) => {
                guard
                    .instance
                    .wait()
                    .await
                    .map_err(|e| RestoreError::transient(phase, InstanceStep::Wait, e))?;
                info!(%phase, "repair phase finished");
                Ok(())
            }
            Err(err) => {
                guard.close();
                if let Err(wait_err) = guard.instance.wait().await {
                    warn!(%phase, error = %wait_err, "transient mongod exited uncleanly after failure");
                }
                Err(err)
            }
        }
    }

    async fn operate(
        &self,
        phase: RepairPhase,
        endpoint: &str,
        timeout: Duration,
        work: SessionWork<'_>,
    ) -> Result<()> {
        let session: Box<dyn AdminSession> = self
            .cancellable(self.admin.open(CLIENT_LABEL, endpoint, timeout))
            .await
            .map_err(|e| RestoreError::transient(phase, InstanceStep::SessionOpen, e))?;

        if let SessionWork::RepairMetadata(request) = work {
            self.cancellable(session.repair_metadata(
                &request.rs_config,
                &request.sh_config,
                &request.cfg_config,
            ))
            .await
            .map_err(|e| RestoreError::transient(phase, InstanceStep::Call, e))?;
        }

        self.cancellable(session.shutdown())
            .await
            .map_err(|e| RestoreError::transient(phase, InstanceStep::Shutdown, e))
    }

    async fn cancellable<T, F>(&self, operation: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(anyhow::Error::new(Cancelled)),
            result = operation => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::restore::compatibility::CompatibilityRule;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, event: impl Into<String>) {
        log.lock().unwrap().push(event.into());
    }

    #[derive(Default, Clone)]
    struct Failures {
        sentinel: bool,
        lock_file: bool,
        cleanup: bool,
        download: bool,
        start: Option<StartupMode>,
        open: Option<StartupMode>,
        repair: bool,
        shutdown: Option<StartupMode>,
        wait: Option<StartupMode>,
    }

    struct MockSentinels {
        log: Log,
        version: String,
        size: u64,
        fail: bool,
    }

    #[async_trait]
    impl SentinelSource for MockSentinels {
        async fn fetch_sentinel(&self, backup_name: &str) -> anyhow::Result<BackupSentinel> {
            record(&self.log, format!("sentinel:{}", backup_name));
            if self.fail {
                anyhow::bail!("sentinel not found");
            }
            Ok(serde_json::from_value(json!({
                "BackupName": backup_name,
                "MongoMeta": { "Version": self.version },
                "UncompressedSize": self.size
            }))?)
        }
    }

    struct MockDataDir {
        log: Log,
        path: PathBuf,
        failures: Failures,
    }

    #[async_trait]
    impl DataDirectory for MockDataDir {
        fn db_path(&self) -> &Path {
            &self.path
        }

        async fn ensure_lock_file_empty(&self) -> anyhow::Result<()> {
            record(&self.log, "lock_file");
            if self.failures.lock_file {
                anyhow::bail!("mongod lock file is not empty");
            }
            Ok(())
        }

        async fn cleanup(&self) -> anyhow::Result<()> {
            record(&self.log, "cleanup");
            if self.failures.cleanup {
                anyhow::bail!("permission denied");
            }
            Ok(())
        }
    }

    struct MockDownloader {
        log: Log,
        fail: bool,
    }

    #[async_trait]
    impl ArchiveDownloader for MockDownloader {
        async fn download(&self, backup_name: &str, target_dir: &Path) -> anyhow::Result<()> {
            record(&self.log, format!("download:{}:{}", backup_name, target_dir.display()));
            if self.fail {
                anyhow::bail!("connection reset while fetching part_3.tar");
            }
            Ok(())
        }
    }

    struct MockLauncher {
        log: Log,
        failures: Failures,
    }

    #[async_trait]
    impl EngineLauncher for MockLauncher {
        async fn start(&self, mode: StartupMode, minimal_config_path: &Path) -> anyhow::Result<Box<dyn TransientInstance>> {
            record(&self.log, format!("start:{}:{}", mode, minimal_config_path.display()));
            if self.failures.start == Some(mode) {
                anyhow::bail!("mongod: exec format error");
            }
            Ok(Box::new(MockInstance {
                log: Arc::clone(&self.log),
                mode,
                endpoint: format!("mongodb://localhost/{}", mode),
                fail_wait: self.failures.wait == Some(mode),
            }))
        }
    }

    struct MockInstance {
        log: Log,
        mode: StartupMode,
        endpoint: String,
        fail_wait: bool,
    }

    #[async_trait]
    impl TransientInstance for MockInstance {
        fn endpoint(&self) -> &str {
            &self.endpoint
        }

        fn close(&self) {
            record(&self.log, format!("close:{}", self.mode));
        }

        async fn wait(&self) -> anyhow::Result<()> {
            record(&self.log, format!("wait:{}", self.mode));
            if self.fail_wait {
                anyhow::bail!("mongod exited with status 14");
            }
            Ok(())
        }
    }

    struct MockAdmin {
        log: Log,
        failures: Failures,
        cancel_on_open: Option<CancellationToken>,
    }

    #[async_trait]
    impl AdminConnector for MockAdmin {
        async fn open(&self, client_label: &str, endpoint: &str, timeout: Duration) -> anyhow::Result<Box<dyn AdminSession>> {
            record(&self.log, format!("open:{}:{}:{}", client_label, endpoint, timeout.as_secs()));
            let mode = if endpoint.ends_with(&StartupMode::DisableLogicalSessionCacheRefresh.to_string()) {
                StartupMode::DisableLogicalSessionCacheRefresh
            } else {
                StartupMode::RecoverFromOplogAsStandalone
            };
            if self.failures.open == Some(mode) {
                anyhow::bail!("server selection timeout");
            }
            if let Some(token) = &self.cancel_on_open {
                token.cancel();
            }
            Ok(Box::new(MockSession {
                log: Arc::clone(&self.log),
                mode,
                fail_repair: self.failures.repair,
                fail_shutdown: self.failures.shutdown == Some(mode),
            }))
        }
    }

    struct MockSession {
        log: Log,
        mode: StartupMode,
        fail_repair: bool,
        fail_shutdown: bool,
    }

    #[async_trait]
    impl AdminSession for MockSession {
        async fn repair_metadata(&self, rs: &RsConfig, sh: &ShConfig, cfg: &MongoCfgConfig) -> anyhow::Result<()> {
            record(
                &self.log,
                format!("repair:{}:{}:{}", rs.rs_name, sh.shard_name, cfg.shards.len()),
            );
            if self.fail_repair {
                anyhow::bail!("not authorized on local");
            }
            Ok(())
        }

        async fn shutdown(&self) -> anyhow::Result<()> {
            record(&self.log, format!("shutdown:{}", self.mode));
            if self.fail_shutdown {
                anyhow::bail!("shutdown refused");
            }
            Ok(())
        }
    }

    struct Harness {
        log: Log,
        version: String,
        size: u64,
        settings: Settings,
        rules: Vec<CompatibilityRule>,
        failures: Failures,
        cancel: CancellationToken,
        cancel_on_open: bool,
    }

    impl Harness {
        fn new(backup_version: &str) -> Self {
            Harness {
                log: Arc::new(Mutex::new(Vec::new())),
                version: backup_version.to_string(),
                size: 0,
                settings: Settings::default(),
                rules: Vec::new(),
                failures: Failures::default(),
                cancel: CancellationToken::new(),
                cancel_on_open: false,
            }
        }

        fn with_settings(mut self, value: serde_json::Value) -> Self {
            let map: HashMap<String, serde_json::Value> = serde_json::from_value(value).unwrap();
            self.settings = Settings::from_json_map(&map).unwrap();
            self
        }

        fn service(&self) -> RestoreService {
            RestoreService {
                settings: Arc::new(self.settings.clone()),
                sentinels: Arc::new(MockSentinels {
                    log: Arc::clone(&self.log),
                    version: self.version.clone(),
                    size: self.size,
                    fail: self.failures.sentinel,
                }),
                data_dir: Arc::new(MockDataDir {
                    log: Arc::clone(&self.log),
                    path: PathBuf::from("/data/db"),
                    failures: self.failures.clone(),
                }),
                downloader: Arc::new(MockDownloader {
                    log: Arc::clone(&self.log),
                    fail: self.failures.download,
                }),
                launcher: Arc::new(MockLauncher {
                    log: Arc::clone(&self.log),
                    failures: self.failures.clone(),
                }),
                admin: Arc::new(MockAdmin {
                    log: Arc::clone(&self.log),
                    failures: self.failures.clone(),
                    cancel_on_open: self.cancel_on_open.then(|| self.cancel.clone()),
                }),
                compatibility: CompatibilityPolicy::new(self.rules.clone()),
                minimal_config_path: PathBuf::from("/etc/mongod-minimal.conf"),
                cancel: self.cancel.clone(),
            }
        }

        async fn restore(&self, target_version: &str) -> Result<()> {
            let request = RestoreRequest {
                backup_name: "stream_20240101T000000Z".to_string(),
                target_version: target_version.to_string(),
                rs_config: RsConfig::new("rs01", vec!["db1:27017".to_string()], vec![])
                    .expect("valid rs config"),
                sh_config: ShConfig::default(),
                cfg_config: MongoCfgConfig::default(),
            };
            self.service().do_restore(&request).await
        }

        fn events(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn count(&self, event: &str) -> usize {
            self.events().iter().filter(|e| e.as_str() == event).count()
        }

        fn any_starting_with(&self, prefix: &str) -> bool {
            self.events().iter().any(|e| e.starts_with(prefix))
        }
    }

    const FIX: &str = "disable-logical-session-cache-refresh";
    const RECOVER: &str = "recover-from-oplog-as-standalone";

    #[tokio::test]
    async fn test_full_restore_runs_both_repair_phases_in_order() -> anyhow::Result<()> {
        let harness = Harness::new("4.2");
        harness.restore("4.2").await?;

        assert_eq!(
            harness.events(),
            vec![
                "sentinel:stream_20240101T000000Z".to_string(),
                "lock_file".to_string(),
                "cleanup".to_string(),
                "download:stream_20240101T000000Z:/data/db".to_string(),
                format!("start:{}:/etc/mongod-minimal.conf", FIX),
                format!("open:{}:mongodb://localhost/{}:600", CLIENT_LABEL, FIX),
                "repair:rs01::0".to_string(),
                format!("shutdown:{}", FIX),
                format!("wait:{}", FIX),
                format!("close:{}", FIX),
                format!("start:{}:/etc/mongod-minimal.conf", RECOVER),
                format!("open:{}:mongodb://localhost/{}:600", CLIENT_LABEL, RECOVER),
                format!("shutdown:{}", RECOVER),
                format!("wait:{}", RECOVER),
                format!("close:{}", RECOVER),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_incompatible_versions_stop_before_touching_disk() {
        let harness = Harness::new("3.6");
        let err = harness.restore("6.0").await.unwrap_err();

        assert!(matches!(err, RestoreError::Compatibility(_)));
        assert_eq!(harness.events(), vec!["sentinel:stream_20240101T000000Z".to_string()]);
    }

    #[tokio::test]
    async fn test_compatibility_rules_are_consulted() -> anyhow::Result<()> {
        let mut harness = Harness::new("4.2");
        harness.rules = serde_json::from_value(json!([
            { "backup_min": "4.2", "backup_max": "4.2", "target_min": "4.4", "target_max": "4.4", "allow": true }
        ]))?;
        harness.restore("4.4.1").await?;
        assert!(harness.any_starting_with("download:"));
        Ok(())
    }

    #[tokio::test]
    async fn test_non_empty_lock_file_prevents_download() {
        let mut harness = Harness::new("4.2");
        harness.failures.lock_file = true;
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(err, RestoreError::DirectoryState(_)));
        assert!(!harness.any_starting_with("cleanup"));
        assert!(!harness.any_starting_with("download:"));
    }

    #[tokio::test]
    async fn test_cleanup_failure_prevents_download() {
        let mut harness = Harness::new("4.2");
        harness.failures.cleanup = true;
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(err, RestoreError::DirectoryState(_)));
        assert!(!harness.any_starting_with("download:"));
    }

    #[tokio::test]
    async fn test_download_failure_never_starts_mongod() {
        let mut harness = Harness::new("4.2");
        harness.failures.download = true;
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(err, RestoreError::Download { .. }));
        assert!(!harness.any_starting_with("start:"));
    }

    #[tokio::test]
    async fn test_sentinel_failure_is_a_metadata_error() {
        let mut harness = Harness::new("4.2");
        harness.failures.sentinel = true;
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(err, RestoreError::Metadata { .. }));
        assert_eq!(harness.events().len(), 1);
    }

    #[tokio::test]
    async fn test_bad_setting_aborts_before_any_side_effect() {
        let harness = Harness::new("4.2").with_settings(json!({
            "MONGODB_RESTORE_DISABLE_HOST_RESETUP": "perhaps"
        }));
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(err, RestoreError::Config { .. }));
        assert!(harness.events().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_host_resetup_skips_repair_phases() -> anyhow::Result<()> {
        let harness = Harness::new("4.2").with_settings(json!({
            "MONGODB_RESTORE_DISABLE_HOST_RESETUP": true
        }));
        harness.restore("4.2").await?;

        assert!(harness.any_starting_with("download:"));
        assert!(!harness.any_starting_with("start:"));
        assert!(!harness.any_starting_with("open:"));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_repair_still_closes_and_waits() {
        let mut harness = Harness::new("4.2");
        harness.failures.repair = true;
        let err = harness.restore("4.2").await.unwrap_err();

        match &err {
            RestoreError::TransientInstance { phase, step, .. } => {
                assert_eq!(*phase, RepairPhase::FixSystemData);
                assert_eq!(*step, InstanceStep::Call);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let events = harness.events();
        let tail: Vec<&str> = events.iter().rev().take(2).rev().map(String::as_str).collect();
        assert_eq!(tail, vec![format!("close:{}", FIX), format!("wait:{}", FIX)]);
        assert_eq!(harness.count(&format!("close:{}", FIX)), 1);
        assert!(!harness.any_starting_with(&format!("shutdown:{}", FIX)));
        assert!(!harness.any_starting_with(&format!("start:{}", RECOVER)));
    }

    #[tokio::test]
    async fn test_start_failure_has_nothing_to_close() {
        let mut harness = Harness::new("4.2");
        harness.failures.start = Some(StartupMode::DisableLogicalSessionCacheRefresh);
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(
            err,
            RestoreError::TransientInstance { step: InstanceStep::Start, .. }
        ));
        assert_eq!(err.to_string(), "fix system data: unable to start mongod in special mode");
        assert!(!harness.any_starting_with("close:"));
        assert!(!harness.any_starting_with("open:"));
    }

    #[tokio::test]
    async fn test_session_failure_in_recovery_closes_instance_once() {
        let mut harness = Harness::new("4.2");
        harness.failures.open = Some(StartupMode::RecoverFromOplogAsStandalone);
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(
            err,
            RestoreError::TransientInstance {
                phase: RepairPhase::RecoverFromOplog,
                step: InstanceStep::SessionOpen,
                ..
            }
        ));
        assert_eq!(harness.count(&format!("close:{}", FIX)), 1);
        assert_eq!(harness.count(&format!("close:{}", RECOVER)), 1);
        assert_eq!(harness.count(&format!("wait:{}", RECOVER)), 1);
    }

    #[tokio::test]
    async fn test_shutdown_failure_is_fatal() {
        let mut harness = Harness::new("4.2");
        harness.failures.shutdown = Some(StartupMode::DisableLogicalSessionCacheRefresh);
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(
            err,
            RestoreError::TransientInstance { step: InstanceStep::Shutdown, .. }
        ));
        assert_eq!(harness.count(&format!("close:{}", FIX)), 1);
        assert!(!harness.any_starting_with(&format!("start:{}", RECOVER)));
    }

    #[tokio::test]
    async fn test_unclean_exit_is_fatal_and_closes_once() {
        let mut harness = Harness::new("4.2");
        harness.failures.wait = Some(StartupMode::RecoverFromOplogAsStandalone);
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(matches!(
            err,
            RestoreError::TransientInstance {
                phase: RepairPhase::RecoverFromOplog,
                step: InstanceStep::Wait,
                ..
            }
        ));
        assert_eq!(harness.count(&format!("close:{}", RECOVER)), 1);
    }

    #[tokio::test]
    async fn test_recovery_timeout_follows_backup_size() -> anyhow::Result<()> {
        let mut harness = Harness::new("4.2");
        harness.size = 5 * (1 << 30);
        harness.restore("4.2").await?;

        assert!(harness.any_starting_with(&format!("open:{}:mongodb://localhost/{}:600", CLIENT_LABEL, FIX)));
        assert!(harness.any_starting_with(&format!("open:{}:mongodb://localhost/{}:900", CLIENT_LABEL, RECOVER)));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancellation_aborts_session_calls_but_waits_for_exit() {
        let mut harness = Harness::new("4.2");
        harness.cancel_on_open = true;
        let err = harness.restore("4.2").await.unwrap_err();

        assert!(err.is_cancelled());
        assert!(matches!(
            err,
            RestoreError::TransientInstance {
                phase: RepairPhase::FixSystemData,
                step: InstanceStep::Call,
                ..
            }
        ));
        assert!(!harness.any_starting_with("repair:"));
        assert_eq!(harness.count(&format!("close:{}", FIX)), 1);
        assert_eq!(harness.count(&format!("wait:{}", FIX)), 1);
    }

    #[tokio::test]
    async fn test_dropped_guard_closes_instance() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        {
            let _guard = InstanceGuard::new(Box::new(MockInstance {
                log: Arc::clone(&log),
                mode: StartupMode::RecoverFromOplogAsStandalone,
                endpoint: String::new(),
                fail_wait: false,
            }));
        }
        assert_eq!(*log.lock().unwrap(), vec![format!("close:{}", RECOVER)]);
    }
}
