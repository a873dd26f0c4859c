// mongotool/src/mongod/mod.rs
pub(crate) mod host_config;
pub(crate) mod process;
pub(crate) mod service;

use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::time::Duration;

pub use host_config::{MongoCfgConfig, RsConfig, ShConfig};

/// Restricted ways of starting mongod for maintenance on restored files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupMode {
    /// Keeps the logical session cache from refreshing against unreconciled data.
    DisableLogicalSessionCacheRefresh,
    /// Replays the oplog as an unaffiliated standalone node.
    RecoverFromOplogAsStandalone,
}

impl StartupMode {
    pub fn set_parameters(&self) -> &'static [&'static str] {
        match self {
            StartupMode::DisableLogicalSessionCacheRefresh => &["disableLogicalSessionCacheRefresh=true"],
            StartupMode::RecoverFromOplogAsStandalone => &[
                "recoverFromOplogAsStandalone=true",
                "takeUnstableCheckpointOnShutdown=true",
            ],
        }
    }
}

impl fmt::Display for StartupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupMode::DisableLogicalSessionCacheRefresh => write!(f, "disable-logical-session-cache-refresh"),
            StartupMode::RecoverFromOplogAsStandalone => write!(f, "recover-from-oplog-as-standalone"),
        }
    }
}

#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn start(&self, mode: StartupMode, minimal_config_path: &Path) -> Result<Box<dyn TransientInstance>>;
}

/// A short-lived mongod process.
#[async_trait]
pub trait TransientInstance: Send + Sync {
    fn endpoint(&self) -> &str;

    /// Asks the process to terminate. Idempotent and does not block.
    fn close(&self);

    /// Resolves once the process has exited.
    async fn wait(&self) -> Result<()>;
}

#[async_trait]
pub trait AdminConnector: Send + Sync {
    async fn open(&self, client_label: &str, endpoint: &str, timeout: Duration) -> Result<Box<dyn AdminSession>>;
}

#[async_trait]
pub trait AdminSession: Send + Sync {
    async fn repair_metadata(&self, rs: &RsConfig, sh: &ShConfig, cfg: &MongoCfgConfig) -> Result<()>;

    async fn shutdown(&self) -> Result<()>;
}
