// mongotool/src/restore/options.rs
use std::time::Duration;

use crate::config::SettingSource;
use crate::config::settings::{
    MONGODB_RESTORE_DISABLE_HOST_RESETUP, MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT,
    MONGODB_RESTORE_RECOVERY_TIMEOUT_FLOOR, MONGODB_RESTORE_RECOVERY_TIMEOUT_PER_GIB,
};
use crate::errors::RestoreError;

pub const DEFAULT_FIX_SYSTEM_DATA_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_RECOVERY_TIMEOUT_FLOOR: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_RECOVERY_TIMEOUT_PER_GIB: Duration = Duration::from_secs(60);

const GIB: u64 = 1 << 30;

/// How long a mongod replaying the oplog may take to come up, by backup size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryTimeoutPolicy {
    pub floor: Duration,
    pub per_gib: Duration,
}

impl Default for RecoveryTimeoutPolicy {
    fn default() -> Self {
        RecoveryTimeoutPolicy {
            floor: DEFAULT_RECOVERY_TIMEOUT_FLOOR,
            per_gib: DEFAULT_RECOVERY_TIMEOUT_PER_GIB,
        }
    }
}

impl RecoveryTimeoutPolicy {
    /// `floor` plus `per_gib` for every started GiB. Never below one second.
    pub fn compute(&self, uncompressed_size: u64) -> Duration {
        let started_gibs = uncompressed_size.div_ceil(GIB);
        let per_gib_secs = self.per_gib.as_secs().saturating_mul(started_gibs);
        let total = self.floor.saturating_add(Duration::from_secs(per_gib_secs));
        total.max(Duration::from_secs(1))
    }
}

/// Everything the restore pipeline reads from settings, resolved once up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    pub disable_host_resetup: bool,
    pub fix_system_data_timeout: Duration,
    pub recovery_timeout: RecoveryTimeoutPolicy,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        RestoreOptions {
            disable_host_resetup: false,
            fix_system_data_timeout: DEFAULT_FIX_SYSTEM_DATA_TIMEOUT,
            recovery_timeout: RecoveryTimeoutPolicy::default(),
        }
    }
}

fn config_error(name: &'static str) -> impl FnOnce(anyhow::Error) -> RestoreError {
    move |source| RestoreError::Config { name, source }
}

impl RestoreOptions {
    pub fn resolve(settings: &dyn SettingSource) -> Result<Self, RestoreError> {
        let disable_host_resetup = settings
            .get_bool(MONGODB_RESTORE_DISABLE_HOST_RESETUP, false)
            .map_err(config_error(MONGODB_RESTORE_DISABLE_HOST_RESETUP))?;
        let fix_system_data_timeout = settings
            .get_duration(MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT, DEFAULT_FIX_SYSTEM_DATA_TIMEOUT)
            .map_err(config_error(MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT))?;
        if fix_system_data_timeout.is_zero() {
            return Err(config_error(MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT)(anyhow::anyhow!(
                "setting {} must be at least one second",
                MONGODB_RESTORE_FIX_SYSTEM_DATA_TIMEOUT
            )));
        }
        let floor = settings
            .get_duration(MONGODB_RESTORE_RECOVERY_TIMEOUT_FLOOR, DEFAULT_RECOVERY_TIMEOUT_FLOOR)
            .map_err(config_error(MONGODB_RESTORE_RECOVERY_TIMEOUT_FLOOR))?;
        let per_gib = settings
            .get_duration(MONGODB_RESTORE_RECOVERY_TIMEOUT_PER_GIB, DEFAULT_RECOVERY_TIMEOUT_PER_GIB)
            .map_err(config_error(MONGODB_RESTORE_RECOVERY_TIMEOUT_PER_GIB))?;

        Ok(RestoreOptions {
            disable_host_resetup,
            fix_system_data_timeout,
            recovery_timeout: RecoveryTimeoutPolicy { floor, per_gib },
        })
    }
}
