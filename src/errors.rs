use std::fmt;

use thiserror::Error;

use crate::restore::compatibility::IncompatibleVersions;

/// The repair phase a transient mongod was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPhase {
    FixSystemData,
    RecoverFromOplog,
}

impl fmt::Display for RepairPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairPhase::FixSystemData => write!(f, "fix system data"),
            RepairPhase::RecoverFromOplog => write!(f, "recover from oplog as standalone"),
        }
    }
}

/// Step of the transient instance lifecycle where a repair phase failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStep {
    Start,
    SessionOpen,
    Call,
    Shutdown,
    Wait,
}

impl fmt::Display for InstanceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InstanceStep::Start => "unable to start mongod in special mode",
            InstanceStep::SessionOpen => "unable to create mongod service",
            InstanceStep::Call => "unable to fix system data after restore",
            InstanceStep::Shutdown => "unable to shutdown mongod",
            InstanceStep::Wait => "mongod did not exit cleanly",
        };
        f.write_str(text)
    }
}

/// Marker carried in an error chain when the restore context was cancelled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("operation cancelled")]
pub struct Cancelled;

#[derive(Error, Debug)]
pub enum RestoreError {
    #[error("Configuration error: unable to read setting {name}")]
    Config {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Metadata error: unable to fetch sentinel of backup {backup_name}")]
    Metadata {
        backup_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Compatibility error: {0}")]
    Compatibility(#[from] IncompatibleVersions),

    #[error("Data directory is not ready for restore")]
    DirectoryState(#[source] anyhow::Error),

    #[error("Download error: unable to fetch archives of backup {backup_name}")]
    Download {
        backup_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{phase}: {step}")]
    TransientInstance {
        phase: RepairPhase,
        step: InstanceStep,
        #[source]
        source: anyhow::Error,
    },
}

impl RestoreError {
    pub fn transient(phase: RepairPhase, step: InstanceStep, source: anyhow::Error) -> Self {
        RestoreError::TransientInstance { phase, step, source }
    }

    /// True when the failure was caused by cancelling the restore context.
    pub fn is_cancelled(&self) -> bool {
        match self {
            RestoreError::TransientInstance { source, .. } => source.is::<Cancelled>(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RestoreError>;
