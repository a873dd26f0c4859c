// mongotool/src/mongod/process.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::ffi::OsString;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{EngineLauncher, StartupMode, TransientInstance};

type ExitOutcome = Option<std::result::Result<ExitStatus, String>>;

/// Starts mongod binaries in restricted modes on a free local port.
pub struct MongodLauncher {
    binary: PathBuf,
}

impl MongodLauncher {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        MongodLauncher { binary: binary.into() }
    }
}

fn pick_free_port() -> Result<u16> {
    let listener = TcpListener::bind(("127.0.0.1", 0)).context("Failed to reserve a local port for mongod")?;
    Ok(listener.local_addr()?.port())
}

fn mongod_args(mode: StartupMode, minimal_config_path: &Path, port: u16) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--config".into(),
        minimal_config_path.as_os_str().to_os_string(),
        "--port".into(),
        port.to_string().into(),
        "--bind_ip".into(),
        "localhost".into(),
    ];
    for parameter in mode.set_parameters() {
        args.push("--setParameter".into());
        args.push((*parameter).into());
    }
    args
}

/// mongod logs go to our own stdout/stderr unless the minimal config sets `systemLog.path`.
fn mongod_command(binary: &Path, args: &[OsString]) -> Command {
    let mut command = Command::new(binary);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    command
}

fn endpoint_for(port: u16) -> String {
    format!("mongodb://localhost:{}/?directConnection=true", port)
}

#[async_trait]
impl EngineLauncher for MongodLauncher {
    async fn start(&self, mode: StartupMode, minimal_config_path: &Path) -> Result<Box<dyn TransientInstance>> {
        let port = pick_free_port()?;
        let args = mongod_args(mode, minimal_config_path, port);
        info!(binary = %self.binary.display(), %mode, port, "starting transient mongod");

        let child = mongod_command(&self.binary, &args)
            .spawn()
            .with_context(|| format!("Failed to execute {}", self.binary.display()))?;

        Ok(Box::new(MongodProcess::supervise(child, endpoint_for(port))))
    }
}

/// A running mongod owned by a supervisor task.
pub struct MongodProcess {
    uri: String,
    kill: CancellationToken,
    exit: watch::Receiver<ExitOutcome>,
}

impl MongodProcess {
    fn supervise(mut child: Child, uri: String) -> Self {
        let kill = CancellationToken::new();
        let (exit_tx, exit_rx) = watch::channel(None);
        let kill_requested = kill.clone();
        let pid = child.id();

        tokio::spawn(async move {
            let exited = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_requested.cancelled() => None,
            };
            let status = match exited {
                Some(status) => status,
                None => {
                    debug!(?pid, "killing transient mongod");
                    if let Err(e) = child.start_kill() {
                        warn!(?pid, error = %e, "failed to signal transient mongod");
                    }
                    child.wait().await
                }
            };
            let _ = exit_tx.send(Some(status.map_err(|e| e.to_string())));
        });

        MongodProcess {
            uri,
            kill,
            exit: exit_rx,
        }
    }
}

#[async_trait]
impl TransientInstance for MongodProcess {
    fn endpoint(&self) -> &str {
        &self.uri
    }

    fn close(&self) {
        self.kill.cancel();
    }

    async fn wait(&self) -> Result<()> {
        let mut exit = self.exit.clone();
        let outcome = {
            let settled = exit
                .wait_for(|outcome| outcome.is_some())
                .await
                .context("mongod supervisor stopped before the process exited")?;
            settled.clone()
        };

        match outcome {
            Some(Ok(status)) if status.success() => Ok(()),
            Some(Ok(status)) => Err(anyhow::anyhow!("mongod exited with {}", status)),
            Some(Err(e)) => Err(anyhow::anyhow!("Failed to wait for mongod: {}", e)),
            None => Err(anyhow::anyhow!("mongod exit status is unknown")),
        }
    }
}
