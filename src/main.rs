//! MongoDB Binary Restore Tool
//!
//! Restores binary backups into a local mongod data directory and prepares
//! them for a production start.

// mongotool/src/main.rs
mod config;
mod errors;
mod mongod;
mod restore;
mod utils;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::AppConfig;
use mongod::{MongoCfgConfig, RsConfig, ShConfig};
use restore::RestoreRequest;
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mongotool", about = "Restore MongoDB binary backups into a local data directory")]
struct Cli {
    /// Path to the tool's JSON configuration
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Restore a binary backup into the configured mongod data directory
    Restore(RestoreArgs),
}

#[derive(Args, Debug)]
struct RestoreArgs {
    /// Name of the backup to restore
    backup_name: String,

    /// Version of mongod that will run the restored files (detected from the binary if omitted)
    #[arg(long)]
    mongod_version: Option<String>,

    #[arg(long, default_value = "")]
    rs_name: String,

    /// Replica set member hosts, comma separated
    #[arg(long, value_delimiter = ',')]
    rs_members: Vec<String>,

    /// Replica set member ids, comma separated, in the order of --rs-members
    #[arg(long, value_delimiter = ',')]
    rs_member_ids: Vec<i32>,

    #[arg(long, default_value = "")]
    shard_name: String,

    #[arg(long, default_value = "")]
    mongocfg_connection_string: String,

    /// Shard connection strings shaped name/host:port,host:port
    #[arg(long, num_args = 1..)]
    shard_connection_strings: Vec<String>,
}

impl RestoreArgs {
    fn into_request(self, target_version: String) -> Result<RestoreRequest> {
        let rs_config = RsConfig::new(self.rs_name, self.rs_members, self.rs_member_ids)
            .context("Invalid replica set configuration")?;
        let sh_config = ShConfig {
            shard_name: self.shard_name,
            mongocfg_connection_string: self.mongocfg_connection_string,
        };
        sh_config.validate().context("Invalid shard configuration")?;
        let cfg_config = MongoCfgConfig::from_connection_strings(&self.shard_connection_strings)
            .context("Invalid shard connection strings")?;

        Ok(RestoreRequest {
            backup_name: self.backup_name,
            target_version,
            rs_config,
            sh_config,
            cfg_config,
        })
    }
}

/// Main entry point for the restore tool
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

/// First interrupt cancels the token, which the restore honours at its next
/// admin session step. Returns on the second interrupt.
async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = next_interrupt().await {
        warn!(error = %e, "unable to listen for interrupts");
        return std::future::pending().await;
    }
    warn!(
        "interrupt received, cancelling restore at the next mongod admin step; press Ctrl-C again to abort immediately"
    );
    cancel.cancel();

    if let Err(e) = next_interrupt().await {
        warn!(error = %e, "unable to listen for interrupts");
        return std::future::pending().await;
    }
    warn!("second interrupt received, aborting restore");
}

async fn run_app() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let app_config = AppConfig::load_from_json(&cli.config)
        .context(format!("Failed to load application configuration from {}", cli.config.display()))?;

    match cli.command {
        Commands::Restore(args) => {
            let target_version = match &args.mongod_version {
                Some(version) => version.clone(),
                None => {
                    let binary = match &app_config.mongod.binary_path {
                        Some(path) => path.clone(),
                        None => utils::find_mongod_executable()?,
                    };
                    utils::detect_mongod_version(&binary)?
                }
            };
            let request = args.into_request(target_version)?;

            let cancel = CancellationToken::new();
            let interrupts = watch_interrupts(tokio::signal::ctrl_c, cancel.clone());

            info!("🔄 Starting Restore Process...");
            tokio::select! {
                result = restore::run_restore_flow(&app_config, &request, cancel) => {
                    result.context("Restore process failed")?;
                }
                () = interrupts => {
                    anyhow::bail!("Restore aborted by a second interrupt");
                }
            }
        }
    }
    Ok(())
}
