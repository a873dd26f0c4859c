use anyhow::{Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use which::which;

/// Finds the mongod executable in the system PATH.
pub fn find_mongod_executable() -> Result<PathBuf> {
    which("mongod").context("mongod executable not found in PATH. Please ensure MongoDB server binaries are installed and in your PATH, or set mongod.binary_path in config.json.")
}

/// Asks `mongod --version` which release the local binary is.
pub fn detect_mongod_version(mongod: &Path) -> Result<String> {
    let output = Command::new(mongod)
        .arg("--version")
        .output()
        .with_context(|| format!("Failed to execute {} --version", mongod.display()))?;

    if !output.status.success() {
        return Err(anyhow::anyhow!(
            "{} --version failed with status: {}\nStderr: {}",
            mongod.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr)
        ));
    }

    parse_mongod_version(&String::from_utf8_lossy(&output.stdout))
}

fn parse_mongod_version(output: &str) -> Result<String> {
    let re = Regex::new(r"db version v?(\d+\.\d+(?:\.\d+)?)")?;
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .with_context(|| format!("Unable to find a version in mongod output: {}", output.trim()))
}
