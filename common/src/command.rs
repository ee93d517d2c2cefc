//! Command execution utilities
//!
//! Provides consistent command execution with proper error handling and logging.
//! Arguments carrying secrets are redacted before they reach the log.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Argument prefix whose value must never be logged.
const PASSWORD_PREFIX: &str = "--password=";

/// mysql's short password flag, which takes its value attached (`-psecret`).
const MYSQL_SHORT_PASSWORD: &str = "-p";

/// Result of a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Exit code as text, `signal` when the process was killed.
    pub fn code_text(&self) -> String {
        self.code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string())
    }
}

/// Whether `cmd` is one of the mysql client binaries.
fn is_mysql_client(cmd: &str) -> bool {
    Path::new(cmd)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with("mysql"))
}

/// Replace secret-bearing arguments with a placeholder.
///
/// `-p<value>` is only treated as a password for mysql clients.
pub fn redact_args(cmd: &str, args: &[&str]) -> Vec<String> {
    let mut prefixes = vec![PASSWORD_PREFIX];
    if is_mysql_client(cmd) {
        prefixes.push(MYSQL_SHORT_PASSWORD);
    }

    args.iter()
        .map(|arg| {
            match prefixes
                .iter()
                .find(|prefix| arg.starts_with(**prefix) && arg.len() > prefix.len())
            {
                Some(prefix) => format!("{}***", prefix),
                None => arg.to_string(),
            }
        })
        .collect()
}

/// Run a command and return its output.
///
/// This is a low-level function that returns both stdout and stderr.
/// Use `run_checked` if you want to treat non-zero exit as an error.
#[instrument(skip_all, fields(cmd = %cmd))]
pub async fn run(cmd: &str, args: &[&str]) -> Result<CommandOutput> {
    debug!(args = ?redact_args(cmd, args), "Running command");

    let output = Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .context(format!("Failed to execute {}", cmd))?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        success: output.status.success(),
        code: output.status.code(),
    })
}

/// Run a command and return stdout if successful, error otherwise.
///
/// # Example
/// ```ignore
/// let version = run_checked("mysql", &["--version"]).await?;
/// ```
pub async fn run_checked(cmd: &str, args: &[&str]) -> Result<String> {
    let output = run(cmd, args).await?;
    if output.success {
        Ok(output.stdout)
    } else {
        Err(anyhow!(
            "{} failed (exit {}): {}",
            cmd,
            output.code_text(),
            output.stderr
        ))
    }
}
