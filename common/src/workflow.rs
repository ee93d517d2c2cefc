//! Workflow commands for reporting to the CI runner
//!
//! The runner scans step stdout for `::command::value` lines. We use them to
//! mark the step failed with a single message and to mask secrets in logs.

use tracing::error;

/// Escape data for a workflow command value.
fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// Format a workflow command line.
pub fn command_line(command: &str, value: &str) -> String {
    format!("::{}::{}", command, escape_data(value))
}

/// Ask the runner to mask a secret in all subsequent log output.
pub fn add_mask(secret: &str) {
    if secret.is_empty() {
        return;
    }
    println!("{}", command_line("add-mask", secret));
}

/// Report the step as failed.
///
/// Logs the message and emits the `error` workflow command. The caller is
/// responsible for exiting non-zero.
pub fn set_failed(message: &str) {
    error!("{}", message);
    println!("{}", command_line("error", message));
}
