//! Reachability probing
//!
//! A throwaway `SELECT 1` tells us whether the runner can already reach the
//! server. When the server's firewall rejects us, its error message carries
//! the public address it saw, which is exactly what the firewall rule needs.

use crate::client::ClientConnection;
use crate::credentials::ConnectionTarget;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// What the probe learned about the runner's access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The connection succeeded.
    AlreadyAllowed,
    /// The firewall rejected this address.
    Blocked { caller_address: String },
    /// The connection failed for another reason. Provisioning is skipped and
    /// the script execution surfaces the real error.
    Inconclusive { reason: String },
}

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn detect_caller_address(&self, target: &ConnectionTarget) -> ProbeOutcome;
}

/// Pull the caller address out of an Azure firewall rejection.
///
/// Matches `Client with IP address '1.2.3.4' is not allowed to connect to
/// this MySQL server`, as returned by both single and flexible servers.
pub fn extract_caller_address(message: &str) -> Option<String> {
    const MARKER: &str = "Client with IP address '";

    let start = message.find(MARKER)? + MARKER.len();
    let rest = &message[start..];
    let end = rest.find('\'')?;
    let address = &rest[..end];

    let looks_like_ip = !address.is_empty()
        && address
            .chars()
            .all(|c| c.is_ascii_hexdigit() || c == '.' || c == ':');
    if looks_like_ip && rest[end..].contains("not allowed to connect") {
        Some(address.to_string())
    } else {
        None
    }
}

/// Probe backed by the mysql client binary.
pub struct MysqlProbe {
    client: String,
}

impl MysqlProbe {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for MysqlProbe {
    async fn detect_caller_address(&self, target: &ConnectionTarget) -> ProbeOutcome {
        let conn = match ClientConnection::from_target(target) {
            Ok(c) => c,
            Err(e) => {
                return ProbeOutcome::Inconclusive {
                    reason: format!("{:#}", e),
                }
            }
        };

        let mut args = conn.login_args();
        args.push("-e".to_string());
        args.push("SELECT 1".to_string());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = match common::run(&self.client, &args).await {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "Could not run mysql client for reachability probe");
                return ProbeOutcome::Inconclusive {
                    reason: format!("{:#}", e),
                };
            }
        };

        if output.success {
            info!(server = %target.server(), "Runner can already reach the server");
            return ProbeOutcome::AlreadyAllowed;
        }

        debug!(exit = %output.code_text(), stderr = %output.stderr, "Probe connection failed");
        match extract_caller_address(&output.stderr) {
            Some(caller_address) => {
                info!(address = %caller_address, "Server firewall blocks the runner");
                ProbeOutcome::Blocked { caller_address }
            }
            None => ProbeOutcome::Inconclusive {
                reason: output.stderr,
            },
        }
    }
}
