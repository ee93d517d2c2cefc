//! Azure adapters
//!
//! Authorization and firewall management against Azure Resource Manager.

mod auth;
mod resource_manager;

pub use auth::{CliAuthorizer, EnvAuthorizer, ServicePrincipal, ServicePrincipalAuthorizer};
pub use resource_manager::ArmResourceManager;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Bearer token plus the subscription it is used against.
#[derive(Clone)]
pub struct AzureCredential {
    pub access_token: String,
    pub subscription_id: String,
}

impl fmt::Debug for AzureCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureCredential")
            .field("access_token", &"***")
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// Resource for tokens issued against the given management endpoint.
pub fn token_resource(resource_manager_endpoint: &str) -> String {
    format!("{}/", resource_manager_endpoint.trim_end_matches('/'))
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("mysql-deploy/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Render an ARM error response body for humans.
pub(crate) fn describe_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => format!(
            "{} ({}): {}",
            status,
            error.code.unwrap_or_else(|| "Unknown".to_string()),
            error.message.unwrap_or_default()
        ),
        Err(_) if body.trim().is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status, body.trim()),
    }
}
