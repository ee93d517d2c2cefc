//! Deploy step configuration from environment variables

use common::{ActionEnv, ConfigExt};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings that are not step inputs.
#[derive(Clone)]
pub struct Settings {
    pub mysql_client: String,
    pub az_cli: String,
    pub resource_manager_endpoint: String,
    pub authority_host: String,
    /// Service principal JSON, as produced by `az ad sp create-for-rbac --sdk-auth`.
    pub azure_credentials: Option<String>,
    pub subscription_id: Option<String>,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub http_timeout: Duration,
    pub workspace: Option<PathBuf>,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Self {
        Self {
            mysql_client: String::env_or("MYSQL_CLIENT", "mysql"),
            az_cli: String::env_or("AZ_CLI", "az"),
            resource_manager_endpoint: String::env_or(
                "AZURE_RESOURCE_MANAGER_ENDPOINT",
                "https://management.azure.com",
            )
            .trim_end_matches('/')
            .to_string(),
            authority_host: String::env_or(
                "AZURE_AUTHORITY_HOST",
                "https://login.microsoftonline.com",
            )
            .trim_end_matches('/')
            .to_string(),
            azure_credentials: env::var("AZURE_CREDENTIALS")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            subscription_id: env::var("AZURE_SUBSCRIPTION_ID")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            poll_interval: Duration::from_secs(u64::env_parse(
                "MYSQL_DEPLOY_POLL_INTERVAL_SECS",
                2,
            )),
            poll_timeout: Duration::from_secs(u64::env_parse(
                "MYSQL_DEPLOY_POLL_TIMEOUT_SECS",
                300,
            )),
            http_timeout: Duration::from_secs(u64::env_parse(
                "MYSQL_DEPLOY_HTTP_TIMEOUT_SECS",
                30,
            )),
            workspace: ActionEnv::workspace(),
        }
    }
}
