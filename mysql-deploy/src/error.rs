//! Terminal errors of a deploy run
//!
//! Every variant's `Display` is the single message reported for the run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Cannot specify both username and connection string")]
    ConflictingAuth,

    #[error("Need to specify either username and password or connection-string")]
    MissingAuth,

    #[error("Input required and not supplied: {0}")]
    MissingInput(&'static str),

    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    #[error("Invalid sql file path provided as input {0}")]
    InvalidScriptPath(String),

    #[error("Failed to add firewall rule for {address}: {source:#}")]
    FirewallAcquire {
        address: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to execute sql file: {0:#}")]
    Execute(#[source] anyhow::Error),

    #[error("Failed to remove firewall rule {rule}: {source:#}")]
    FirewallRelease {
        rule: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type Result<T> = std::result::Result<T, DeployError>;
