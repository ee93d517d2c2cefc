//! Run a SQL script against an Azure Database for MySQL server from a
//! pipeline step.
//!
//! If the server's firewall blocks the runner, a rule for the runner's
//! address is added for the duration of the run and removed afterwards.

pub mod azure;
pub mod client;
pub mod config;
pub mod connection_string;
pub mod credentials;
pub mod error;
pub mod executor;
pub mod firewall;
pub mod inputs;
pub mod orchestrator;
pub mod probe;
pub mod script;

#[cfg(test)]
mod testing;

pub use config::Settings;
pub use credentials::{Auth, ConnectionTarget, RawCredentials};
pub use error::DeployError;
pub use inputs::DeployInputs;
pub use orchestrator::{Collaborators, Orchestrator, RunSummary};
