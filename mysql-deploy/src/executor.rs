//! Script execution through the mysql client

use crate::client::{split_arguments, ClientConnection};
use crate::credentials::ConnectionTarget;
use crate::script::ScriptReference;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait ScriptExecutor: Send + Sync {
    async fn execute(&self, target: &ConnectionTarget, script: &ScriptReference) -> Result<()>;
}

/// Build the full client argument list for running `script`.
pub fn script_args(conn: &ClientConnection, script: &ScriptReference) -> Vec<String> {
    let mut args = conn.login_args();
    if let Some(arguments) = script.arguments() {
        args.extend(split_arguments(arguments));
    }
    if let Some(database) = conn.database() {
        args.push(database.to_string());
    }
    args.push("-e".to_string());
    args.push(format!("source {}", script.path().display()));
    args
}

/// Executor backed by the mysql client binary.
pub struct MysqlExecutor {
    client: String,
}

impl MysqlExecutor {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            client: client.into(),
        }
    }
}

#[async_trait]
impl ScriptExecutor for MysqlExecutor {
    async fn execute(&self, target: &ConnectionTarget, script: &ScriptReference) -> Result<()> {
        let conn = ClientConnection::from_target(target)?;
        let args = script_args(&conn, script);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        info!(script = %script.path().display(), server = %target.server(), "Executing sql file");

        let output = common::run(&self.client, &args).await?;
        if !output.success {
            return Err(anyhow!(
                "mysql exited with {}: {}",
                output.code_text(),
                output.stderr
            ));
        }

        for line in output.stdout.lines() {
            info!("  {}", line);
        }
        info!("Successfully executed sql file on target database");
        Ok(())
    }
}
