//! Step inputs

use crate::credentials::RawCredentials;
use common::ActionEnv;

/// Everything a run needs from the workflow step's `with:` block.
#[derive(Default, Clone)]
pub struct DeployInputs {
    pub credentials: RawCredentials,
    pub sql_file: Option<String>,
    pub arguments: Option<String>,
}

impl DeployInputs {
    /// Read inputs from `INPUT_*` environment variables.
    ///
    /// Required-ness is checked by the run itself so that credential
    /// conflicts are reported before a missing script path.
    pub fn from_env() -> Self {
        Self {
            credentials: RawCredentials {
                server_name: ActionEnv::input("server-name"),
                username: ActionEnv::input("username"),
                password: ActionEnv::input("password"),
                database: ActionEnv::input("database"),
                connection_string: ActionEnv::input("connection-string"),
            },
            sql_file: ActionEnv::input("sql-file"),
            arguments: ActionEnv::input("arguments"),
        }
    }

    /// Values that must be masked in the job log.
    pub fn secrets(&self) -> Vec<String> {
        let mut secrets = Vec::new();
        if let Some(password) = &self.credentials.password {
            secrets.push(password.clone());
        }
        if let Some(raw) = &self.credentials.connection_string {
            secrets.push(raw.clone());
            if let Ok(parsed) = crate::connection_string::ConnectionString::parse(raw) {
                secrets.push(parsed.password);
            }
        }
        secrets.retain(|s| !s.is_empty());
        secrets
    }
}
