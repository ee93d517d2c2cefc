//! Credential resolution
//!
//! Turns the loosely related credential inputs into a single [`ConnectionTarget`].
//! Everything downstream consumes the resolved [`Auth`] variant and never
//! looks at the raw inputs again.

use crate::connection_string::ConnectionString;
use crate::error::{DeployError, Result};
use std::fmt;

/// Credential inputs as supplied to the step, before validation.
#[derive(Default, Clone)]
pub struct RawCredentials {
    pub server_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub connection_string: Option<String>,
}

/// How the client authenticates against the server.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    UsernamePassword {
        username: String,
        password: String,
        database: Option<String>,
    },
    /// Kept verbatim; the client adapters parse it at point of use.
    ConnectionString { raw: String },
}

/// Resolved, immutable description of how to reach the database.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    server: String,
    auth: Auth,
}

impl ConnectionTarget {
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::UsernamePassword {
                username, database, ..
            } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"***")
                .field("database", database)
                .finish(),
            Auth::ConnectionString { .. } => f
                .debug_struct("ConnectionString")
                .field("raw", &"***")
                .finish(),
        }
    }
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("server", &self.server)
            .field("auth", &self.auth)
            .finish()
    }
}

/// Validate credential inputs and build the connection target.
///
/// Pure validation: no network or cloud calls happen here.
pub fn resolve(raw: RawCredentials) -> Result<ConnectionTarget> {
    match (raw.username, raw.connection_string) {
        (Some(_), Some(_)) => Err(DeployError::ConflictingAuth),
        (None, None) => Err(DeployError::MissingAuth),
        (Some(username), None) => {
            let password = raw.password.ok_or(DeployError::MissingInput("password"))?;
            let server = raw
                .server_name
                .ok_or(DeployError::MissingInput("server-name"))?;
            Ok(ConnectionTarget {
                server,
                auth: Auth::UsernamePassword {
                    username,
                    password,
                    database: raw.database,
                },
            })
        }
        (None, Some(raw_string)) => {
            let parsed = ConnectionString::parse(&raw_string)
                .map_err(|e| DeployError::InvalidConnectionString(e.to_string()))?;
            let server = raw.server_name.unwrap_or(parsed.server);
            Ok(ConnectionTarget {
                server,
                auth: Auth::ConnectionString { raw: raw_string },
            })
        }
    }
}
