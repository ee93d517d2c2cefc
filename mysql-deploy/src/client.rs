//! mysql command-line client invocation
//!
//! Both the reachability probe and the script executor talk to the server
//! through the `mysql` client binary, the same way the rest of our tooling
//! shells out to database clients.

use crate::connection_string::ConnectionString;
use crate::credentials::{Auth, ConnectionTarget};
use anyhow::{Context, Result};

/// Connection flags for one client invocation.
pub struct ClientConnection {
    host: String,
    port: Option<u16>,
    user: String,
    password: String,
    database: Option<String>,
    ssl_mode: Option<&'static str>,
}

impl ClientConnection {
    /// Derive client flags from a resolved target.
    ///
    /// In connection-string mode the string is parsed here; the host is
    /// always the resolved server of the target.
    pub fn from_target(target: &ConnectionTarget) -> Result<Self> {
        match target.auth() {
            Auth::UsernamePassword {
                username,
                password,
                database,
            } => Ok(Self {
                host: target.server().to_string(),
                port: None,
                user: username.clone(),
                password: password.clone(),
                database: database.clone(),
                ssl_mode: None,
            }),
            Auth::ConnectionString { raw } => {
                let parsed = ConnectionString::parse(raw).context("Invalid connection string")?;
                let ssl_mode = parsed.client_ssl_mode();
                Ok(Self {
                    host: target.server().to_string(),
                    port: parsed.port,
                    user: parsed.user,
                    password: parsed.password,
                    database: parsed.database,
                    ssl_mode,
                })
            }
        }
    }

    /// Arguments that open a session, without selecting a database.
    pub fn login_args(&self) -> Vec<String> {
        let mut args = vec!["-h".to_string(), self.host.clone()];
        if let Some(port) = self.port {
            args.push("-P".to_string());
            args.push(port.to_string());
        }
        args.push("-u".to_string());
        args.push(self.user.clone());
        args.push(format!("--password={}", self.password));
        if let Some(mode) = self.ssl_mode {
            args.push(format!("--ssl-mode={}", mode));
        }
        args
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }
}

/// Split a pass-through argument string into words.
///
/// Whitespace separates words; single or double quotes group a word and are
/// removed.
pub fn split_arguments(arguments: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in arguments.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if in_word {
        words.push(current);
    }
    words
}
