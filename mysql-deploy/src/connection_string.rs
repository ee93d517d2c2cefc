//! MySQL connection string parsing
//!
//! Accepts ADO.NET style `key=value;` pairs as handed out by the Azure portal,
//! e.g. `Server=x.mysql.database.azure.com; Port=3306; Database=db; Uid=u@x; Pwd=p`.
//! Keys are case-insensitive, values may be quoted, and a leading segment
//! without `=` is taken as the server.

use anyhow::{anyhow, bail, Result};
use std::fmt;

/// Fields of a parsed connection string.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub server: String,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: String,
    pub password: String,
    pub ssl_mode: Option<String>,
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Split on `;` outside of quotes.
fn split_segments(raw: &str) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(c);
                current.push(c);
            }
            (None, ';') => segments.push(std::mem::take(&mut current)),
            (None, c) => current.push(c),
        }
    }

    if quote.is_some() {
        bail!("unterminated quoted value");
    }
    segments.push(current);

    Ok(segments
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut server = None;
        let mut port = None;
        let mut database = None;
        let mut user = None;
        let mut password = None;
        let mut ssl_mode = None;

        for (index, segment) in split_segments(raw)?.iter().enumerate() {
            let Some((key, value)) = segment.split_once('=') else {
                if index == 0 {
                    server = Some(unquote(segment));
                    continue;
                }
                bail!("malformed segment '{}'", segment);
            };

            let value = unquote(value);
            match key.trim().to_lowercase().as_str() {
                "server" | "host" | "data source" | "datasource" | "address" | "addr"
                | "network address" => server = Some(value),
                "port" => {
                    port = Some(
                        value
                            .parse::<u16>()
                            .map_err(|_| anyhow!("invalid port '{}'", value))?,
                    )
                }
                "database" | "initial catalog" => database = Some(value),
                "uid" | "user" | "user id" | "userid" | "username" | "user name" => {
                    user = Some(value)
                }
                "pwd" | "password" => password = Some(value),
                "sslmode" | "ssl mode" | "ssl-mode" => ssl_mode = Some(value),
                _ => {}
            }
        }

        let server = server
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("server is missing"))?;
        let user = user
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("user id is missing"))?;
        let password = password.ok_or_else(|| anyhow!("password is missing"))?;

        Ok(Self {
            server,
            port,
            database: database.filter(|d| !d.is_empty()),
            user,
            password,
            ssl_mode,
        })
    }

    /// Value for the mysql client's `--ssl-mode` flag.
    ///
    /// Connector/NET names (`Preferred`, `Required`, `VerifyCA`, `VerifyFull`)
    /// are mapped onto the client's spelling.
    pub fn client_ssl_mode(&self) -> Option<&'static str> {
        let mode = self.ssl_mode.as_deref()?.to_lowercase().replace(['_', ' '], "");
        match mode.as_str() {
            "none" | "disabled" => Some("DISABLED"),
            "preferred" => Some("PREFERRED"),
            "required" => Some("REQUIRED"),
            "verifyca" => Some("VERIFY_CA"),
            "verifyfull" | "verifyidentity" => Some("VERIFY_IDENTITY"),
            _ => None,
        }
    }
}
