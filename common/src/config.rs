//! Environment variable parsing helpers
//!
//! Provides ergonomic helpers for reading configuration and pipeline step
//! inputs from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Extension trait for parsing environment variables.
///
/// Provides convenient methods for reading env vars with defaults
/// and type parsing.
pub trait ConfigExt {
    /// Get an environment variable with a default value.
    ///
    /// # Example
    /// ```ignore
    /// let client = String::env_or("MYSQL_CLIENT", "mysql");
    /// ```
    fn env_or(name: &str, default: &str) -> String {
        env::var(name).unwrap_or_else(|_| default.to_string())
    }

    /// Get an environment variable parsed as a specific type.
    ///
    /// Returns `default` if the variable is not set or fails to parse.
    ///
    /// # Example
    /// ```ignore
    /// let interval: u64 = u64::env_parse("MYSQL_DEPLOY_POLL_INTERVAL_SECS", 2);
    /// ```
    fn env_parse<T: FromStr>(name: &str, default: T) -> T {
        env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

// Blanket implementation for all types
impl<T> ConfigExt for T {}

/// GitHub Actions environment helpers.
///
/// Step inputs arrive as `INPUT_<NAME>` variables with the name upper-cased
/// and spaces replaced by underscores. Hyphens are kept as-is.
pub struct ActionEnv;

impl ActionEnv {
    /// Environment variable name carrying the given input.
    pub fn input_var(name: &str) -> String {
        format!("INPUT_{}", name.replace(' ', "_").to_uppercase())
    }

    /// Read an optional input. Blank values count as absent.
    pub fn input(name: &str) -> Option<String> {
        env::var(Self::input_var(name))
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Checkout directory of the workflow, if any.
    pub fn workspace() -> Option<PathBuf> {
        env::var("GITHUB_WORKSPACE").ok().map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_var_keeps_hyphens() {
        assert_eq!(ActionEnv::input_var("server-name"), "INPUT_SERVER-NAME");
        assert_eq!(ActionEnv::input_var("sql file"), "INPUT_SQL_FILE");
    }
}
