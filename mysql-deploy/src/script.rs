//! SQL script resolution

use crate::error::{DeployError, Result};
use std::path::{Path, PathBuf};

/// A validated script to run, plus the client pass-through arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptReference {
    resolved_path: PathBuf,
    arguments: Option<String>,
}

impl ScriptReference {
    /// Resolve `path` and check that it names an existing `.sql` file.
    ///
    /// Relative paths are joined onto `base_dir` (the workflow checkout) when
    /// given, otherwise onto the current directory. Nothing outside the local
    /// filesystem is touched.
    pub fn resolve(path: &str, arguments: Option<String>, base_dir: Option<&Path>) -> Result<Self> {
        let candidate = Path::new(path);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            match base_dir {
                Some(base) => base.join(candidate),
                None => candidate.to_path_buf(),
            }
        };

        let invalid = || DeployError::InvalidScriptPath(joined.display().to_string());

        let is_sql = joined
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"));
        if !is_sql {
            return Err(invalid());
        }

        let resolved_path = joined.canonicalize().map_err(|_| invalid())?;
        if !resolved_path.is_file() {
            return Err(invalid());
        }

        Ok(Self {
            resolved_path,
            arguments: arguments.filter(|a| !a.trim().is_empty()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.resolved_path
    }

    pub fn arguments(&self) -> Option<&str> {
        self.arguments.as_deref()
    }
}
