//! Database dump strategies
//!
//! Each engine shells out to its client tool and captures stdout into the
//! dump file. The exit status is always checked: a failed dump must surface
//! as an error, never as a silently empty file handed to the uploader.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("dump tool '{tool}' not found in PATH")]
    ToolMissing { tool: String },

    #[error("failed to run '{tool}': {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("'{tool}' exited with status {code:?}: {stderr}")]
    Failed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("dump of database '{database}' produced no output")]
    Empty { database: String },

    #[error("failed to write dump file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Known dump engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dumper {
    MySql,
    Postgres,
}

impl Dumper {
    /// Resolve an engine by name; unknown names yield `None`
    pub fn resolve(engine: &str) -> Option<Self> {
        match engine.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => {
                info!("No dump strategy found for engine '{}', skipping", engine);
                None
            }
        }
    }

    /// Client tool this engine invokes
    fn tool(&self) -> &'static str {
        match self {
            Self::MySql => "mysqldump",
            Self::Postgres => "pg_dump",
        }
    }

    /// Dump `database` into the file at `dest`
    pub fn dump(
        &self,
        database: &str,
        user: &str,
        password: &str,
        dest: &Path,
    ) -> Result<(), DumpError> {
        let tool = self.tool();
        which::which(tool).map_err(|_| DumpError::ToolMissing {
            tool: tool.to_string(),
        })?;

        info!("Dumping database '{}' to {}...", database, dest.display());

        let mut cmd = Command::new(tool);
        match self {
            Self::MySql => {
                cmd.args(["-u", user, &format!("-p{}", password), database]);
            }
            Self::Postgres => {
                cmd.args(["-U", user, database]).env("PGPASSWORD", password);
            }
        }
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let output = cmd.output().map_err(|source| DumpError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

        if !output.status.success() {
            return Err(DumpError::Failed {
                tool: tool.to_string(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if output.stdout.is_empty() {
            return Err(DumpError::Empty {
                database: database.to_string(),
            });
        }

        fs::write(dest, &output.stdout).map_err(|source| DumpError::Write {
            path: dest.to_path_buf(),
            source,
        })?;

        info!("Database dump done ({} bytes).", output.stdout.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_engines() {
        assert_eq!(Dumper::resolve("mysql"), Some(Dumper::MySql));
        assert_eq!(Dumper::resolve("mariadb"), Some(Dumper::MySql));
        assert_eq!(Dumper::resolve("MariaDB"), Some(Dumper::MySql));
        assert_eq!(Dumper::resolve("postgres"), Some(Dumper::Postgres));
        assert_eq!(Dumper::resolve("postgresql"), Some(Dumper::Postgres));
    }

    #[test]
    fn test_resolve_unknown_engine_is_none() {
        assert_eq!(Dumper::resolve("mongodb"), None);
        assert_eq!(Dumper::resolve(""), None);
    }

    #[test]
    fn test_engines_use_expected_tools() {
        assert_eq!(Dumper::MySql.tool(), "mysqldump");
        assert_eq!(Dumper::Postgres.tool(), "pg_dump");
    }

    #[test]
    fn test_missing_tool_is_reported() {
        // Resolvable engine, but the client tool is absent from PATH in a way
        // we can force by checking a dumper whose tool cannot exist
        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("out.sql");

        let saved_path = std::env::var_os("PATH");
        std::env::set_var("PATH", tmp.path());
        let result = Dumper::MySql.dump("db", "root", "pwd", &dest);
        match saved_path {
            Some(p) => std::env::set_var("PATH", p),
            None => std::env::remove_var("PATH"),
        }

        assert!(matches!(result, Err(DumpError::ToolMissing { .. })));
        assert!(!dest.exists());
    }
}
