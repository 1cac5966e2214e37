//! Error types for devfixture with categorization:
//!
//! - **Validation errors**: configuration, unreadable catalogs (exit code 1)
//! - **System errors**: IO, external commands, staging and restore steps (exit code 2)
//! - **Not found**: missing tools or no matching fixture (exit code 3)
//! - **Recovered**: a restore failed and the backup was put back (exit code 4)
//! - **Fatal**: a restore failed and so did the rollback (exit code 5)

use std::path::{Path, PathBuf};

use serde::Serialize;
use strum::{Display, EnumIter, IntoStaticStr};
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A single step of snapshot creation or restoration.
///
/// Carried by staging and restore failures so the operator knows where the
/// pipeline stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, IntoStaticStr, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CopyMedia,
    DumpDatabase,
    Pack,
    Verify,
    Unpack,
    ReplaceMedia,
    DropDatabase,
    CreateDatabase,
    LoadDatabase,
}

/// Top-level error type for every devfixture operation.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// One or more required executables are not on the search path.
    #[error("Missing required executables: {} (required: {})", .missing.join(", "), .required.join(", "))]
    MissingDependency {
        required: Vec<String>,
        missing: Vec<String>,
    },

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A configuration file could not be parsed.
    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    /// A file in the fixtures directory does not follow the naming scheme.
    #[error("Fixture catalog is corrupt: {} ({reason})", .path.display())]
    CatalogCorrupt { path: PathBuf, reason: String },

    /// No fixture in the catalog matches any revision in the history.
    #[error("No matching fixture found: {0}")]
    NoMatchFound(String),

    /// Snapshot creation failed. The staging directory was kept.
    #[error("Snapshot failed during {step}: {source} (staging kept at {})", .staging_dir.display())]
    StagingFailure {
        step: Step,
        staging_dir: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// A restore step failed. The staging directory was kept.
    #[error("Restore failed during {step}: {source} (staging kept at {})", .staging_dir.display())]
    RestoreFailure {
        step: Step,
        staging_dir: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// Restoring the requested fixture failed and the safety backup was put back.
    #[error(
        "Restore of {} failed and was rolled back from {}: {cause}",
        .fixture.display(),
        .backup.display()
    )]
    RolledBack {
        fixture: PathBuf,
        backup: PathBuf,
        #[source]
        cause: Box<Error>,
    },

    /// Both the restore and the rollback failed. Live state is unknown.
    #[error(
        "Restore of {} failed ({restore}) and rollback from {} also failed ({rollback})",
        .fixture.display(),
        .backup.display()
    )]
    RollbackFailure {
        fixture: PathBuf,
        backup: PathBuf,
        restore: Box<Error>,
        rollback: Box<Error>,
    },

    /// An external command exited unsuccessfully.
    #[error("Command '{command}' failed with exit code {exit_code:?}: {stderr}")]
    Command {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Filesystem or archive IO failed.
    #[error("IO error: {0}")]
    Io(String),
}

// Convenience constructors
impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// IO error annotated with the path that caused it.
    pub fn io_at(path: &Path, err: &std::io::Error) -> Self {
        Self::Io(format!("{}: {err}", path.display()))
    }

    pub fn catalog_corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CatalogCorrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn staging(step: Step, staging_dir: impl Into<PathBuf>, source: Self) -> Self {
        Self::StagingFailure {
            step,
            staging_dir: staging_dir.into(),
            source: Box::new(source),
        }
    }

    pub fn restore(step: Step, staging_dir: impl Into<PathBuf>, source: Self) -> Self {
        Self::RestoreFailure {
            step,
            staging_dir: staging_dir.into(),
            source: Box::new(source),
        }
    }
}

impl Error {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit code scheme:
    /// - 1: User error (configuration, corrupt catalog)
    /// - 2: System error (IO, external commands, staging/restore steps)
    /// - 3: Not found (missing executables, no matching fixture)
    /// - 4: Restore failed but live state was rolled back
    /// - 5: Restore and rollback both failed
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) | Self::ConfigParse(_) | Self::CatalogCorrupt { .. } => 1,
            Self::StagingFailure { .. }
            | Self::RestoreFailure { .. }
            | Self::Command { .. }
            | Self::Io(_) => 2,
            Self::MissingDependency { .. } | Self::NoMatchFound(_) => 3,
            Self::RolledBack { .. } => 4,
            Self::RollbackFailure { .. } => 5,
        }
    }

    /// Machine-readable error code for JSON output.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingDependency { .. } => "MISSING_DEPENDENCY",
            Self::Configuration(_) => "CONFIGURATION",
            Self::ConfigParse(_) => "CONFIG_PARSE",
            Self::CatalogCorrupt { .. } => "CATALOG_CORRUPT",
            Self::NoMatchFound(_) => "NO_MATCH_FOUND",
            Self::StagingFailure { .. } => "STAGING_FAILURE",
            Self::RestoreFailure { .. } => "RESTORE_FAILURE",
            Self::RolledBack { .. } => "ROLLED_BACK",
            Self::RollbackFailure { .. } => "ROLLBACK_FAILURE",
            Self::Command { .. } => "COMMAND_FAILED",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// A hint for the operator, when there is something useful to say.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::MissingDependency { missing, .. } => Some(format!(
                "Install {} and make sure it is on PATH",
                missing.join(", ")
            )),
            Self::Configuration(_) | Self::ConfigParse(_) => Some(
                "Check .devfixture/config.toml, DEVFIXTURE_* environment variables and CLI flags"
                    .to_string(),
            ),
            Self::CatalogCorrupt { path, .. } => Some(format!(
                "Remove or rename {} so the fixtures directory only holds fixture archives",
                path.display()
            )),
            Self::NoMatchFound(_) => Some(
                "Create a fixture for a revision in the current history, or pass --fixture-file"
                    .to_string(),
            ),
            Self::StagingFailure { staging_dir, .. } | Self::RestoreFailure { staging_dir, .. } => {
                Some(format!(
                    "Inspect {} for partial output, then remove it",
                    staging_dir.display()
                ))
            }
            Self::RolledBack { backup, .. } => Some(format!(
                "Live state was restored from {}",
                backup.display()
            )),
            Self::RollbackFailure { backup, .. } => Some(format!(
                "Put the safety backup back with 'devfixture restore -f {}'",
                backup.display()
            )),
            Self::Command { .. } | Self::Io(_) => None,
        }
    }

    /// True when the live database and media tree may be inconsistent.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::RollbackFailure { .. })
    }

    /// True when a failed restore was undone from the safety backup.
    pub const fn is_recovered(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }

    /// Every staging directory left on disk by this error or any nested cause.
    pub fn retained_staging_dirs(&self) -> Vec<PathBuf> {
        match self {
            Self::StagingFailure {
                staging_dir,
                source,
                ..
            }
            | Self::RestoreFailure {
                staging_dir,
                source,
                ..
            } => std::iter::once(staging_dir.clone())
                .chain(source.retained_staging_dirs())
                .collect(),
            Self::RolledBack { cause, .. } => cause.retained_staging_dirs(),
            Self::RollbackFailure {
                restore, rollback, ..
            } => restore
                .retained_staging_dirs()
                .into_iter()
                .chain(rollback.retained_staging_dirs())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Io(format!("archive: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("json: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd_error() -> Error {
        Error::Command {
            command: "psql devdb".to_string(),
            exit_code: Some(1),
            stderr: "boom".to_string(),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::configuration("x").exit_code(), 1);
        assert_eq!(Error::ConfigParse("x".into()).exit_code(), 1);
        assert_eq!(Error::catalog_corrupt("a", "b").exit_code(), 1);
        assert_eq!(cmd_error().exit_code(), 2);
        assert_eq!(Error::io("x").exit_code(), 2);
        assert_eq!(Error::NoMatchFound("x".into()).exit_code(), 3);
        assert_eq!(
            Error::MissingDependency {
                required: vec!["git".into()],
                missing: vec!["git".into()],
            }
            .exit_code(),
            3
        );
    }

    #[test]
    fn test_missing_dependency_display_lists_missing() {
        let err = Error::MissingDependency {
            required: vec!["psql".into(), "pg_dump".into()],
            missing: vec!["pg_dump".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("pg_dump"));
        assert!(err.suggestion().is_some_and(|s| s.contains("pg_dump")));
    }

    #[test]
    fn test_step_display_is_snake_case() {
        assert_eq!(Step::LoadDatabase.to_string(), "load_database");
        assert_eq!(Step::CopyMedia.to_string(), "copy_media");
    }

    #[test]
    fn test_recovered_and_fatal_flags() {
        let rolled = Error::RolledBack {
            fixture: "f.zip".into(),
            backup: "b.zip".into(),
            cause: Box::new(cmd_error()),
        };
        assert!(rolled.is_recovered());
        assert!(!rolled.is_fatal());
        assert_eq!(rolled.exit_code(), 4);

        let fatal = Error::RollbackFailure {
            fixture: "f.zip".into(),
            backup: "b.zip".into(),
            restore: Box::new(cmd_error()),
            rollback: Box::new(cmd_error()),
        };
        assert!(fatal.is_fatal());
        assert!(!fatal.is_recovered());
        assert_eq!(fatal.exit_code(), 5);
    }

    #[test]
    fn test_retained_staging_dirs_are_collected_through_nesting() {
        let restore = Error::restore(Step::LoadDatabase, "/tmp/a", cmd_error());
        let rollback = Error::restore(Step::Unpack, "/tmp/b", Error::io("bad zip"));
        let fatal = Error::RollbackFailure {
            fixture: "f.zip".into(),
            backup: "b.zip".into(),
            restore: Box::new(restore),
            rollback: Box::new(rollback),
        };
        assert_eq!(
            fatal.retained_staging_dirs(),
            vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/b")]
        );
    }

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            Error::configuration("x"),
            Error::ConfigParse("x".into()),
            Error::catalog_corrupt("a", "b"),
            Error::NoMatchFound("x".into()),
            cmd_error(),
            Error::io("x"),
        ];
        let mut codes: Vec<_> = errors.iter().map(Error::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
