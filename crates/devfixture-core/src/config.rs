//! Configuration loading and management
//!
//! # Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config: ~/.config/devfixture/config.toml
//! 3. Project config: .devfixture/config.toml
//! 4. Environment variables: `DEVFIXTURE_*`
//! 5. CLI flags
//!
//! The result is resolved once into an immutable [`FixtureConfig`] that the
//! orchestrator owns for the rest of the run.
//!
//! # Example Config
//!
//! ```toml
//! database = "myapp_dev"
//! media_root = "var/media"
//! fixtures_dir = "fixtures"
//! backup_dir = "fixtures/backups"
//! recovery_log = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;
const PROJECT_CONFIG: &str = ".devfixture/config.toml";

// ═══════════════════════════════════════════════════════════════════════════
// CONFIGURATION STRUCTURES
// ═══════════════════════════════════════════════════════════════════════════

/// Raw, not yet validated settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub database: Option<String>,
    pub media_root: Option<PathBuf>,
    pub fixtures_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub staging_dir: Option<PathBuf>,
    pub repository: PathBuf,
    pub recovery_log: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: None,
            media_root: None,
            fixtures_dir: PathBuf::from("fixtures"),
            backup_dir: PathBuf::from("fixtures/backups"),
            staging_dir: None,
            repository: PathBuf::from("."),
            recovery_log: true,
        }
    }
}

/// Partial settings with `Option<T>` fields for explicit-key merge semantics.
///
/// Only keys present in a file become `Some`; everything else keeps the
/// lower-precedence value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialSettings {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub media_root: Option<PathBuf>,
    #[serde(default)]
    pub fixtures_dir: Option<PathBuf>,
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    #[serde(default)]
    pub repository: Option<PathBuf>,
    #[serde(default)]
    pub recovery_log: Option<bool>,
}

/// Validated, absolute configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureConfig {
    pub database: String,
    pub media_root: PathBuf,
    pub fixtures_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub staging_dir: Option<PathBuf>,
    pub repository: PathBuf,
    pub recovery_log: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// MERGING
// ═══════════════════════════════════════════════════════════════════════════

impl Settings {
    /// Merge partial settings, only updating fields that are `Some(value)`.
    pub fn merge_partial(&mut self, partial: PartialSettings) {
        if let Some(database) = partial.database {
            self.database = Some(database);
        }
        if let Some(media_root) = partial.media_root {
            self.media_root = Some(media_root);
        }
        if let Some(fixtures_dir) = partial.fixtures_dir {
            self.fixtures_dir = fixtures_dir;
        }
        if let Some(backup_dir) = partial.backup_dir {
            self.backup_dir = backup_dir;
        }
        if let Some(staging_dir) = partial.staging_dir {
            self.staging_dir = Some(staging_dir);
        }
        if let Some(repository) = partial.repository {
            self.repository = repository;
        }
        if let Some(recovery_log) = partial.recovery_log {
            self.recovery_log = recovery_log;
        }
    }

    /// Apply `DEVFIXTURE_*` environment variables.
    pub fn apply_env_vars(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut partial = PartialSettings {
            database: lookup("DEVFIXTURE_DATABASE"),
            media_root: lookup("DEVFIXTURE_MEDIA_ROOT").map(PathBuf::from),
            fixtures_dir: lookup("DEVFIXTURE_FIXTURES_DIR").map(PathBuf::from),
            backup_dir: lookup("DEVFIXTURE_BACKUP_DIR").map(PathBuf::from),
            staging_dir: lookup("DEVFIXTURE_STAGING_DIR").map(PathBuf::from),
            repository: lookup("DEVFIXTURE_REPOSITORY").map(PathBuf::from),
            recovery_log: None,
        };

        if let Some(value) = lookup("DEVFIXTURE_RECOVERY_LOG") {
            partial.recovery_log = Some(parse_bool(&value).map_err(|e| {
                Error::configuration(format!("Invalid DEVFIXTURE_RECOVERY_LOG value: {e}"))
            })?);
        }

        self.merge_partial(partial);
        Ok(())
    }

    /// Validate and make every path absolute.
    ///
    /// Relative paths are taken relative to the current directory.
    pub fn resolve(self) -> Result<FixtureConfig> {
        let database = self
            .database
            .map(|db| db.trim().to_string())
            .filter(|db| !db.is_empty())
            .ok_or_else(|| {
                Error::configuration(
                    "no database configured (set `database`, DEVFIXTURE_DATABASE or --database)",
                )
            })?;

        let media_root = self.media_root.ok_or_else(|| {
            Error::configuration(
                "no media root configured (set `media_root`, DEVFIXTURE_MEDIA_ROOT or --media-root)",
            )
        })?;
        let media_root = absolute(&media_root)?;
        // A restore interrupted between deleting and copying media leaves the
        // root absent; restoring from the backup must still be possible.
        if !media_root.is_dir() {
            let parent_exists = media_root.parent().is_some_and(Path::is_dir);
            if media_root.exists() || !parent_exists {
                return Err(Error::configuration(format!(
                    "media root {} does not exist or is not a directory",
                    media_root.display()
                )));
            }
            tracing::warn!(
                "media root {} is missing; it will be treated as empty",
                media_root.display()
            );
        }

        Ok(FixtureConfig {
            database,
            media_root,
            fixtures_dir: absolute(&self.fixtures_dir)?,
            backup_dir: absolute(&self.backup_dir)?,
            staging_dir: self.staging_dir.as_deref().map(absolute).transpose()?,
            repository: absolute(&self.repository)?,
            recovery_log: self.recovery_log,
        })
    }
}

fn parse_bool(value: &str) -> std::result::Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(format!("'{other}'. Must be 'true' or 'false'")),
    }
}

/// Absolute form of `path`, with symlinks resolved when it exists.
fn absolute(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path).map_err(|e| Error::io_at(path, &e))?;
    Ok(std::fs::canonicalize(&absolute).unwrap_or(absolute))
}

// ═══════════════════════════════════════════════════════════════════════════
// LOADING
// ═══════════════════════════════════════════════════════════════════════════

/// Load defaults, the global and project files, then the environment.
pub fn load_settings() -> Result<Settings> {
    let global = global_config_path();
    let project = std::env::current_dir()
        .map(|dir| dir.join(PROJECT_CONFIG))
        .ok();

    let mut settings = load_settings_from(global.as_deref(), project.as_deref())?;
    settings.apply_env_vars()?;
    Ok(settings)
}

/// Defaults plus the given files, in order. Missing files are skipped.
pub fn load_settings_from(global: Option<&Path>, project: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();

    for path in [global, project].into_iter().flatten() {
        if let Some(partial) = load_partial_toml_file(path)? {
            tracing::debug!(path = %path.display(), "loaded config file");
            settings.merge_partial(partial);
        }
    }

    Ok(settings)
}

/// Read one TOML file. Returns `Ok(None)` when it does not exist.
pub fn load_partial_toml_file(path: &Path) -> Result<Option<PartialSettings>> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io_at(path, &e)),
    };

    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(Error::configuration(format!(
            "Config file {} exceeds maximum size of {MAX_CONFIG_FILE_SIZE} bytes",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, &e))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| Error::ConfigParse(format!("{}: {e}", path.display())))
}

/// Get path to global config file
fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "devfixture")
        .map(|proj_dirs| proj_dirs.config_dir().join("config.toml"))
}
