//! Command dispatch: preflight, configuration, then the lifecycle action.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::ArgMatches;
use devfixture_core::{config, tools, Orchestrator, Settings, SystemExecutor};

use crate::output::{self, OutputFormat};

/// Which action to run and the flags that shape it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliArgs {
    pub action: String,
    pub format: OutputFormat,
    pub verbosity: u8,
    pub quiet: bool,
    pub fixture_file: Option<PathBuf>,
    pub overrides: Overrides,
}

/// Command-line values that win over config files and environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub fixtures_dir: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub database: Option<String>,
    pub media_root: Option<PathBuf>,
}

impl Overrides {
    /// Apply on top of loaded settings. An explicit fixtures directory also
    /// moves the default backup location underneath it.
    pub fn apply(self, settings: &mut Settings) {
        if let Some(dir) = self.fixtures_dir {
            if self.backup_dir.is_none() {
                settings.backup_dir = dir.join("backups");
            }
            settings.fixtures_dir = dir;
        }
        if let Some(dir) = self.backup_dir {
            settings.backup_dir = dir;
        }
        if let Some(database) = self.database {
            settings.database = Some(database);
        }
        if let Some(media_root) = self.media_root {
            settings.media_root = Some(media_root);
        }
    }
}

impl CliArgs {
    pub fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let (action, sub) = matches
            .subcommand()
            .context("no action given (expected create, restore or list)")?;
        let path = |id: &str| sub.get_one::<String>(id).map(PathBuf::from);

        Ok(Self {
            action: action.to_string(),
            format: OutputFormat::from_json_flag(sub.get_flag("json")),
            verbosity: sub.get_count("verbose"),
            quiet: sub.get_flag("quiet"),
            fixture_file: path("fixture-file"),
            overrides: Overrides {
                fixtures_dir: path("fixtures-dir"),
                backup_dir: path("backup-dir"),
                database: sub.get_one::<String>("database").cloned(),
                media_root: path("media-root"),
            },
        })
    }

    /// Default tracing directive when `RUST_LOG` is unset.
    pub const fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Run one action end to end.
pub fn run_command(args: CliArgs) -> Result<()> {
    tools::check_dependencies()?;

    let mut settings = config::load_settings()?;
    args.overrides.apply(&mut settings);
    let config = settings.resolve()?;
    tracing::debug!(?config, "resolved configuration");

    let mut orchestrator = Orchestrator::new(config, Arc::new(SystemExecutor));
    let explicit = args.fixture_file.as_deref();

    match args.action.as_str() {
        "create" => {
            let report = orchestrator.create(explicit)?;
            output::print_create(&report, args.format)
        }
        "restore" => {
            let report = orchestrator.restore(explicit)?;
            output::print_restore(&report, args.format)
        }
        "list" => {
            let listing = orchestrator.list()?;
            output::print_list(&listing, args.format)
        }
        other => anyhow::bail!("unknown action: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::build_cli;

    fn parse(args: &[&str]) -> Result<CliArgs> {
        let matches = build_cli().try_get_matches_from(args)?;
        CliArgs::from_matches(&matches)
    }

    #[test]
    fn test_args_from_flags() -> Result<()> {
        let args = parse(&[
            "devfixture",
            "create",
            "--database",
            "app",
            "--media-root",
            "uploads",
            "-f",
            "/tmp/x",
        ])?;
        assert_eq!(args.action, "create");
        assert_eq!(args.format, OutputFormat::Human);
        assert_eq!(args.fixture_file, Some(PathBuf::from("/tmp/x")));
        assert_eq!(args.overrides.database.as_deref(), Some("app"));
        assert_eq!(args.log_level(), "info");
        Ok(())
    }

    #[test]
    fn test_log_level_from_flags() -> Result<()> {
        assert_eq!(parse(&["devfixture", "list", "-q"])?.log_level(), "error");
        assert_eq!(parse(&["devfixture", "list", "-v"])?.log_level(), "debug");
        assert_eq!(parse(&["devfixture", "list", "-vvv"])?.log_level(), "trace");
        Ok(())
    }

    #[test]
    fn test_fixtures_dir_override_moves_backups() {
        let mut settings = Settings::default();
        Overrides {
            fixtures_dir: Some(PathBuf::from("/srv/fx")),
            ..Overrides::default()
        }
        .apply(&mut settings);
        assert_eq!(settings.fixtures_dir, PathBuf::from("/srv/fx"));
        assert_eq!(settings.backup_dir, PathBuf::from("/srv/fx/backups"));
    }

    #[test]
    fn test_explicit_backup_dir_wins() {
        let mut settings = Settings::default();
        Overrides {
            fixtures_dir: Some(PathBuf::from("/srv/fx")),
            backup_dir: Some(PathBuf::from("/srv/safety")),
            ..Overrides::default()
        }
        .apply(&mut settings);
        assert_eq!(settings.backup_dir, PathBuf::from("/srv/safety"));
    }
}
