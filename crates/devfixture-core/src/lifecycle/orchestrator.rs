//! Create and restore sequencing.
//!
//! A restore always takes a safety backup of the live environment first. If
//! applying the requested fixture fails, the backup is applied once. The
//! live database and media root together end up in exactly one of three
//! places: the requested fixture, the pre-restore state, or an explicitly
//! reported indeterminate state.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use chrono::Utc;
use serde::Serialize;

use super::{LifecycleState, StateTracker, StateTransition};
use crate::{
    archive::{ArchiveBuilder, ArchiveCodec, ArchiveRestorer, BuiltArchive, ZipCodec},
    catalog::{select_fixture, DirectoryIndex, FixtureArchive, FixtureIndex},
    config::FixtureConfig,
    naming::{archive_file_path, current_user, FixtureName},
    process::ProcessExecutor,
    recovery::RecoveryLog,
    revision::{GitRevisions, RevisionSource},
    staging::StagingArea,
    tools::PostgresTools,
    Error, Result,
};

// ═══════════════════════════════════════════════════════════════════════════
// REPORTS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateReport {
    pub archive: PathBuf,
    /// Set when the name was generated from the checked-out revision.
    pub revision_id: Option<String>,
    pub entries: Vec<String>,
    pub media_files: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub fixture: PathBuf,
    pub backup: PathBuf,
    /// Set when the fixture was chosen from the catalog.
    pub revision_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedFixture {
    #[serde(flatten)]
    pub archive: FixtureArchive,
    pub name: Option<FixtureName>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogListing {
    pub fixtures_dir: PathBuf,
    pub fixtures: Vec<ListedFixture>,
    pub selected: Option<PathBuf>,
}

// ═══════════════════════════════════════════════════════════════════════════
// ORCHESTRATOR
// ═══════════════════════════════════════════════════════════════════════════

/// Runs create and restore against one configured environment.
pub struct Orchestrator {
    config: FixtureConfig,
    executor: Arc<dyn ProcessExecutor>,
    postgres: PostgresTools,
    codec: Box<dyn ArchiveCodec>,
    revisions: Box<dyn RevisionSource>,
    index: Box<dyn FixtureIndex>,
    user: String,
    tracker: StateTracker,
}

impl Orchestrator {
    /// Zip archives, git history and a directory-scan catalog.
    pub fn new(config: FixtureConfig, executor: Arc<dyn ProcessExecutor>) -> Self {
        let revisions = GitRevisions::new(config.repository.clone(), Arc::clone(&executor));
        let index = DirectoryIndex::new(config.fixtures_dir.clone());
        Self {
            postgres: PostgresTools::new(config.database.clone()),
            codec: Box::new(ZipCodec),
            revisions: Box::new(revisions),
            index: Box::new(index),
            user: current_user(),
            tracker: StateTracker::default(),
            config,
            executor,
        }
    }

    pub fn with_codec(mut self, codec: Box<dyn ArchiveCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_revisions(mut self, revisions: Box<dyn RevisionSource>) -> Self {
        self.revisions = revisions;
        self
    }

    pub fn with_index(mut self, index: Box<dyn FixtureIndex>) -> Self {
        self.index = index;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.tracker.current()
    }

    /// Transitions of the most recent create or restore.
    pub fn history(&self) -> &[StateTransition] {
        self.tracker.history()
    }

    // ───────────────────────────────────────────────────────────────────────
    // create
    // ───────────────────────────────────────────────────────────────────────

    /// Snapshot the live environment.
    ///
    /// Without `explicit`, the archive is named after the checked-out
    /// revision and written to the fixtures directory.
    pub fn create(&mut self, explicit: Option<&Path>) -> Result<CreateReport> {
        self.tracker.reset();
        self.tracker.advance(LifecycleState::Creating, "create requested")?;

        let outcome = match explicit {
            Some(path) => self.snapshot(path).map(|built| (built, None)),
            None => self
                .auto_named_snapshot(&self.config.fixtures_dir)
                .map(|(built, name)| (built, Some(name.revision_id))),
        };

        match outcome {
            Ok((built, revision_id)) => {
                self.tracker
                    .advance(LifecycleState::Done, format!("created {}", built.path.display()))?;
                tracing::info!(archive = %built.path.display(), "fixture created");
                Ok(CreateReport {
                    archive: built.path,
                    revision_id,
                    entries: built.entries,
                    media_files: built.media_files,
                })
            }
            Err(err) => {
                self.tracker.advance(LifecycleState::Failed, err.to_string())?;
                Err(err)
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // restore
    // ───────────────────────────────────────────────────────────────────────

    /// Replace the live environment with a fixture.
    ///
    /// Without `explicit`, the fixture is selected from the catalog. A safety
    /// backup is always taken first. On failure the result is
    /// [`Error::RolledBack`] when the backup was put back and
    /// [`Error::RollbackFailure`] when that failed too.
    pub fn restore(&mut self, explicit: Option<&Path>) -> Result<RestoreReport> {
        self.tracker.reset();

        let explicit = explicit.map(resolve_explicit_archive);
        if let Err(err) = self.check_restore_inputs(explicit.as_deref()) {
            self.tracker.advance(LifecycleState::Failed, err.to_string())?;
            return Err(err);
        }

        self.tracker
            .advance(LifecycleState::BackingUp, "restore requested")?;
        let backup = match self.take_backup() {
            Ok(backup) => backup,
            Err(err) => {
                self.tracker
                    .advance(LifecycleState::Failed, format!("backup failed: {err}"))?;
                return Err(err);
            }
        };

        let target = match explicit {
            Some(path) => Ok((path, None)),
            None => self
                .select()
                .map(|fixture| (fixture.path, Some(fixture.revision_id))),
        };
        let (fixture, revision_id) = match target {
            Ok(target) => target,
            Err(err) => {
                self.tracker.advance(LifecycleState::Failed, err.to_string())?;
                return Err(err);
            }
        };

        self.tracker.advance(
            LifecycleState::Restoring,
            format!("restoring {}", fixture.display()),
        )?;
        tracing::info!(fixture = %fixture.display(), "restoring fixture");

        let restore_err = match self.apply(&fixture) {
            Ok(()) => {
                self.tracker.advance(LifecycleState::Done, "restored")?;
                tracing::info!(fixture = %fixture.display(), "fixture restored");
                return Ok(RestoreReport {
                    fixture,
                    backup,
                    revision_id,
                });
            }
            Err(err) => err,
        };

        tracing::warn!("restore failed, rolling back from {}: {restore_err}", backup.display());
        self.tracker
            .advance(LifecycleState::RollingBack, restore_err.to_string())?;

        match self.apply(&backup) {
            Ok(()) => {
                self.tracker
                    .advance(LifecycleState::Done, "rolled back to safety backup")?;
                self.record_recovery(&format!(
                    "restore of {} failed ({restore_err}); rolled back from {}",
                    fixture.display(),
                    backup.display()
                ));
                Err(Error::RolledBack {
                    fixture,
                    backup,
                    cause: Box::new(restore_err),
                })
            }
            Err(rollback_err) => {
                self.tracker
                    .advance(LifecycleState::Fatal, rollback_err.to_string())?;
                tracing::error!(
                    "rollback from {} failed, live state is indeterminate: {rollback_err}",
                    backup.display()
                );
                self.record_recovery(&format!(
                    "FATAL: restore of {} failed ({restore_err}); rollback from {} failed ({rollback_err})",
                    fixture.display(),
                    backup.display()
                ));
                Err(Error::RollbackFailure {
                    fixture,
                    backup,
                    restore: Box::new(restore_err),
                    rollback: Box::new(rollback_err),
                })
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────
    // read-only queries
    // ───────────────────────────────────────────────────────────────────────

    /// The fixture a restore without an explicit file would use.
    pub fn select(&self) -> Result<FixtureArchive> {
        let catalog = self.index.catalog()?;
        let history = self.revisions.history()?;
        let chosen = select_fixture(&catalog, &history)?;
        tracing::debug!(
            fixture = %chosen.path.display(),
            revision = %chosen.revision_id,
            "fixture selected"
        );
        Ok(chosen)
    }

    /// Every fixture in the catalog, with the one `select` would pick marked.
    pub fn list(&self) -> Result<CatalogListing> {
        let catalog = self.index.catalog()?;

        let selected = match self
            .revisions
            .history()
            .and_then(|history| select_fixture(&catalog, &history))
        {
            Ok(chosen) => Some(chosen.path),
            Err(Error::NoMatchFound(reason)) => {
                tracing::debug!("no fixture selected: {reason}");
                None
            }
            Err(err) => return Err(err),
        };

        let fixtures = catalog
            .entries()
            .into_iter()
            .map(|archive| ListedFixture {
                name: archive.name(),
                selected: selected.as_ref() == Some(&archive.path),
                archive,
            })
            .collect();

        Ok(CatalogListing {
            fixtures_dir: self.config.fixtures_dir.clone(),
            fixtures,
            selected,
        })
    }

    // ───────────────────────────────────────────────────────────────────────
    // steps
    // ───────────────────────────────────────────────────────────────────────

    fn check_restore_inputs(&self, explicit: Option<&Path>) -> Result<()> {
        match explicit {
            Some(path) if !path.is_file() => Err(Error::configuration(format!(
                "fixture file {} does not exist",
                path.display()
            ))),
            None if !self.config.fixtures_dir.is_dir() => Err(Error::configuration(format!(
                "fixtures directory {} does not exist",
                self.config.fixtures_dir.display()
            ))),
            _ => Ok(()),
        }
    }

    fn take_backup(&self) -> Result<PathBuf> {
        tracing::info!(dir = %self.config.backup_dir.display(), "taking safety backup");
        let (built, _) = self.auto_named_snapshot(&self.config.backup_dir)?;
        tracing::info!(backup = %built.path.display(), "safety backup taken");
        Ok(built.path)
    }

    fn auto_named_snapshot(&self, dir: &Path) -> Result<(BuiltArchive, FixtureName)> {
        let head = self.revisions.head()?;
        let date = self.revisions.author_date(&head)?;
        let name = FixtureName::new(&date, &head, Utc::now(), &self.user)?;
        let built = self.snapshot(&dir.join(name.stem()))?;
        Ok((built, name))
    }

    fn snapshot(&self, target: &Path) -> Result<BuiltArchive> {
        let staging = StagingArea::acquire(self.config.staging_dir.as_deref())?;
        let builder = ArchiveBuilder::new(
            self.codec.as_ref(),
            self.executor.as_ref(),
            &self.postgres,
            &self.config.media_root,
        );
        finish_staged(builder.build(target, &staging), staging)
    }

    fn apply(&self, archive: &Path) -> Result<()> {
        let staging = StagingArea::acquire(self.config.staging_dir.as_deref())?;
        let restorer = ArchiveRestorer::new(
            self.codec.as_ref(),
            self.executor.as_ref(),
            &self.postgres,
            &self.config.media_root,
        );
        finish_staged(restorer.restore(archive, &staging), staging)
    }

    fn record_recovery(&self, message: &str) {
        if self.config.recovery_log {
            RecoveryLog::in_dir(&self.config.backup_dir).record(message);
        }
    }
}

/// `-f name` finds `name.zip` when no file is called `name`, matching how
/// `create` names its output.
fn resolve_explicit_archive(path: &Path) -> PathBuf {
    if path.is_file() {
        path.to_path_buf()
    } else {
        archive_file_path(path)
    }
}

/// Release the staging area after success, keep it after failure.
fn finish_staged<T>(result: Result<T>, staging: StagingArea) -> Result<T> {
    match result {
        Ok(value) => {
            if let Err(e) = staging.release() {
                tracing::warn!("could not clean up staging area: {e}");
            }
            Ok(value)
        }
        Err(err) => {
            let kept = staging.retain();
            tracing::warn!("keeping staging area {} for inspection", kept.display());
            Err(err)
        }
    }
}
