use std::path::{Path, PathBuf};

use super::{copy_tree, media_dir_name, ArchiveCodec, DB_DUMP_NAME, LEGACY_MEDIA_DIR};
use crate::{
    error::Step, process::ProcessExecutor, staging::StagingArea, tools::PostgresTools, Error,
    Result,
};

/// Replaces the live media tree and database with an archive's contents.
///
/// No retries happen here. A failure is returned as-is with the step it
/// happened in; undoing a half-applied restore is the orchestrator's job.
pub struct ArchiveRestorer<'a> {
    codec: &'a dyn ArchiveCodec,
    executor: &'a dyn ProcessExecutor,
    postgres: &'a PostgresTools,
    media_root: &'a Path,
}

impl<'a> ArchiveRestorer<'a> {
    pub fn new(
        codec: &'a dyn ArchiveCodec,
        executor: &'a dyn ProcessExecutor,
        postgres: &'a PostgresTools,
        media_root: &'a Path,
    ) -> Self {
        Self {
            codec,
            executor,
            postgres,
            media_root,
        }
    }

    pub fn restore(&self, archive: &Path, staging: &StagingArea) -> Result<()> {
        let stage = staging.path();
        let fail = |step: Step| move |source: Error| Error::restore(step, stage, source);

        tracing::info!(archive = %archive.display(), "unpacking archive");
        self.codec
            .unpack(archive, stage)
            .map_err(fail(Step::Unpack))?;

        // Both inputs are checked before anything live is touched.
        let staged_media = locate_media_dir(stage, self.media_root).map_err(fail(Step::Unpack))?;
        let staged_dump = stage.join(DB_DUMP_NAME);
        if !staged_dump.is_file() {
            return Err(fail(Step::Unpack)(Error::io(format!(
                "archive {} has no {DB_DUMP_NAME}",
                archive.display()
            ))));
        }

        tracing::info!(media_root = %self.media_root.display(), "replacing media");
        self.replace_media(&staged_media)
            .map_err(fail(Step::ReplaceMedia))?;

        tracing::info!(database = self.postgres.database(), "recreating database");
        self.postgres
            .drop_database(self.executor)
            .map_err(fail(Step::DropDatabase))?;
        self.postgres
            .create_database(self.executor)
            .map_err(fail(Step::CreateDatabase))?;
        self.postgres
            .load(self.executor, &staged_dump)
            .map_err(fail(Step::LoadDatabase))?;

        Ok(())
    }

    /// Delete the live media root, then copy the staged tree into its place.
    fn replace_media(&self, staged_media: &Path) -> Result<()> {
        if self.media_root.exists() {
            std::fs::remove_dir_all(self.media_root)
                .map_err(|e| Error::io_at(self.media_root, &e))?;
        }
        copy_tree(staged_media, self.media_root).map(|_| ())
    }
}

/// Find the media subtree in an unpacked archive.
///
/// Tried in order: the live media root's basename, the legacy fixed name,
/// then the only directory present.
fn locate_media_dir(stage: &Path, media_root: &Path) -> Result<PathBuf> {
    let by_name = stage.join(media_dir_name(media_root));
    if by_name.is_dir() {
        return Ok(by_name);
    }
    let legacy = stage.join(LEGACY_MEDIA_DIR);
    if legacy.is_dir() {
        return Ok(legacy);
    }

    let dirs = std::fs::read_dir(stage)
        .map_err(|e| Error::io_at(stage, &e))?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();

    match dirs.as_slice() {
        [only] => Ok(only.clone()),
        [] => Err(Error::io("archive contains no media directory")),
        _ => Err(Error::io(format!(
            "archive contains {} directories and none is named '{}'",
            dirs.len(),
            media_dir_name(media_root)
        ))),
    }
}
