use std::path::{Path, PathBuf};

use serde::Serialize;

use super::{copy_tree, media_dir_name, ArchiveCodec, DB_DUMP_NAME};
use crate::{
    error::Step,
    naming::archive_file_path,
    process::ProcessExecutor,
    staging::StagingArea,
    tools::PostgresTools,
    Error, Result,
};

/// A finished, verified archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltArchive {
    pub path: PathBuf,
    pub entries: Vec<String>,
    pub media_files: u64,
}

/// Snapshots the live media tree and database into one archive.
pub struct ArchiveBuilder<'a> {
    codec: &'a dyn ArchiveCodec,
    executor: &'a dyn ProcessExecutor,
    postgres: &'a PostgresTools,
    media_root: &'a Path,
}

impl<'a> ArchiveBuilder<'a> {
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

    /// Build the archive for `target`, with or without its `.zip` extension.
    ///
    /// Staging happens in `staging`; the caller decides whether to release it.
    /// The archive is written under a temporary name and only moved into
    /// place once it has been listed back and found complete, so a file at
    /// the final path is always a whole fixture.
    pub fn build(&self, target: &Path, staging: &StagingArea) -> Result<BuiltArchive> {
        let stage = staging.path();
        let dest = archive_file_path(target);
        let fail = |step: Step| move |source: Error| Error::staging(step, stage, source);

        let media_dir = media_dir_name(self.media_root);
        tracing::info!(
            media_root = %self.media_root.display(),
            "copying media into staging"
        );
        let media_files = stage_media(self.media_root, &stage.join(&media_dir))
            .map_err(fail(Step::CopyMedia))?;

        tracing::info!(database = self.postgres.database(), "dumping database");
        self.postgres
            .dump(self.executor, &stage.join(DB_DUMP_NAME))
            .map_err(fail(Step::DumpDatabase))?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::io_at(parent, &e))
                .map_err(fail(Step::Pack))?;
        }

        let partial = partial_path(&dest);
        tracing::info!(archive = %dest.display(), "packing archive");
        let packed = self
            .codec
            .pack(stage, &partial)
            .map_err(fail(Step::Pack))
            .and_then(|()| {
                self.codec
                    .list(&partial)
                    .and_then(|entries| verify_entries(entries, &media_dir))
                    .map_err(fail(Step::Verify))
            })
            .and_then(|entries| {
                std::fs::rename(&partial, &dest)
                    .map_err(|e| Error::io_at(&dest, &e))
                    .map_err(fail(Step::Pack))?;
                Ok(entries)
            });

        match packed {
            Ok(entries) => Ok(BuiltArchive {
                path: dest,
                entries,
                media_files,
            }),
            Err(err) => {
                if partial.exists() {
                    if let Err(e) = std::fs::remove_file(&partial) {
                        tracing::warn!("could not remove partial archive {}: {e}", partial.display());
                    }
                }
                Err(err)
            }
        }
    }
}

/// Copy the media tree into `dest`. A missing media root is snapshotted as
/// an empty directory.
fn stage_media(media_root: &Path, dest: &Path) -> Result<u64> {
    if media_root.exists() {
        return copy_tree(media_root, dest);
    }
    tracing::warn!(
        "media root {} does not exist; archiving it as empty",
        media_root.display()
    );
    std::fs::create_dir_all(dest).map_err(|e| Error::io_at(dest, &e))?;
    Ok(0)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut raw = dest.as_os_str().to_owned();
    raw.push(".partial");
    PathBuf::from(raw)
}

fn verify_entries(entries: Vec<String>, media_dir: &str) -> Result<Vec<String>> {
    if !entries.iter().any(|e| e == DB_DUMP_NAME) {
        return Err(Error::io(format!("archive is missing {DB_DUMP_NAME}")));
    }
    let media_prefix = format!("{media_dir}/");
    if !entries.iter().any(|e| e.starts_with(&media_prefix)) {
        return Err(Error::io(format!("archive is missing media directory '{media_dir}'")));
    }
    Ok(entries)
}
