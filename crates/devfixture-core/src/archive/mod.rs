//! Fixture archives
//!
//! An archive holds exactly two things at its root: the media tree, in a
//! directory named after the live media root, and `db.sql`. The codec only
//! moves bytes in and out of the container; [`ArchiveBuilder`] and
//! [`ArchiveRestorer`] own the create and restore pipelines.

mod builder;
mod restorer;

use std::{
    fs::File,
    io,
    path::{Component, Path},
};

pub use builder::{ArchiveBuilder, BuiltArchive};
pub use restorer::ArchiveRestorer;
use walkdir::WalkDir;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

use crate::{Error, Result};

/// Name of the database dump inside an archive.
pub const DB_DUMP_NAME: &str = "db.sql";

/// Media directory name used when the media root has no usable basename.
pub const LEGACY_MEDIA_DIR: &str = "MEDIA_ROOT";

/// Pack, unpack and list a container format.
pub trait ArchiveCodec: Send + Sync {
    /// Pack the contents of `src_dir` (not the directory itself) into `dest`.
    fn pack(&self, src_dir: &Path, dest: &Path) -> Result<()>;

    /// Extract `archive` into the existing directory `dest`.
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()>;

    /// Entry names, directories ending in `/`.
    fn list(&self, archive: &Path) -> Result<Vec<String>>;
}

/// Deflate-compressed zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl ArchiveCodec for ZipCodec {
    fn pack(&self, src_dir: &Path, dest: &Path) -> Result<()> {
        let file = File::create(dest).map_err(|e| Error::io_at(dest, &e))?;
        let mut zip = ZipWriter::new(file);
        let file_options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let dir_options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let walker = WalkDir::new(src_dir)
            .min_depth(1)
            .follow_links(true)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry?;
            let name = entry_name(src_dir, entry.path())?;

            if entry.file_type().is_dir() {
                zip.add_directory(name, dir_options)?;
            } else {
                zip.start_file(name, file_options)?;
                let mut source =
                    File::open(entry.path()).map_err(|e| Error::io_at(entry.path(), &e))?;
                io::copy(&mut source, &mut zip)?;
            }
        }

        zip.finish()?;
        Ok(())
    }

    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        let file = File::open(archive).map_err(|e| Error::io_at(archive, &e))?;
        let mut zip = ZipArchive::new(file)?;

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i)?;
            let relative = entry.enclosed_name().ok_or_else(|| {
                Error::io(format!(
                    "archive entry '{}' would escape the destination",
                    entry.name()
                ))
            })?;
            let outpath = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath).map_err(|e| Error::io_at(&outpath, &e))?;
            } else {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, &e))?;
                }
                let mut outfile =
                    File::create(&outpath).map_err(|e| Error::io_at(&outpath, &e))?;
                io::copy(&mut entry, &mut outfile)?;
            }
        }

        Ok(())
    }

    fn list(&self, archive: &Path) -> Result<Vec<String>> {
        let file = File::open(archive).map_err(|e| Error::io_at(archive, &e))?;
        let zip = ZipArchive::new(file)?;
        Ok(zip.file_names().map(str::to_string).collect())
    }
}

/// Forward-slash entry name of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| Error::io(format!("{} is outside {}", path.display(), root.display())))?;

    let parts = relative
        .components()
        .map(|component| match component {
            Component::Normal(part) => part.to_str().map(str::to_string).ok_or_else(|| {
                Error::io(format!("non UTF-8 file name: {}", path.display()))
            }),
            _ => Err(Error::io(format!("unexpected path component in {}", path.display()))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(parts.join("/"))
}

/// Name of the media directory inside an archive for a given media root.
pub fn media_dir_name(media_root: &Path) -> String {
    media_root
        .file_name()
        .and_then(|n| n.to_str())
        .map_or_else(|| LEGACY_MEDIA_DIR.to_string(), str::to_string)
}

/// Recursively copy `src` into `dst`, creating `dst`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    let mut files = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|_| Error::io(format!("{} is outside {}", entry.path().display(), src.display())))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| Error::io_at(&target, &e))?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| Error::io_at(&target, &e))?;
            files += 1;
        }
    }
    Ok(files)
}
