//! Fixture catalog and selection
//!
//! The fixtures directory listing is the index: it is scanned fresh every
//! time a catalog is needed, and each archive is keyed by the revision id
//! embedded in its file name.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{
    naming::{revision_id_of, FixtureName},
    recovery::RECOVERY_LOG_NAME,
    Error, Result,
};

const PARTIAL_SUFFIX: &str = ".partial";

/// One archive in the fixtures directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FixtureArchive {
    pub path: PathBuf,
    pub revision_id: String,
}

impl FixtureArchive {
    /// Parse the revision id out of `path`'s file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::catalog_corrupt(&path, "file name is not valid UTF-8"))?;
        let revision_id = revision_id_of(file_name)
            .ok_or_else(|| {
                Error::catalog_corrupt(
                    &path,
                    "expected <revisionDate>+<revisionId>+<runTimestamp>+<user>.zip",
                )
            })?
            .to_string();

        Ok(Self { path, revision_id })
    }

    /// The full set of name fields, when the file name has all four.
    pub fn name(&self) -> Option<FixtureName> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(FixtureName::parse)
    }
}

/// Archive paths grouped by revision id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixtureCatalog {
    groups: BTreeMap<String, Vec<PathBuf>>,
}

impl FixtureCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, archive: FixtureArchive) {
        self.groups
            .entry(archive.revision_id)
            .or_default()
            .push(archive.path);
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of archives, not revisions.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn revisions(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn paths_for(&self, revision_id: &str) -> Option<&[PathBuf]> {
        self.groups.get(revision_id).map(Vec::as_slice)
    }

    /// Every archive, ordered by revision id then path.
    pub fn entries(&self) -> Vec<FixtureArchive> {
        let mut entries: Vec<_> = self
            .groups
            .iter()
            .flat_map(|(revision_id, paths)| {
                paths.iter().map(|path| FixtureArchive {
                    path: path.clone(),
                    revision_id: revision_id.clone(),
                })
            })
            .collect();
        entries.sort();
        entries
    }
}

impl FromIterator<FixtureArchive> for FixtureCatalog {
    fn from_iter<I: IntoIterator<Item = FixtureArchive>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for archive in iter {
            catalog.insert(archive);
        }
        catalog
    }
}

/// Source of a fixture catalog.
pub trait FixtureIndex: Send + Sync {
    fn catalog(&self) -> Result<FixtureCatalog>;
}

/// Non-recursive scan of a fixtures directory.
#[derive(Debug, Clone)]
pub struct DirectoryIndex {
    dir: PathBuf,
}

impl DirectoryIndex {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FixtureIndex for DirectoryIndex {
    fn catalog(&self) -> Result<FixtureCatalog> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::configuration(format!(
                "cannot read fixtures directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let mut catalog = FixtureCatalog::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::io_at(&self.dir, &e))?.path();
            if !path.is_file() {
                continue;
            }
            let file_name = path.file_name().and_then(|n| n.to_str());
            // Left behind by an interrupted create; never a complete fixture.
            if file_name.is_some_and(|n| n.ends_with(PARTIAL_SUFFIX)) {
                tracing::warn!("ignoring partial archive {}", path.display());
                continue;
            }
            // Shares the directory when backups are kept next to fixtures.
            if file_name == Some(RECOVERY_LOG_NAME) {
                tracing::debug!("skipping {}", path.display());
                continue;
            }
            let path = std::fs::canonicalize(&path).map_err(|e| Error::io_at(&path, &e))?;
            catalog.insert(FixtureArchive::from_path(path)?);
        }

        tracing::debug!(
            dir = %self.dir.display(),
            archives = catalog.len(),
            "fixture catalog built"
        );
        Ok(catalog)
    }
}

/// Pick the archive for the most recent revision in `history` that has one.
///
/// `history` runs from the current revision backwards. Within the winning
/// revision the lexicographically greatest path wins.
pub fn select_fixture(catalog: &FixtureCatalog, history: &[String]) -> Result<FixtureArchive> {
    if catalog.is_empty() {
        return Err(Error::NoMatchFound("the fixtures directory is empty".to_string()));
    }

    history
        .iter()
        .find_map(|revision| {
            catalog
                .paths_for(revision)
                .and_then(|paths| paths.iter().max())
                .map(|path| FixtureArchive {
                    path: path.clone(),
                    revision_id: revision.clone(),
                })
        })
        .ok_or_else(|| {
            Error::NoMatchFound(format!(
                "none of {} fixture(s) matches the {} revision(s) in history",
                catalog.len(),
                history.len()
            ))
        })
}
