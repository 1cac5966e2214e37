//! Fixture file names
//!
//! A fixture archive is named `<revisionDate>+<revisionId>+<runTimestamp>+<user>.zip`.
//! Only the revision id is ever read back for selection; the other fields are
//! for humans browsing the fixtures directory.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::{Error, Result};

pub const ARCHIVE_EXTENSION: &str = "zip";
pub const FIELD_DELIMITER: char = '+';
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const UNKNOWN_USER: &str = "unknown";

/// The four fields encoded in a fixture file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixtureName {
    pub revision_date: String,
    pub revision_id: String,
    pub created_at: String,
    pub user: String,
}

impl FixtureName {
    /// Build a name for a snapshot taken now of `revision_id`.
    ///
    /// `raw_revision_date` is the authoring date as the VCS prints it, offset
    /// included; it is normalized here.
    pub fn new(
        raw_revision_date: &str,
        revision_id: &str,
        created_at: DateTime<Utc>,
        user: &str,
    ) -> Result<Self> {
        let revision_id = revision_id.trim();
        if revision_id.is_empty() {
            return Err(Error::configuration("revision id is empty"));
        }
        if revision_id.contains(FIELD_DELIMITER) {
            return Err(Error::configuration(format!(
                "revision id '{revision_id}' contains '{FIELD_DELIMITER}'"
            )));
        }

        Ok(Self {
            revision_date: normalize_revision_date(raw_revision_date),
            revision_id: revision_id.to_string(),
            created_at: created_at.format(TIMESTAMP_FORMAT).to_string(),
            user: sanitize_user(user),
        })
    }

    /// Parse a file name produced by [`FixtureName::file_name`].
    ///
    /// Returns `None` for anything that does not have exactly four fields and
    /// the archive extension.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".zip")?;
        let mut fields = stem.split(FIELD_DELIMITER);
        let name = Self {
            revision_date: fields.next()?.to_string(),
            revision_id: fields.next()?.to_string(),
            created_at: fields.next()?.to_string(),
            user: fields.next()?.to_string(),
        };
        if fields.next().is_some() || name.revision_id.is_empty() {
            return None;
        }
        Some(name)
    }

    /// File name without the archive extension.
    pub fn stem(&self) -> String {
        format!(
            "{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}{FIELD_DELIMITER}{}",
            self.revision_date, self.revision_id, self.created_at, self.user
        )
    }

    pub fn file_name(&self) -> String {
        format!("{}.{ARCHIVE_EXTENSION}", self.stem())
    }
}

/// The revision id field of a fixture file name: the second `+`-delimited field.
pub fn revision_id_of(file_name: &str) -> Option<&str> {
    file_name
        .split(FIELD_DELIMITER)
        .nth(1)
        .filter(|id| !id.is_empty())
}

fn offset_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\s+[+-]\d{2}:?\d{2}$").ok())
        .as_ref()
}

/// `2024-01-01 10:00:00 +0100` becomes `2024-01-01T10:00:00`.
///
/// Drops a trailing timezone offset and joins the remaining whitespace
/// separated parts with `T`. Already normalized input is returned unchanged.
pub fn normalize_revision_date(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_offset = offset_pattern()
        .map(|re| re.replace(trimmed, "").into_owned())
        .unwrap_or_else(|| trimmed.to_string());
    without_offset.split_whitespace().collect::<Vec<_>>().join("T")
}

/// Login name of the operator, from `$USER` or `$USERNAME`.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .map(|u| sanitize_user(&u))
        .unwrap_or_else(|_| UNKNOWN_USER.to_string())
}

fn sanitize_user(user: &str) -> String {
    let cleaned: String = user
        .trim()
        .chars()
        .map(|c| match c {
            '+' | '/' | '\\' => '-',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        UNKNOWN_USER.to_string()
    } else {
        cleaned
    }
}

/// Strip one trailing `.zip` from the file name, if present.
///
/// `foo` and `foo.zip` normalize to the same path. Only the literal
/// extension is removed, so a dotted user name such as `j.doe` survives.
pub fn normalize_archive_path(path: &Path) -> PathBuf {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => match name.strip_suffix(".zip") {
            Some(stem) if !stem.is_empty() => path.with_file_name(stem),
            _ => path.to_path_buf(),
        },
        None => path.to_path_buf(),
    }
}

/// Normalized path with the archive extension appended.
pub fn archive_file_path(path: &Path) -> PathBuf {
    let mut raw: OsString = normalize_archive_path(path).into_os_string();
    raw.push(".");
    raw.push(ARCHIVE_EXTENSION);
    PathBuf::from(raw)
}
