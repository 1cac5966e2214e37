//! Rollback audit trail
//!
//! Outcomes of failed restores are appended to `recovery.log` in the backup
//! directory, next to the safety backups they refer to.

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use crate::{Error, Result};

pub const RECOVERY_LOG_NAME: &str = "recovery.log";

/// Appends timestamped lines to `<dir>/recovery.log`.
#[derive(Debug, Clone)]
pub struct RecoveryLog {
    path: PathBuf,
}

impl RecoveryLog {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(RECOVERY_LOG_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `[<rfc3339>] message`.
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be created or written to
    pub fn append(&self, message: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let log_entry = format!("[{timestamp}] {message}\n");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, &e))?;
        }

        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| file.write_all(log_entry.as_bytes()))
            .map_err(|e| Error::io(format!("Failed to write to recovery log: {e}")))
    }

    /// Like [`RecoveryLog::append`] but only warns on failure.
    pub fn record(&self, message: &str) {
        if let Err(e) = self.append(message) {
            tracing::warn!("{e}");
        }
    }
}
