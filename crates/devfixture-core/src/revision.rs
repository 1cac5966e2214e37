//! Revision history and metadata from version control.

use std::{path::PathBuf, sync::Arc};

use crate::{
    process::{Invocation, ProcessExecutor},
    Error, Result,
};

/// Version-control queries the lifecycle needs.
pub trait RevisionSource: Send + Sync {
    /// Short id of the checked-out revision.
    fn head(&self) -> Result<String>;

    /// Short ids from the current revision backwards, most recent first.
    fn history(&self) -> Result<Vec<String>>;

    /// Authoring date of `revision`, as the VCS prints it.
    fn author_date(&self, revision: &str) -> Result<String>;
}

/// Git working copy queried through the process executor.
#[derive(Clone)]
pub struct GitRevisions {
    repository: PathBuf,
    executor: Arc<dyn ProcessExecutor>,
}

impl GitRevisions {
    pub fn new(repository: impl Into<PathBuf>, executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            repository: repository.into(),
            executor,
        }
    }

    fn git<I, S>(&self, args: I) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let invocation = Invocation::new("git")
            .arg("-C")
            .path_arg(&self.repository)
            .args(args);
        self.executor
            .run_checked(&invocation)
            .map(|result| result.stdout)
    }
}

impl std::fmt::Debug for GitRevisions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRevisions")
            .field("repository", &self.repository)
            .finish_non_exhaustive()
    }
}

impl RevisionSource for GitRevisions {
    fn head(&self) -> Result<String> {
        let out = self.git(["rev-parse", "--short", "HEAD"])?;
        first_line(&out).ok_or_else(|| Error::io("git rev-parse printed no revision"))
    }

    fn history(&self) -> Result<Vec<String>> {
        let out = self.git(["log", "--pretty=format:%h"])?;
        Ok(non_empty_lines(&out))
    }

    fn author_date(&self, revision: &str) -> Result<String> {
        let out = self.git(["show", "-s", "--format=%ai", revision])?;
        first_line(&out)
            .ok_or_else(|| Error::io(format!("git show printed no date for {revision}")))
    }
}

fn non_empty_lines(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_line(out: &str) -> Option<String> {
    non_empty_lines(out).into_iter().next()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::process::CommandResult;

    /// Replays canned stdout and records what was asked.
    struct Scripted {
        stdout: String,
        seen: Mutex<Vec<Invocation>>,
    }

    impl ProcessExecutor for Scripted {
        fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(invocation.clone());
            }
            Ok(CommandResult::ok(self.stdout.clone()))
        }
    }

    fn scripted(stdout: &str) -> Arc<Scripted> {
        Arc::new(Scripted {
            stdout: stdout.to_string(),
            seen: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_history_skips_blank_lines() -> Result<()> {
        let exec = scripted("def456\n\nabc123\n");
        let git = GitRevisions::new("/repo", exec.clone());

        assert_eq!(git.history()?, vec!["def456", "abc123"]);

        let seen = exec.seen.lock().map_err(|e| Error::io(e.to_string()))?;
        assert_eq!(seen[0].to_string(), "git -C /repo log --pretty=format:%h");
        Ok(())
    }

    #[test]
    fn test_author_date_asks_for_the_given_revision() -> Result<()> {
        let exec = scripted("2024-01-01 10:00:00 +0100\n");
        let git = GitRevisions::new("/repo", exec.clone());

        assert_eq!(git.author_date("abc123")?, "2024-01-01 10:00:00 +0100");

        let seen = exec.seen.lock().map_err(|e| Error::io(e.to_string()))?;
        assert_eq!(seen[0].args.last().map(String::as_str), Some("abc123"));
        Ok(())
    }

    #[test]
    fn test_head_with_empty_output_is_an_error() {
        let git = GitRevisions::new("/repo", scripted(""));
        assert!(git.head().is_err());
    }
}
