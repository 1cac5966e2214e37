//! Common test helpers for lifecycle integration tests
//!
//! `FakeExecutor` stands in for Postgres and git. The "database" is a single
//! string: `pg_dump` writes it to the redirected stdout file, `psql` replaces
//! it with the redirected stdin file, `dropdb`/`createdb` remove and create
//! it. A script containing [`BROKEN_STATEMENT`] behaves like a dump with a
//! bad statement in it. Any program can be told to fail on its n-th call.
//!
//! `TestEnv` lays out a media root, fixtures and backup directories and a
//! staging root inside one temporary directory.

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use devfixture_core::{
    CommandResult, Error, FixtureConfig, Invocation, Orchestrator, ProcessExecutor,
};
use tempfile::TempDir;
use walkdir::WalkDir;

pub const DATABASE: &str = "devdb";

/// A statement the fake psql cannot execute.
pub const BROKEN_STATEMENT: &str = "SELECT broken(;";

#[derive(Debug, Default)]
struct FakeState {
    database: Option<String>,
    calls: Vec<Invocation>,
    counts: HashMap<String, usize>,
    failures: Vec<(String, usize)>,
    head: String,
    history: Vec<String>,
    author_date: String,
}

/// Scripted stand-in for every external program.
#[derive(Debug)]
pub struct FakeExecutor {
    state: Mutex<FakeState>,
}

impl FakeExecutor {
    pub fn new(database: &str) -> Self {
        Self {
            state: Mutex::new(FakeState {
                database: Some(database.to_string()),
                head: "h1".to_string(),
                history: vec!["h1".to_string()],
                author_date: "2024-01-01 10:00:00 +0100".to_string(),
                ..FakeState::default()
            }),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut guard = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }

    /// Make `program` fail on its `nth` call (1-based).
    pub fn fail_on(&self, program: &str, nth: usize) {
        self.with_state(|s| s.failures.push((program.to_string(), nth)));
    }

    pub fn set_history(&self, head: &str, history: &[&str]) {
        self.with_state(|s| {
            s.head = head.to_string();
            s.history = history.iter().map(|h| (*h).to_string()).collect();
        });
    }

    pub fn set_database(&self, contents: &str) {
        self.with_state(|s| s.database = Some(contents.to_string()));
    }

    pub fn database(&self) -> Option<String> {
        self.with_state(|s| s.database.clone())
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn call_count(&self, program: &str) -> usize {
        self.with_state(|s| s.counts.get(program).copied().unwrap_or(0))
    }
}

impl ProcessExecutor for FakeExecutor {
    fn run(&self, invocation: &Invocation) -> devfixture_core::Result<CommandResult> {
        self.with_state(|s| -> devfixture_core::Result<CommandResult> {
            s.calls.push(invocation.clone());
            let count = s.counts.entry(invocation.program.clone()).or_insert(0);
            *count += 1;
            let nth = *count;

            if s
                .failures
                .iter()
                .any(|(program, n)| *program == invocation.program && *n == nth)
            {
                return Ok(CommandResult::failed(1, "simulated failure"));
            }

            match invocation.program.as_str() {
                "pg_dump" => match (&s.database, &invocation.stdout) {
                    (Some(contents), Some(out)) => {
                        std::fs::write(out, contents)?;
                        Ok(CommandResult::ok(""))
                    }
                    (None, _) => Ok(CommandResult::failed(1, "database does not exist")),
                    (_, None) => Ok(CommandResult::ok(s.database.clone().unwrap_or_default())),
                },
                "dropdb" => {
                    s.database = None;
                    Ok(CommandResult::ok(""))
                }
                "createdb" => {
                    if s.database.is_some() {
                        Ok(CommandResult::failed(1, "database already exists"))
                    } else {
                        s.database = Some(String::new());
                        Ok(CommandResult::ok(""))
                    }
                }
                "psql" => match (s.database.is_some(), &invocation.stdin) {
                    (true, Some(script)) => {
                        let script = std::fs::read_to_string(script)?;
                        let stop_on_error = invocation.args.iter().any(|a| a == "ON_ERROR_STOP=1");
                        match script.split_once(BROKEN_STATEMENT) {
                            // One transaction: nothing of the script is kept.
                            Some(_) if stop_on_error => {
                                Ok(CommandResult::failed(3, "ERROR:  syntax error"))
                            }
                            // Plain psql reports the error and carries on with exit 0.
                            Some((loaded, _)) => {
                                s.database = Some(loaded.to_string());
                                Ok(CommandResult::ok(""))
                            }
                            None => {
                                s.database = Some(script);
                                Ok(CommandResult::ok(""))
                            }
                        }
                    }
                    _ => Ok(CommandResult::failed(2, "cannot load")),
                },
                "git" => {
                    let sub = invocation.args.get(2).map(String::as_str);
                    let out = match sub {
                        Some("rev-parse") => format!("{}\n", s.head),
                        Some("log") => s.history.join("\n"),
                        Some("show") => format!("{}\n", s.author_date),
                        _ => return Ok(CommandResult::failed(129, "unknown git command")),
                    };
                    Ok(CommandResult::ok(out))
                }
                other => Err(Error::MissingDependency {
                    required: vec![other.to_string()],
                    missing: vec![other.to_string()],
                }),
            }
        })
    }
}

/// A throwaway environment: media root, fixtures, backups and staging.
pub struct TestEnv {
    _temp_dir: TempDir,
    pub root: PathBuf,
    pub executor: Arc<FakeExecutor>,
}

impl TestEnv {
    pub fn new(database: &str) -> Result<Self> {
        let temp_dir = TempDir::new().context("Failed to create temp directory")?;
        let root = temp_dir.path().canonicalize()?;
        std::fs::create_dir_all(root.join("uploads"))?;
        std::fs::create_dir_all(root.join("fixtures"))?;
        std::fs::create_dir_all(root.join("staging"))?;

        Ok(Self {
            _temp_dir: temp_dir,
            root,
            executor: Arc::new(FakeExecutor::new(database)),
        })
    }

    pub fn media_root(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn fixtures_dir(&self) -> PathBuf {
        self.root.join("fixtures")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("fixtures/backups")
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.root.join("staging")
    }

    pub fn config(&self) -> FixtureConfig {
        FixtureConfig {
            database: DATABASE.to_string(),
            media_root: self.media_root(),
            fixtures_dir: self.fixtures_dir(),
            backup_dir: self.backup_dir(),
            staging_dir: Some(self.staging_dir()),
            repository: self.root.clone(),
            recovery_log: true,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        self.orchestrator_with(self.config())
    }

    pub fn orchestrator_with(&self, config: FixtureConfig) -> Orchestrator {
        let executor: Arc<dyn ProcessExecutor> = self.executor.clone();
        Orchestrator::new(config, executor).with_user("tester")
    }

    /// Replace the media tree with `files`.
    pub fn write_media(&self, files: &[(&str, &str)]) -> Result<()> {
        let media = self.media_root();
        if media.exists() {
            std::fs::remove_dir_all(&media)?;
        }
        std::fs::create_dir_all(&media)?;
        for (relative, contents) in files {
            let path = media.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, contents)?;
        }
        Ok(())
    }

    pub fn media_snapshot(&self) -> Result<BTreeMap<String, String>> {
        tree_snapshot(&self.media_root())
    }

    /// Leftover staging directories.
    pub fn staging_dirs(&self) -> Result<Vec<PathBuf>> {
        list_dir(&self.staging_dir())
    }

    pub fn fixtures(&self) -> Result<Vec<PathBuf>> {
        Ok(list_dir(&self.fixtures_dir())?
            .into_iter()
            .filter(|p| p.is_file())
            .collect())
    }

    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        if !self.backup_dir().exists() {
            return Ok(Vec::new());
        }
        Ok(list_dir(&self.backup_dir())?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|e| e == "zip"))
            .collect())
    }
}

pub fn list_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

/// Relative path to contents for every file under `root`.
pub fn tree_snapshot(root: &Path) -> Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root)?.to_string_lossy().to_string();
            files.insert(relative, std::fs::read_to_string(entry.path())?);
        }
    }
    Ok(files)
}
