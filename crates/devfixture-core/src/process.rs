//! External command execution
//!
//! Every call to `pg_dump`, `psql`, `git` and friends goes through a
//! [`ProcessExecutor`], so the engine can be driven against a fake in tests.
//! Commands run synchronously, one at a time, with optional file redirection
//! for stdin and stdout.

use std::{
    fmt,
    fs::File,
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════
// PUBLIC TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// File fed to the command's stdin
    pub stdin: Option<PathBuf>,
    /// File that receives the command's stdout instead of capturing it
    pub stdout: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Path argument, converted lossily for display and argv.
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn stdin_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        if let Some(stdin) = &self.stdin {
            write!(f, " < {}", stdin.display())?;
        }
        if let Some(stdout) = &self.stdout {
            write!(f, " > {}", stdout.display())?;
        }
        Ok(())
    }
}

/// Result of executing a single command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command succeeded (exit code 0)
    pub success: bool,
    /// Exit code from the command
    pub exit_code: Option<i32>,
    /// Standard output (empty when redirected to a file)
    pub stdout: String,
    /// Standard error from the command
    pub stderr: String,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs external commands.
///
/// `run` only fails when the command could not be started. A command that
/// started and exited non-zero is reported through [`CommandResult::success`];
/// use [`ProcessExecutor::run_checked`] to turn that into an error.
pub trait ProcessExecutor: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult>;

    fn run_checked(&self, invocation: &Invocation) -> Result<CommandResult> {
        let result = self.run(invocation)?;
        if result.success {
            Ok(result)
        } else {
            tracing::debug!(
                command = %invocation,
                exit_code = ?result.exit_code,
                "command failed"
            );
            Err(Error::Command {
                command: invocation.to_string(),
                exit_code: result.exit_code,
                stderr: result.stderr.trim().to_string(),
            })
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SYSTEM EXECUTOR
// ═══════════════════════════════════════════════════════════════════════════

/// Executor backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn run(&self, invocation: &Invocation) -> Result<CommandResult> {
        tracing::debug!(command = %invocation, "running");

        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args).stderr(Stdio::piped());

        match &invocation.stdin {
            Some(path) => {
                let file = File::open(path).map_err(|e| Error::io_at(path, &e))?;
                command.stdin(Stdio::from(file));
            }
            None => {
                command.stdin(Stdio::null());
            }
        }

        match &invocation.stdout {
            Some(path) => {
                let file = File::create(path).map_err(|e| Error::io_at(path, &e))?;
                command.stdout(Stdio::from(file));
            }
            None => {
                command.stdout(Stdio::piped());
            }
        }

        let output = command
            .output()
            .map_err(|e| spawn_error(&invocation.program, &e))?;

        let result = CommandResult {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        tracing::trace!(
            command = %invocation,
            exit_code = ?result.exit_code,
            stderr = %result.stderr,
            "finished"
        );

        Ok(result)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// HELPER FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════

fn spawn_error(program: &str, err: &io::Error) -> Error {
    if err.kind() == io::ErrorKind::NotFound {
        Error::MissingDependency {
            required: vec![program.to_string()],
            missing: vec![program.to_string()],
        }
    } else {
        Error::io(format!("Failed to execute '{program}': {err}"))
    }
}
