//! External process execution with bounded time and captured output.
//!
//! Every external tool (cargo, the workflow emulator) goes through
//! [`CommandRunner`] so that timeout and capture semantics live in one place.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub working_dir: PathBuf,
    /// Wall-clock budget for the child.
    pub timeout: Duration,
}

impl CommandSpec {
    /// Creates a command with no arguments.
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            timeout,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the command line as it would be typed in a shell, for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl ProcessOutput {
    /// Returns true if the process exited with code zero.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns stdout and stderr joined by a newline.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Executes external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion or until its timeout elapses.
    ///
    /// A timeout yields [`Error::ToolTimeout`]; a non-zero exit is not an
    /// error at this level.
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput>;

    /// Resolves a program name against `PATH`.
    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    /// Creates a new system runner.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        tracing::debug!(
            command = %spec.display(),
            working_dir = ?spec.working_dir,
            timeout_secs = spec.timeout.as_secs(),
            "running external command"
        );

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Dropping the wait future on timeout must not leave the child running
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::ToolLaunch {
                program: spec.program.clone(),
                source,
            })?;

        let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(
                    program = %spec.program,
                    timeout_secs = spec.timeout.as_secs(),
                    "external command timed out"
                );
                return Err(Error::ToolTimeout {
                    program: spec.program.clone(),
                    timeout: spec.timeout,
                });
            }
        };

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Returns every regular file below `dir`, recursively, sorted.
///
/// A missing directory yields an empty list.
pub fn regular_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted runner for exercising checks without real tools.

    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    type Responder = Box<dyn Fn(&CommandSpec) -> Result<ProcessOutput> + Send + Sync>;

    /// Answers commands from closures and records every invocation.
    pub(crate) struct ScriptedRunner {
        responder: Responder,
        available: HashSet<String>,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new(
            responder: impl Fn(&CommandSpec) -> Result<ProcessOutput> + Send + Sync + 'static,
        ) -> Self {
            Self {
                responder: Box::new(responder),
                available: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Marks a program as present on `PATH`.
        pub(crate) fn with_program(mut self, program: &str) -> Self {
            self.available.insert(program.to_string());
            self
        }

        pub(crate) fn calls(&self) -> Vec<CommandSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
            self.calls.lock().unwrap().push(spec.clone());
            (self.responder)(spec)
        }

        fn locate(&self, program: &str) -> Option<PathBuf> {
            self.available
                .contains(program)
                .then(|| PathBuf::from("/usr/bin").join(program))
        }
    }

    pub(crate) fn exited(code: i32, stdout: &str, stderr: &str) -> ProcessOutput {
        ProcessOutput {
            exit_code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }
}
