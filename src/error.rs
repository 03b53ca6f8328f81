//! Error types for the workflow contract checks.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for contract and smoke checks.
#[derive(Error, Debug)]
pub enum Error {
    /// The lint crate key is absent from every scope that was searched.
    #[error("{} does not declare {key} at the workflow root or under job `{job}`", .path.display())]
    MissingDeclaration {
        path: PathBuf,
        key: String,
        job: String,
    },

    /// The lint crate key is present but yields no names.
    #[error("{} declares {key} without any crate names", .path.display())]
    EmptyDeclaration { path: PathBuf, key: String },

    /// The lint crate key holds a value that cannot name crates.
    #[error("{} declares {key} in {scope} as {shape}; expected a string or a sequence of names", .path.display())]
    UnsupportedDeclaration {
        path: PathBuf,
        key: String,
        scope: String,
        shape: &'static str,
    },

    /// Declared lint crates that are not workspace packages.
    #[error(
        "workflow declares lint crates that are not workspace packages: {}",
        .missing.join(", ")
    )]
    UnresolvedCrateReference { missing: Vec<String> },

    /// The declared list breaks a required or forbidden crate rule.
    #[error("lint crate policy violated: {0}")]
    CratePolicy(String),

    /// The emulator binary is missing or cannot list the workflow.
    #[error("workflow emulator is unavailable: {0}")]
    InfrastructureUnavailable(String),

    /// The emulated job ran but did not meet the success criteria.
    #[error("{reason}:\n{logs}")]
    EmulatorJobFailure { reason: String, logs: String },

    /// An external tool exceeded its time budget.
    #[error("`{program}` timed out after {timeout:?}")]
    ToolTimeout { program: String, timeout: Duration },

    /// An external tool could not be started.
    #[error("failed to launch `{program}`: {source}")]
    ToolLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external tool exited unsuccessfully.
    #[error("`{program}` exited with status {}:\n{stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    ToolFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The workflow file is not valid YAML.
    #[error("failed to parse workflow {}: {reason}", .path.display())]
    WorkflowParse { path: PathBuf, reason: String },

    /// Cargo metadata output could not be interpreted.
    #[error("failed to parse workspace metadata: {0}")]
    Metadata(String),

    /// Harness configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error while reading inputs or preparing artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for contract checks.
pub type Result<T> = std::result::Result<T, Error>;
