//! Harness configuration.
//!
//! Loaded from an optional `workflow-contract.toml` at the workspace root and
//! validated before any check runs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::workflow::{LintLookup, LookupOrder, DEFAULT_JOB, DEFAULT_KEY};

/// File name looked up at the workspace root.
pub const CONFIG_FILE: &str = "workflow-contract.toml";

/// Log text that means cargo was asked to build a crate outside the workspace.
pub const WORKSPACE_BOUNDARY_SIGNATURE: &str =
    "cannot specify features for packages outside of workspace";

/// Which workflow and declaration to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Workflow path relative to the workspace root.
    #[serde(default = "default_workflow_path")]
    pub path: PathBuf,
    /// Job that consumes the lint crate list.
    #[serde(default = "default_job")]
    pub job: String,
    /// Environment key holding the list.
    #[serde(default = "default_key")]
    pub key: String,
    /// Scope priority for the lookup.
    #[serde(default)]
    pub lookup: LookupOrder,
}

fn default_workflow_path() -> PathBuf {
    PathBuf::from(".github/workflows/rolling-release.yml")
}

fn default_job() -> String {
    DEFAULT_JOB.to_string()
}

fn default_key() -> String {
    DEFAULT_KEY.to_string()
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            path: default_workflow_path(),
            job: default_job(),
            key: default_key(),
            lookup: LookupOrder::default(),
        }
    }
}

impl WorkflowConfig {
    /// Returns the lookup settings for the extractor.
    pub fn lookup(&self) -> LintLookup {
        LintLookup {
            key: self.key.clone(),
            job: self.job.clone(),
            order: self.lookup,
        }
    }
}

/// How to query the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Cargo binary.
    #[serde(default = "default_cargo")]
    pub cargo: String,
    /// Timeout for `cargo metadata` in seconds.
    #[serde(default = "default_metadata_timeout")]
    pub metadata_timeout_secs: u64,
}

fn default_cargo() -> String {
    "cargo".to_string()
}

fn default_metadata_timeout() -> u64 {
    120
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            cargo: default_cargo(),
            metadata_timeout_secs: default_metadata_timeout(),
        }
    }
}

impl WorkspaceConfig {
    /// Returns the metadata timeout as a Duration.
    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }
}

/// Crate names that must, or must not, appear in the declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CratePolicy {
    /// Names that must be declared.
    #[serde(default)]
    pub required: Vec<String>,
    /// Names that must not be declared.
    #[serde(default)]
    pub forbidden: Vec<String>,
}

/// How to drive the workflow emulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Emulator binary.
    #[serde(default = "default_binary")]
    pub binary: String,
    /// Event that triggers the workflow.
    #[serde(default = "default_event")]
    pub event: String,
    /// Event payload relative to the workspace root.
    #[serde(default = "default_event_path")]
    pub event_path: PathBuf,
    /// Runner label to image mappings.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
    /// Matrix axis overrides.
    #[serde(default = "default_matrix")]
    pub matrix: BTreeMap<String, String>,
    /// Flags appended after the artifact server path.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
    /// Preflight listing timeout in seconds.
    #[serde(default = "default_preflight_timeout")]
    pub preflight_timeout_secs: u64,
    /// Job run timeout in seconds.
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
    /// Log substrings that fail the run even on exit code zero.
    #[serde(default = "default_forbidden_signatures")]
    pub forbidden_signatures: Vec<String>,
    /// Environment variable that opts in to the smoke check.
    #[serde(default = "default_opt_in_var")]
    pub opt_in_var: String,
    /// Exact value of `opt_in_var` that enables the check.
    #[serde(default = "default_opt_in_token")]
    pub opt_in_token: String,
}

fn default_binary() -> String {
    "act".to_string()
}

fn default_event() -> String {
    "workflow_dispatch".to_string()
}

fn default_event_path() -> PathBuf {
    PathBuf::from("tests/workflows/fixtures/workflow_dispatch.rolling-release.event.json")
}

fn default_platforms() -> Vec<String> {
    vec!["ubuntu-latest=catthehacker/ubuntu:act-latest".to_string()]
}

fn default_matrix() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("os".to_string(), "ubuntu-latest".to_string()),
        ("target".to_string(), "x86_64-unknown-linux-gnu".to_string()),
    ])
}

fn default_extra_args() -> Vec<String> {
    vec!["--json".to_string(), "--bind".to_string()]
}

fn default_preflight_timeout() -> u64 {
    60
}

fn default_run_timeout() -> u64 {
    3600
}

fn default_forbidden_signatures() -> Vec<String> {
    vec![WORKSPACE_BOUNDARY_SIGNATURE.to_string()]
}

fn default_opt_in_var() -> String {
    "ACT_WORKFLOW_TESTS".to_string()
}

fn default_opt_in_token() -> String {
    "1".to_string()
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            event: default_event(),
            event_path: default_event_path(),
            platforms: default_platforms(),
            matrix: default_matrix(),
            extra_args: default_extra_args(),
            preflight_timeout_secs: default_preflight_timeout(),
            run_timeout_secs: default_run_timeout(),
            forbidden_signatures: default_forbidden_signatures(),
            opt_in_var: default_opt_in_var(),
            opt_in_token: default_opt_in_token(),
        }
    }
}

impl EmulatorConfig {
    /// Returns the preflight timeout as a Duration.
    pub fn preflight_timeout(&self) -> Duration {
        Duration::from_secs(self.preflight_timeout_secs)
    }

    /// Returns the run timeout as a Duration.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Returns true if `value` is exactly the opt-in token.
    pub fn is_opted_in(&self, value: Option<&str>) -> bool {
        value == Some(self.opt_in_token.as_str())
    }
}

/// Top-level harness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Workspace the checks run against; set by the loader, not the file.
    #[serde(skip)]
    pub workspace_root: PathBuf,
    /// Workflow settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Workspace query settings.
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    /// Required and forbidden crate names.
    #[serde(default)]
    pub policy: CratePolicy,
    /// Emulator settings.
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

impl HarnessConfig {
    /// Creates a default configuration rooted at `workspace_root`.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Default::default()
        }
    }

    /// Loads `workflow-contract.toml` from `workspace_root` if it exists,
    /// otherwise returns defaults.
    pub fn load(workspace_root: impl Into<PathBuf>) -> Result<Self> {
        let workspace_root = workspace_root.into();
        let path = workspace_root.join(CONFIG_FILE);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no harness config, using defaults");
            return Ok(Self::new(workspace_root));
        }
        Self::load_file(workspace_root, &path)
    }

    /// Loads configuration from an explicit file.
    pub fn load_file(workspace_root: impl Into<PathBuf>, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.workspace_root = workspace_root.into();
        Ok(config)
    }

    /// Parses configuration text; the workspace root is left empty.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Absolute path of the workflow file.
    pub fn workflow_path(&self) -> PathBuf {
        self.workspace_root.join(&self.workflow.path)
    }
}

/// Issues found while validating a harness configuration.
///
/// Messages are qualified with the TOML section they belong to, so a merged
/// result reads `emulator.binary cannot be empty` rather than a bare field.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Settings that make a check impossible to run.
    pub errors: Vec<String>,
    /// Settings that are usable but probably unintended.
    pub warnings: Vec<String>,
    section: &'static str,
}

impl ValidationResult {
    /// Starts a result for one configuration section.
    pub fn section(section: &'static str) -> Self {
        Self {
            section,
            ..Self::default()
        }
    }

    /// Returns true if no errors were recorded.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records a fatal issue.
    pub fn add_error(&mut self, msg: impl AsRef<str>) {
        let msg = self.qualify(msg.as_ref());
        self.errors.push(msg);
    }

    /// Records a non-fatal issue.
    pub fn add_warning(&mut self, msg: impl AsRef<str>) {
        let msg = self.qualify(msg.as_ref());
        self.warnings.push(msg);
    }

    /// Records an error if `value` is blank.
    pub fn require_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add_error(format!("{field} cannot be empty"));
        }
    }

    /// Records an error if a seconds setting is zero.
    pub fn require_seconds(&mut self, field: &str, secs: u64) {
        if secs == 0 {
            self.add_error(format!("{field} must be at least 1"));
        }
    }

    /// Appends the issues of another section.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Returns the warnings, or a `Config` error listing every fatal issue.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            return Ok(self.warnings);
        }
        Err(Error::Config(format!(
            "{} invalid setting(s): {}",
            self.errors.len(),
            self.errors.join("; ")
        )))
    }

    fn qualify(&self, msg: &str) -> String {
        if self.section.is_empty() {
            msg.to_string()
        } else {
            format!("{}.{}", self.section, msg)
        }
    }
}

/// Configuration sections that can check their own settings.
pub trait Validate {
    /// Returns every issue found; an empty result means the section is usable.
    fn validate(&self) -> ValidationResult;
}

impl Validate for WorkflowConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::section("workflow");
        result.require_text("path", &self.path.to_string_lossy());
        result.require_text("job", &self.job);
        result.require_text("key", &self.key);
        result
    }
}

impl Validate for WorkspaceConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::section("workspace");
        result.require_text("cargo", &self.cargo);
        result.require_seconds("metadata_timeout_secs", self.metadata_timeout_secs);
        result
    }
}

impl Validate for CratePolicy {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::section("policy");
        for name in self.required.iter().filter(|name| self.forbidden.contains(name)) {
            result.add_error(format!("required and forbidden both name '{}'", name));
        }
        result
    }
}

impl Validate for EmulatorConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::section("emulator");
        result.require_text("binary", &self.binary);
        result.require_text("opt_in_var", &self.opt_in_var);
        result.require_seconds("preflight_timeout_secs", self.preflight_timeout_secs);
        result.require_seconds("run_timeout_secs", self.run_timeout_secs);

        if self.preflight_timeout_secs >= self.run_timeout_secs {
            result.add_warning("preflight_timeout_secs is not shorter than run_timeout_secs");
        }
        if self.forbidden_signatures.is_empty() {
            result.add_warning("forbidden_signatures is empty, only exit code and artifacts are checked");
        }
        for mapping in self.platforms.iter().filter(|m| !m.contains('=')) {
            result.add_error(format!(
                "platforms entry '{}' must have the form <label>=<image>",
                mapping
            ));
        }

        result
    }
}

impl Validate for HarnessConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        result.merge(self.workflow.validate());
        result.merge(self.workspace.validate());
        result.merge(self.policy.validate());
        result.merge(self.emulator.validate());
        result
    }
}
