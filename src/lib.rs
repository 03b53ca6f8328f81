//! Workflow Contract - checks for the rolling release lint workflow.
//!
//! Confirms that the workflow's declared lint crates are real workspace
//! packages, and optionally runs the `build-lints` job under `act` to catch
//! integration regressions before they reach hosted CI.

pub mod config;
pub mod contract;
pub mod emulator;
pub mod error;
pub mod metadata;
pub mod process;
pub mod workflow;

pub use error::{Error, Result};

pub use config::{
    CratePolicy, EmulatorConfig, HarnessConfig, Validate, ValidationResult, WorkflowConfig,
    WorkspaceConfig, CONFIG_FILE, WORKSPACE_BOUNDARY_SIGNATURE,
};
pub use contract::{check_contract, run_contract_check, unresolved_crates, ContractReport};
pub use emulator::{
    evaluate_run, run_smoke_check, EmulatorInvocation, SmokeMode, SmokeOutcome, SmokeReport,
};
pub use metadata::{query_workspace_packages, WorkspacePackageSet};
pub use process::{CommandRunner, CommandSpec, ProcessOutput, SystemRunner};
pub use workflow::{
    extract_lint_crates, load_lint_crates, DeclarationScope, LintCrateList, LintLookup,
    LookupOrder, WorkflowDocument,
};
