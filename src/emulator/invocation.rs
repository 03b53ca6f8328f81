//! Command lines for the workflow emulator.

use std::path::{Path, PathBuf};

use crate::config::HarnessConfig;
use crate::process::CommandSpec;
use crate::workflow::LintCrateList;

/// Builds emulator commands for one workflow and job.
#[derive(Debug, Clone)]
pub struct EmulatorInvocation<'a> {
    config: &'a HarnessConfig,
}

impl<'a> EmulatorInvocation<'a> {
    /// Creates an invocation builder over the harness configuration.
    pub fn new(config: &'a HarnessConfig) -> Self {
        Self { config }
    }

    fn workflow_arg(&self) -> String {
        self.config.workflow.path.display().to_string()
    }

    /// Command that only lists the workflow's jobs.
    pub fn list_jobs(&self) -> CommandSpec {
        let emulator = &self.config.emulator;
        CommandSpec::new(
            &emulator.binary,
            &self.config.workspace_root,
            emulator.preflight_timeout(),
        )
        .arg(&emulator.event)
        .args(["-W".to_string(), self.workflow_arg()])
        .arg("--list")
    }

    /// Command that runs the configured job with artifacts exported to
    /// `artifact_dir`.
    pub fn run_job(&self, lint_crates: &LintCrateList, artifact_dir: &Path) -> CommandSpec {
        let emulator = &self.config.emulator;
        let mut spec = CommandSpec::new(
            &emulator.binary,
            &self.config.workspace_root,
            emulator.run_timeout(),
        )
        .arg(&emulator.event)
        .args(["-W".to_string(), self.workflow_arg()])
        .args(["-j", self.config.workflow.job.as_str()])
        .args(["-e".to_string(), self.event_path().display().to_string()]);

        for platform in &emulator.platforms {
            spec = spec.args(["-P", platform.as_str()]);
        }

        spec = spec
            .args([
                "--artifact-server-path".to_string(),
                artifact_dir.display().to_string(),
            ])
            .args(emulator.extra_args.iter().cloned());

        for (axis, value) in &emulator.matrix {
            spec = spec.args(["--matrix".to_string(), format!("{axis}:{value}")]);
        }

        spec.args([
            "--env".to_string(),
            format!("{}={}", self.config.workflow.key, lint_crates.space_joined()),
        ])
    }

    fn event_path(&self) -> PathBuf {
        self.config.emulator.event_path.clone()
    }
}
