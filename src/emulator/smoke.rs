//! Preflight, run and verdict for the emulated lint build.

use std::path::{Path, PathBuf};

use crate::config::{EmulatorConfig, HarnessConfig};
use crate::error::{Error, Result};
use crate::process::{regular_files, CommandRunner, ProcessOutput};
use crate::workflow::LintCrateList;

use super::invocation::EmulatorInvocation;

/// Whether, and how strictly, the smoke check runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmokeMode {
    /// Do not run; report a skip.
    #[default]
    Disabled,
    /// Run if the emulator is usable, otherwise skip.
    Opportunistic,
    /// Run, and fail if the emulator is unusable.
    Required,
}

impl SmokeMode {
    /// Derives the mode from the opt-in variable's value.
    ///
    /// Only the exact opt-in token enables the check; the caller reads the
    /// environment.
    pub fn from_opt_in(emulator: &EmulatorConfig, value: Option<&str>) -> Self {
        if emulator.is_opted_in(value) {
            SmokeMode::Required
        } else {
            SmokeMode::Disabled
        }
    }

    /// Combines the opt-in variable with an operator's request to run
    /// opportunistically.
    ///
    /// The opt-in variable always wins: once set, an unusable emulator is a
    /// failure even if `opportunistic` was also asked for.
    pub fn resolve(emulator: &EmulatorConfig, value: Option<&str>, opportunistic: bool) -> Self {
        match Self::from_opt_in(emulator, value) {
            SmokeMode::Disabled if opportunistic => SmokeMode::Opportunistic,
            mode => mode,
        }
    }
}

/// Evidence from a passing emulator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    /// Emulator exit code.
    pub exit_code: Option<i32>,
    /// Files the job exported.
    pub artifacts: Vec<PathBuf>,
    /// Combined emulator output.
    pub logs: String,
}

/// Result of the smoke check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeOutcome {
    /// The check did not run.
    Skipped { reason: String },
    /// The job ran and met every success criterion.
    Passed(SmokeReport),
}

/// Judges an emulator run against the success criteria.
///
/// The exit code, forbidden log signatures and artifact presence are checked
/// in that order; the first unmet criterion is reported with the full logs.
pub fn evaluate_run(
    output: &ProcessOutput,
    artifact_dir: &Path,
    forbidden_signatures: &[String],
) -> Result<SmokeReport> {
    let logs = output.combined();

    if !output.succeeded() {
        let status = output
            .exit_code
            .map_or_else(|| "a signal".to_string(), |code| format!("exit code {code}"));
        return Err(Error::EmulatorJobFailure {
            reason: format!("act job failed with {status}"),
            logs,
        });
    }

    if let Some(signature) = forbidden_signatures
        .iter()
        .find(|signature| logs.contains(signature.as_str()))
    {
        return Err(Error::EmulatorJobFailure {
            reason: format!("act job logged forbidden output '{signature}'"),
            logs,
        });
    }

    let artifacts = regular_files(artifact_dir)?;
    if artifacts.is_empty() {
        return Err(Error::EmulatorJobFailure {
            reason: format!(
                "act did not export any artefacts to {}",
                artifact_dir.display()
            ),
            logs,
        });
    }

    Ok(SmokeReport {
        exit_code: output.exit_code,
        artifacts,
        logs,
    })
}

async fn preflight(config: &HarnessConfig, runner: &dyn CommandRunner) -> Result<()> {
    let binary = &config.emulator.binary;
    let located = runner.locate(binary).ok_or_else(|| {
        Error::InfrastructureUnavailable(format!("`{binary}` was not found on PATH"))
    })?;
    tracing::debug!(binary = %located.display(), "emulator located");

    let spec = EmulatorInvocation::new(config).list_jobs();
    let output = match runner.run(&spec).await {
        Ok(output) => output,
        Err(Error::ToolTimeout { timeout, .. }) => {
            return Err(Error::InfrastructureUnavailable(format!(
                "`{}` did not list jobs within {} seconds",
                spec.display(),
                timeout.as_secs()
            )));
        }
        Err(Error::ToolLaunch { source, .. }) => {
            return Err(Error::InfrastructureUnavailable(format!(
                "failed to launch `{binary}`: {source}"
            )));
        }
        Err(e) => return Err(e),
    };

    if !output.succeeded() {
        return Err(Error::InfrastructureUnavailable(format!(
            "`{}` could not list jobs; is the container runtime reachable?\n{}",
            spec.display(),
            output.combined()
        )));
    }

    Ok(())
}

/// Runs the emulator smoke check.
///
/// A fresh artifact directory is created below `artifact_root` for each run.
pub async fn run_smoke_check(
    config: &HarnessConfig,
    mode: SmokeMode,
    lint_crates: &LintCrateList,
    runner: &dyn CommandRunner,
    artifact_root: &Path,
) -> Result<SmokeOutcome> {
    if mode == SmokeMode::Disabled {
        let reason = format!(
            "set {}={} to run act workflow smoke tests",
            config.emulator.opt_in_var, config.emulator.opt_in_token
        );
        tracing::info!(%reason, "skipping emulator smoke check");
        return Ok(SmokeOutcome::Skipped { reason });
    }

    if let Err(err) = preflight(config, runner).await {
        match (mode, err) {
            (SmokeMode::Opportunistic, Error::InfrastructureUnavailable(reason)) => {
                tracing::warn!(%reason, "emulator unavailable, skipping smoke check");
                return Ok(SmokeOutcome::Skipped { reason });
            }
            (_, err) => return Err(err),
        }
    }

    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let artifact_dir = artifact_root.join(format!("act-artifacts-{}", &run_id[..8]));
    std::fs::create_dir_all(&artifact_dir)?;

    let spec = EmulatorInvocation::new(config).run_job(lint_crates, &artifact_dir);
    tracing::info!(
        run_id = %run_id,
        job = %config.workflow.job,
        artifact_dir = %artifact_dir.display(),
        "running emulated job"
    );

    let output = runner.run(&spec).await?;
    let report = evaluate_run(&output, &artifact_dir, &config.emulator.forbidden_signatures)?;
    tracing::info!(
        run_id = %run_id,
        artifacts = report.artifacts.len(),
        "emulated job succeeded"
    );

    Ok(SmokeOutcome::Passed(report))
}
