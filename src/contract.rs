//! Fast contract check: declared lint crates must be workspace packages.

use std::collections::BTreeSet;

use crate::config::{CratePolicy, HarnessConfig};
use crate::error::{Error, Result};
use crate::metadata::{query_workspace_packages, WorkspacePackageSet};
use crate::process::CommandRunner;
use crate::workflow::{load_lint_crates, LintCrateList};

/// Outcome of a passing contract check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractReport {
    /// The declared lint crates, as extracted.
    pub declared: LintCrateList,
    /// Number of packages the workspace reported.
    pub workspace_packages: usize,
}

/// Returns declared names absent from the workspace, sorted and deduplicated.
pub fn unresolved_crates(declared: &LintCrateList, workspace: &WorkspacePackageSet) -> Vec<String> {
    declared
        .iter()
        .filter(|name| !workspace.contains(name))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn policy_violations(declared: &LintCrateList, policy: &CratePolicy) -> Vec<String> {
    let missing_required = policy
        .required
        .iter()
        .filter(|name| !declared.contains(name))
        .map(|name| format!("required crate '{}' is not declared", name));

    let present_forbidden = policy
        .forbidden
        .iter()
        .filter(|name| declared.contains(name))
        .map(|name| format!("crate '{}' must not be declared", name));

    missing_required.chain(present_forbidden).collect()
}

/// Checks a declaration against workspace packages and the crate policy.
pub fn check_contract(
    declared: &LintCrateList,
    workspace: &WorkspacePackageSet,
    policy: &CratePolicy,
) -> Result<()> {
    let missing = unresolved_crates(declared, workspace);
    if !missing.is_empty() {
        return Err(Error::UnresolvedCrateReference { missing });
    }

    let violations = policy_violations(declared, policy);
    if !violations.is_empty() {
        return Err(Error::CratePolicy(violations.join("; ")));
    }

    Ok(())
}

/// Extracts the declaration, queries the workspace and checks the contract.
pub async fn run_contract_check(
    config: &HarnessConfig,
    runner: &dyn CommandRunner,
) -> Result<ContractReport> {
    let workflow_path = config.workflow_path();
    let declared = load_lint_crates(&workflow_path, &config.workflow.lookup())?;
    tracing::info!(
        workflow = %workflow_path.display(),
        scope = %declared.scope(),
        crates = %declared.space_joined(),
        "loaded lint crate declaration"
    );

    let workspace = query_workspace_packages(
        runner,
        &config.workspace.cargo,
        &config.workspace_root,
        config.workspace.metadata_timeout(),
    )
    .await?;

    check_contract(&declared, &workspace, &config.policy)?;
    tracing::info!(
        declared = declared.len(),
        workspace_packages = workspace.len(),
        "lint crate contract holds"
    );

    Ok(ContractReport {
        declared,
        workspace_packages: workspace.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::process::testing::{exited, ScriptedRunner};
    use crate::workflow::{extract_lint_crates, LintLookup};

    const WORKFLOW: &str = "env:\n  LINT_CRATES: >-\n    alpha\n    beta\n";

    fn declared() -> LintCrateList {
        extract_lint_crates(WORKFLOW, Path::new("wf.yml"), &LintLookup::default()).unwrap()
    }

    fn workspace(names: &[&str]) -> WorkspacePackageSet {
        names.iter().copied().collect()
    }

    #[test]
    fn passes_when_every_crate_is_a_package() {
        let result = check_contract(
            &declared(),
            &workspace(&["alpha", "beta", "gamma"]),
            &CratePolicy::default(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn failure_names_only_the_missing_crate() {
        let err = check_contract(
            &declared(),
            &workspace(&["alpha", "gamma"]),
            &CratePolicy::default(),
        )
        .unwrap_err();

        let message = err.to_string();
        assert_eq!(
            message,
            "workflow declares lint crates that are not workspace packages: beta"
        );
        assert!(message.contains("beta"));
        assert!(!message.contains("alpha"));
        assert!(!message.contains("gamma"));
    }

    #[test]
    fn removing_any_single_package_is_detected() {
        let full = workspace(&["alpha", "beta", "gamma"]);
        for name in ["alpha", "beta"] {
            let reduced = full.without(name);
            match check_contract(&declared(), &reduced, &CratePolicy::default()) {
                Err(Error::UnresolvedCrateReference { missing }) => assert_eq!(missing, vec![name]),
                other => panic!("expected unresolved {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn unresolved_names_are_sorted_and_deduplicated() {
        let list = extract_lint_crates(
            "env:\n  LINT_CRATES: zeta alpha zeta mu\n",
            Path::new("wf.yml"),
            &LintLookup::default(),
        )
        .unwrap();
        let missing = unresolved_crates(&list, &workspace(&["alpha"]));
        assert_eq!(missing, vec!["mu", "zeta"]);

        let err = check_contract(&list, &workspace(&["alpha"]), &CratePolicy::default()).unwrap_err();
        assert!(err.to_string().ends_with("mu, zeta"));
    }

    #[test]
    fn check_is_idempotent() {
        let list = declared();
        let packages = workspace(&["alpha"]);
        let first = check_contract(&list, &packages, &CratePolicy::default()).map_err(|e| e.to_string());
        let second = check_contract(&list, &packages, &CratePolicy::default()).map_err(|e| e.to_string());
        assert_eq!(first, second);
    }

    #[test]
    fn policy_reports_required_and_forbidden_crates() {
        let list = extract_lint_crates(
            "env:\n  LINT_CRATES: suite module_max_lines\n",
            Path::new("wf.yml"),
            &LintLookup::default(),
        )
        .unwrap();
        let policy = CratePolicy {
            required: vec!["whitaker_suite".to_string()],
            forbidden: vec!["suite".to_string()],
        };

        let err = check_contract(&list, &workspace(&["suite", "module_max_lines"]), &policy)
            .unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, Error::CratePolicy(_)));
        assert!(message.contains("required crate 'whitaker_suite' is not declared"));
        assert!(message.contains("crate 'suite' must not be declared"));
    }

    #[tokio::test]
    async fn run_contract_check_reads_workflow_and_metadata() {
        let temp = tempfile::TempDir::new().unwrap();
        let workflow_dir = temp.path().join(".github/workflows");
        std::fs::create_dir_all(&workflow_dir).unwrap();
        std::fs::write(workflow_dir.join("rolling-release.yml"), WORKFLOW).unwrap();

        let runner = ScriptedRunner::new(|_| {
            Ok(exited(
                0,
                r#"{"packages":[{"name":"alpha"},{"name":"beta"},{"name":"gamma"}]}"#,
                "",
            ))
        });
        let config = HarnessConfig::new(temp.path());

        let report = run_contract_check(&config, &runner).await.unwrap();
        assert_eq!(report.declared.names(), ["alpha", "beta"]);
        assert_eq!(report.workspace_packages, 3);
        assert_eq!(runner.calls()[0].working_dir, temp.path());
    }
}
