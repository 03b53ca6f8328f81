//! Workspace package discovery via `cargo metadata`.

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::process::{CommandRunner, CommandSpec};

#[derive(Debug, Deserialize)]
struct Metadata {
    packages: Vec<PackageEntry>,
}

#[derive(Debug, Deserialize)]
struct PackageEntry {
    name: String,
}

/// Names of the packages a cargo workspace manages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspacePackageSet {
    names: BTreeSet<String>,
}

impl WorkspacePackageSet {
    /// Parses `cargo metadata --format-version 1` JSON output.
    pub fn from_metadata_json(json: &str) -> Result<Self> {
        let metadata: Metadata =
            serde_json::from_str(json).map_err(|e| Error::Metadata(e.to_string()))?;
        Ok(metadata.packages.into_iter().map(|p| p.name).collect())
    }

    /// Returns true if the workspace has a package called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Returns the number of packages.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the workspace reported no packages.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Iterates package names in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Returns a copy without `name`.
    pub fn without(&self, name: &str) -> Self {
        let mut names = self.names.clone();
        names.remove(name);
        Self { names }
    }
}

impl<S: Into<String>> FromIterator<S> for WorkspacePackageSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Builds the `cargo metadata` invocation for `workspace_root`.
pub fn metadata_command(cargo: &str, workspace_root: &Path, timeout: Duration) -> CommandSpec {
    CommandSpec::new(cargo, workspace_root, timeout).args([
        "metadata",
        "--format-version",
        "1",
        "--no-deps",
    ])
}

/// Queries cargo for the workspace's package names.
pub async fn query_workspace_packages(
    runner: &dyn CommandRunner,
    cargo: &str,
    workspace_root: &Path,
    timeout: Duration,
) -> Result<WorkspacePackageSet> {
    let spec = metadata_command(cargo, workspace_root, timeout);
    tracing::info!(workspace = %workspace_root.display(), "querying workspace packages");

    let output = runner.run(&spec).await?;
    if !output.succeeded() {
        return Err(Error::ToolFailed {
            program: spec.display(),
            code: output.exit_code,
            stderr: output.stderr,
        });
    }

    let packages = WorkspacePackageSet::from_metadata_json(&output.stdout)?;
    tracing::debug!(count = packages.len(), "workspace packages resolved");
    Ok(packages)
}
