//! Extraction of the declared lint crate list from a workflow definition.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{Error, Result};

/// Default environment key holding the lint crate list.
pub const DEFAULT_KEY: &str = "LINT_CRATES";

/// Default job whose environment may hold the lint crate list.
pub const DEFAULT_JOB: &str = "build-lints";

/// The subset of a workflow file the extractor cares about.
///
/// Environments are kept as raw values: an `env` written as an expression
/// string is legal in a workflow and simply declares nothing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowDocument {
    /// Workflow-level environment.
    #[serde(default)]
    pub env: Option<Value>,
    /// Job definitions by name.
    #[serde(default)]
    pub jobs: BTreeMap<String, JobDefinition>,
}

/// A single job definition; only its environment is read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDefinition {
    /// Job-level environment.
    #[serde(default)]
    pub env: Option<Value>,
}

impl WorkflowDocument {
    /// Parses a workflow document, naming `path` in any error.
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| Error::WorkflowParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn scope_value(&self, scope: &DeclarationScope, key: &str) -> Option<&Value> {
        let env = match scope {
            DeclarationScope::Root => self.env.as_ref(),
            DeclarationScope::Job(name) => self.jobs.get(name).and_then(|job| job.env.as_ref()),
        }?;
        env.as_mapping()?
            .get(key)
            .filter(|value| !value.is_null())
    }
}

/// Which scope is consulted first when looking up the lint crate key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupOrder {
    /// Workflow-level `env` before the job's `env`.
    #[default]
    RootFirst,
    /// The job's `env` before workflow-level `env`.
    JobFirst,
}

/// Where in the workflow a declaration was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationScope {
    /// Workflow-level `env`.
    Root,
    /// `jobs.<name>.env`.
    Job(String),
}

impl fmt::Display for DeclarationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclarationScope::Root => write!(f, "env"),
            DeclarationScope::Job(name) => write!(f, "jobs.{name}.env"),
        }
    }
}

/// How to find the lint crate declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintLookup {
    /// Environment key to read.
    pub key: String,
    /// Job whose environment is searched.
    pub job: String,
    /// Scope priority.
    pub order: LookupOrder,
}

impl Default for LintLookup {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY.to_string(),
            job: DEFAULT_JOB.to_string(),
            order: LookupOrder::default(),
        }
    }
}

impl LintLookup {
    /// Sets the scope priority.
    pub fn with_order(mut self, order: LookupOrder) -> Self {
        self.order = order;
        self
    }

    fn scopes(&self) -> [DeclarationScope; 2] {
        let job = DeclarationScope::Job(self.job.clone());
        match self.order {
            LookupOrder::RootFirst => [DeclarationScope::Root, job],
            LookupOrder::JobFirst => [job, DeclarationScope::Root],
        }
    }
}

/// A declared value, classified by shape.
#[derive(Debug, Clone, PartialEq)]
enum DeclaredValue {
    /// A YAML sequence; each element is one name.
    Sequence(Vec<String>),
    /// A string holding whitespace-separated names.
    Text(String),
    /// A boolean or number, stringified.
    Scalar(String),
}

impl DeclaredValue {
    /// Classifies `value`, or names the shape when it cannot hold crate names.
    fn classify(value: &Value) -> std::result::Result<Self, &'static str> {
        match value {
            Value::Sequence(items) => items
                .iter()
                .map(|item| scalar_text(item).ok_or("a sequence of collections"))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(DeclaredValue::Sequence),
            Value::String(text) => Ok(DeclaredValue::Text(text.clone())),
            Value::Mapping(_) => Err("a mapping"),
            Value::Tagged(tagged) => DeclaredValue::classify(&tagged.value),
            other => scalar_text(other)
                .map(DeclaredValue::Scalar)
                .ok_or("a collection"),
        }
    }

    fn into_names(self) -> Vec<String> {
        match self {
            DeclaredValue::Sequence(items) => items
                .iter()
                .map(|item| item.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            DeclaredValue::Text(text) | DeclaredValue::Scalar(text) => {
                text.split_whitespace().map(str::to_string).collect()
            }
        }
    }
}

/// Text of a scalar value; `None` for sequences and mappings.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Ordered, non-empty list of declared lint crate names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintCrateList {
    names: Vec<String>,
    scope: DeclarationScope,
}

impl LintCrateList {
    /// Returns the names in declaration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns where the declaration was found.
    pub fn scope(&self) -> &DeclarationScope {
        &self.scope
    }

    /// Returns the number of declared names, duplicates included.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false; an empty declaration is rejected on extraction.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns true if `name` is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Iterates names in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Joins the names with single spaces, the form the workflow expects in
    /// an environment override.
    pub fn space_joined(&self) -> String {
        self.names.join(" ")
    }
}

/// Extracts the lint crate list from workflow text.
///
/// `path` is only used for error messages.
pub fn extract_lint_crates(text: &str, path: &Path, lookup: &LintLookup) -> Result<LintCrateList> {
    let document = WorkflowDocument::parse(text, path)?;

    let (scope, value) = lookup
        .scopes()
        .into_iter()
        .find_map(|scope| {
            document
                .scope_value(&scope, &lookup.key)
                .map(|value| (scope, value))
        })
        .ok_or_else(|| Error::MissingDeclaration {
            path: path.to_path_buf(),
            key: lookup.key.clone(),
            job: lookup.job.clone(),
        })?;

    let names = DeclaredValue::classify(value)
        .map_err(|shape| Error::UnsupportedDeclaration {
            path: path.to_path_buf(),
            key: lookup.key.clone(),
            scope: scope.to_string(),
            shape,
        })?
        .into_names();
    if names.is_empty() {
        return Err(Error::EmptyDeclaration {
            path: path.to_path_buf(),
            key: lookup.key.clone(),
        });
    }

    tracing::debug!(
        workflow = %path.display(),
        scope = %scope,
        count = names.len(),
        "extracted lint crates"
    );

    Ok(LintCrateList { names, scope })
}

/// Reads a workflow file and extracts its lint crate list.
pub fn load_lint_crates(path: &Path, lookup: &LintLookup) -> Result<LintCrateList> {
    let text = std::fs::read_to_string(path)?;
    extract_lint_crates(&text, path, lookup)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(yaml: &str) -> Result<LintCrateList> {
        extract_lint_crates(yaml, Path::new("rolling-release.yml"), &LintLookup::default())
    }

    #[test]
    fn extracts_folded_block_at_root() {
        let yaml = "env:\n  LINT_CRATES: >-\n    alpha\n    beta\njobs: {}\n";
        let list = extract(yaml).unwrap();
        assert_eq!(list.names(), ["alpha", "beta"]);
        assert_eq!(list.scope(), &DeclarationScope::Root);
    }

    #[test]
    fn sequence_and_string_shapes_normalize_identically() {
        let text = extract("env:\n  LINT_CRATES: \"  alpha\\tbeta\\n gamma \"\n").unwrap();
        let sequence = extract("env:\n  LINT_CRATES:\n    - alpha\n    - ' beta '\n    - gamma\n").unwrap();
        assert_eq!(text, sequence);
    }

    #[test]
    fn sequence_drops_blank_elements() {
        let list = extract("env:\n  LINT_CRATES: [alpha, '', '  ', beta]\n").unwrap();
        assert_eq!(list.names(), ["alpha", "beta"]);
    }

    #[test]
    fn other_scalars_are_stringified() {
        let list = extract("env:\n  LINT_CRATES: 42\n").unwrap();
        assert_eq!(list.names(), ["42"]);
    }

    #[test]
    fn mapping_value_is_rejected_not_split() {
        let err = extract("env:\n  LINT_CRATES: {a: b}\n").unwrap_err();
        match &err {
            Error::UnsupportedDeclaration { key, scope, shape, .. } => {
                assert_eq!(key, "LINT_CRATES");
                assert_eq!(scope, "env");
                assert_eq!(*shape, "a mapping");
            }
            other => panic!("expected unsupported declaration, got {other:?}"),
        }
    }

    #[test]
    fn nested_sequence_elements_are_rejected() {
        let err = extract("env:\n  LINT_CRATES:\n    - alpha\n    - [beta, gamma]\n").unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedDeclaration { shape: "a sequence of collections", .. }
        ));
    }

    #[test]
    fn expression_env_elsewhere_does_not_block_lookup() {
        let yaml = r#"
env:
  LINT_CRATES: alpha
jobs:
  prepare:
    env: ${{ fromJSON(needs.setup.outputs.env) }}
"#;
        let list = extract(yaml).unwrap();
        assert_eq!(list.names(), ["alpha"]);
    }

    #[test]
    fn expression_root_env_falls_back_to_job() {
        let yaml = r#"
env: ${{ vars.SHARED_ENV }}
jobs:
  build-lints:
    env:
      LINT_CRATES: beta
"#;
        let list = extract(yaml).unwrap();
        assert_eq!(list.names(), ["beta"]);
        assert_eq!(list.scope(), &DeclarationScope::Job("build-lints".to_string()));
    }

    #[test]
    fn expression_env_in_every_scope_is_missing() {
        let yaml = "env: ${{ vars.A }}\njobs:\n  build-lints:\n    env: ${{ vars.B }}\n";
        let err = extract(yaml).unwrap_err();
        assert!(matches!(err, Error::MissingDeclaration { .. }));
    }

    #[test]
    fn duplicates_are_preserved_in_order() {
        let list = extract("env:\n  LINT_CRATES: beta alpha beta\n").unwrap();
        assert_eq!(list.names(), ["beta", "alpha", "beta"]);
        assert_eq!(list.space_joined(), "beta alpha beta");
    }

    #[test]
    fn falls_back_to_job_environment() {
        let yaml = r#"
on:
  workflow_dispatch:
jobs:
  build-lints:
    runs-on: ubuntu-latest
    env:
      LINT_CRATES: alpha beta
"#;
        let list = extract(yaml).unwrap();
        assert_eq!(list.names(), ["alpha", "beta"]);
        assert_eq!(list.scope(), &DeclarationScope::Job("build-lints".to_string()));
    }

    #[test]
    fn lookup_order_decides_between_scopes() {
        let yaml = r#"
env:
  LINT_CRATES: root_crate
jobs:
  build-lints:
    env:
      LINT_CRATES: job_crate
"#;
        let path = Path::new("wf.yml");
        let root_first = extract_lint_crates(yaml, path, &LintLookup::default()).unwrap();
        assert_eq!(root_first.names(), ["root_crate"]);

        let lookup = LintLookup::default().with_order(LookupOrder::JobFirst);
        let job_first = extract_lint_crates(yaml, path, &lookup).unwrap();
        assert_eq!(job_first.names(), ["job_crate"]);
    }

    #[test]
    fn other_jobs_are_not_searched() {
        let yaml = "jobs:\n  release:\n    env:\n      LINT_CRATES: alpha\n";
        let err = extract(yaml).unwrap_err();
        assert!(matches!(err, Error::MissingDeclaration { .. }));
    }

    #[test]
    fn missing_key_names_the_file() {
        let err = extract("env:\n  OTHER: value\njobs: {}\n").unwrap_err();
        match &err {
            Error::MissingDeclaration { path, key, job } => {
                assert_eq!(key, "LINT_CRATES");
                assert_eq!(path, Path::new("rolling-release.yml"));
                assert_eq!(job, "build-lints");
            }
            other => panic!("expected missing declaration, got {other:?}"),
        }
        assert!(err.to_string().contains("rolling-release.yml"));
    }

    #[test]
    fn null_value_is_missing_not_empty() {
        let err = extract("env:\n  LINT_CRATES:\n").unwrap_err();
        assert!(matches!(err, Error::MissingDeclaration { .. }));
    }

    #[test]
    fn blank_string_is_empty_declaration() {
        let err = extract("env:\n  LINT_CRATES: \"   \"\n").unwrap_err();
        assert!(matches!(err, Error::EmptyDeclaration { .. }));
    }

    #[test]
    fn empty_sequence_is_empty_declaration() {
        let err = extract("env:\n  LINT_CRATES: []\n").unwrap_err();
        assert!(matches!(err, Error::EmptyDeclaration { .. }));
    }

    #[test]
    fn invalid_yaml_reports_parse_error() {
        let err = extract("env: [unclosed\n").unwrap_err();
        assert!(matches!(err, Error::WorkflowParse { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("wf.yml");
        std::fs::write(&path, "env:\n  LINT_CRATES: alpha\n").unwrap();

        let list = load_lint_crates(&path, &LintLookup::default()).unwrap();
        assert_eq!(list.names(), ["alpha"]);
    }
}
