//! The parsed data model shared by the parser, the check engine, and the
//! policy loader.
//!
//! This mirrors the shape described by the specification's data model: a
//! [`Workflow`] owns a set of triggers and [`Job`]s; each [`Job`] owns an
//! ordered sequence of [`Step`]s; each [`Step`] optionally references an
//! action (`uses:`) or an inline shell body (`run:`).

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

/// A 1-based source position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Totally ordered permission level. `Unknown` compares greater than
/// `Write`, i.e. any unrecognized value is treated as maximally elevated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PermissionLevel {
    None,
    Read,
    Write,
    Unknown,
}

impl PermissionLevel {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "none" => Self::None,
            "read" => Self::Read,
            "write" => Self::Write,
            _ => Self::Unknown,
        }
    }
}

/// A single declared permission entry, with its justification metadata.
#[derive(Clone, Debug, Serialize)]
pub struct PermissionEntry {
    pub level: PermissionLevel,
    pub has_justification: bool,
}

/// A mapping from permission name (e.g. `contents`) to its declared entry.
pub type Permissions = BTreeMap<String, PermissionEntry>;

/// A `with:` value together with the position of its key.
#[derive(Clone, Debug, Serialize)]
pub struct WithValue {
    pub value: String,
    pub position: Position,
}

/// A single line of a `run:` body, with its source position.
#[derive(Clone, Debug, Serialize)]
pub struct RunLine {
    pub text: String,
    pub position: Position,
}

/// A parsed `uses:` reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionRef {
    /// The portion before `@`, e.g. `owner/repo/subpath` or `./local/path`
    /// or `docker://image`.
    pub action: String,
    /// The portion after `@`, verbatim. Empty when there is no `@`.
    pub reference: String,
}

impl ActionRef {
    /// Parses a raw `uses:` string into an action/ref pair.
    ///
    /// Docker references keep their full `docker://...` form in `action`
    /// and split on the *last* `@`, since tags such as
    /// `docker://example.com/img@sha256:...` contain no other `@`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.rsplit_once('@') {
            Some((action, reference)) => Self {
                action: action.to_string(),
                reference: reference.to_string(),
            },
            None => Self {
                action: raw.to_string(),
                reference: String::new(),
            },
        }
    }

    pub fn is_local(&self) -> bool {
        self.action.starts_with("./") || self.action.starts_with(".github/")
    }

    pub fn is_docker(&self) -> bool {
        self.action.starts_with("docker://")
    }

    /// The `owner/repo` projection of a remote action reference, ignoring
    /// any subpath beyond the first two segments.
    pub fn owner_repo(&self) -> Option<&str> {
        if self.is_local() || self.is_docker() {
            return None;
        }
        let mut parts = self.action.splitn(3, '/');
        let owner = parts.next()?;
        let repo = parts.next()?;
        // Reconstruct the owner/repo slice from the original string so we
        // don't allocate; find it by byte length.
        let len = owner.len() + 1 + repo.len();
        self.action.get(..len)
    }

    /// True iff the ref is exactly 40 lowercase hex characters.
    pub fn is_sha_shaped(&self) -> bool {
        self.reference.len() == 40 && self.reference.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase())
    }
}

/// A single step within a job.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Step {
    pub name: Option<String>,
    pub id: Option<String>,
    pub uses: Option<ActionRef>,
    pub uses_position: Option<Position>,
    pub run: String,
    pub run_lines: Vec<RunLine>,
    pub with: IndexMap<String, WithValue>,
    pub position: Position,
}

impl Step {
    pub fn with_str(&self, key: &str) -> Option<&str> {
        self.with.get(key).map(|v| v.value.as_str())
    }
}

/// A single job within a workflow.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Job {
    pub permissions_declared: bool,
    pub permissions: Permissions,
    pub steps: Vec<Step>,
    pub position: Position,
}

/// A fully parsed workflow or composite-action file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Workflow {
    pub triggers: Vec<String>,
    pub permissions_declared: bool,
    pub permissions: Permissions,
    pub jobs: IndexMap<String, Job>,
}

impl Workflow {
    /// The workflow key: the file basename with its `.yml`/`.yaml`
    /// extension stripped. Used for policy lookups.
    pub fn key_of(path: &camino::Utf8Path) -> String {
        let name = path.file_name().unwrap_or_default();
        name.strip_suffix(".yaml")
            .or_else(|| name.strip_suffix(".yml"))
            .unwrap_or(name)
            .to_string()
    }
}

/// A parser warning attached to a parse result; never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum ParseWarning {
    YamlAlias { line: usize },
    StepCountMismatch { job_id: String, yaml_count: usize, line_count: usize },
    NotYamlObject,
}

/// The result of parsing a single workflow/action file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ParsedFile {
    pub workflow: Workflow,
    pub warnings: Vec<ParseWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_level_orders_unknown_above_write() {
        assert!(PermissionLevel::Write < PermissionLevel::Unknown);
        assert!(PermissionLevel::None < PermissionLevel::Read);
        assert!(PermissionLevel::Read < PermissionLevel::Write);
        assert_eq!(PermissionLevel::parse("bogus"), PermissionLevel::Unknown);
    }

    #[test]
    fn action_ref_splits_on_last_at() {
        let r = ActionRef::parse("actions/checkout@v4");
        assert_eq!(r.action, "actions/checkout");
        assert_eq!(r.reference, "v4");
        assert_eq!(r.owner_repo(), Some("actions/checkout"));
        assert!(!r.is_sha_shaped());
    }

    #[test]
    fn action_ref_recognizes_sha() {
        let sha = "a".repeat(40);
        let r = ActionRef::parse(&format!("actions/checkout@{sha}"));
        assert!(r.is_sha_shaped());
    }

    #[test]
    fn action_ref_detects_local_and_docker() {
        assert!(ActionRef::parse("./.github/actions/foo").is_local());
        assert!(ActionRef::parse(".github/actions/foo").is_local());
        assert!(ActionRef::parse("docker://alpine:3").is_docker());
        assert!(!ActionRef::parse("actions/checkout@v4").is_local());
    }

    #[test]
    fn owner_repo_ignores_subpath() {
        let r = ActionRef::parse("actions/aws-actions/configure@v1");
        assert_eq!(r.owner_repo(), Some("actions/aws-actions"));
    }

    #[test]
    fn workflow_key_strips_extension() {
        let p = camino::Utf8PathBuf::from(".github/workflows/deploy.yml");
        assert_eq!(Workflow::key_of(&p), "deploy");
    }
}
