use thiserror::Error;

/// The closed taxonomy of user-facing error codes from spec.md §7.
///
/// Every variant has its own `Display` message; `code()` returns the
/// stable machine-readable string surfaced to CI logs and to the `fail`
/// plugin step.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("not a git repository")]
    NoGitRepo,

    #[error("could not determine repository URL")]
    NoRepoUrl,

    #[error("no permission to push to the repository: {0}")]
    GitNoPermission(String),

    #[error("invalid tag format '{0}': {1}")]
    InvalidTagFormat(String, String),

    #[error("tagFormat '{0}' does not contain the version placeholder")]
    TagNoVersion(String),

    #[error("invalid branch entry: {0}")]
    InvalidBranch(String),

    #[error("duplicate branch name: {0}")]
    DuplicateBranches(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid maintenance branch '{0}': {1}")]
    MaintenanceBranch(String, String),

    #[error("maintenance branch ranges overlap: {0}")]
    MaintenanceBranches(String),

    #[error("release branch configuration invalid: {0}")]
    ReleaseBranches(String),

    #[error("invalid prerelease branch '{0}': {1}")]
    PrereleaseBranch(String, String),

    #[error("computed next version {0} is outside the range allowed for branch '{1}' ({2})")]
    InvalidNextVersion(String, String, String),

    #[error("version {0} cannot be merged onto maintenance branch '{1}': outside mergeRange {2}")]
    InvalidLtsMerge(String, String, String),

    #[error("git error: {0}")]
    Git(String),

    #[error("vcs provider error: {0}")]
    Vcs(String),

    #[error("plugin step '{step}' failed: {message}")]
    Plugin { step: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("changelog error: {0}")]
    Changelog(String),

    #[error("version file error: {0}")]
    VersionBump(String),

    #[error("no commits found since last release")]
    NoCommits,

    #[error("no releasable commits found (analyzeCommits returned no bump)")]
    NoBump,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReleaseError {
    /// The stable, machine-readable error code from spec.md §7.
    pub fn code(&self) -> &'static str {
        match self {
            ReleaseError::NoGitRepo => "ENOGITREPO",
            ReleaseError::NoRepoUrl => "ENOREPOURL",
            ReleaseError::GitNoPermission(_) => "EGITNOPERMISSION",
            ReleaseError::InvalidTagFormat(..) => "EINVALIDTAGFORMAT",
            ReleaseError::TagNoVersion(_) => "ETAGNOVERSION",
            ReleaseError::InvalidBranch(_) => "EINVALIDBRANCH",
            ReleaseError::DuplicateBranches(_) => "EDUPLICATEBRANCHES",
            ReleaseError::InvalidBranchName(_) => "EINVALIDBRANCHNAME",
            ReleaseError::MaintenanceBranch(..) => "EMAINTENANCEBRANCH",
            ReleaseError::MaintenanceBranches(_) => "EMAINTENANCEBRANCHES",
            ReleaseError::ReleaseBranches(_) => "ERELEASEBRANCHES",
            ReleaseError::PrereleaseBranch(..) => "EPRERELEASEBRANCH",
            ReleaseError::InvalidNextVersion(..) => "EINVALIDNEXTVERSION",
            ReleaseError::InvalidLtsMerge(..) => "EINVALIDLTSMERGE",
            ReleaseError::Git(_) => "EGIT",
            ReleaseError::Vcs(_) => "EVCS",
            ReleaseError::Plugin { .. } => "EPLUGIN",
            ReleaseError::Config(_) => "ECONFIG",
            ReleaseError::Changelog(_) => "ECHANGELOG",
            ReleaseError::VersionBump(_) => "EVERSIONBUMP",
            ReleaseError::NoCommits => "ENOCOMMITS",
            ReleaseError::NoBump => "ENOBUMP",
            ReleaseError::Other(_) => "EUNKNOWN",
        }
    }

    /// Whether this error is user-facing (semanticRelease-marked) and
    /// therefore eligible to be passed to the `fail` plugin step, per
    /// spec.md §7. Only the catch-all `Other` variant (errors that
    /// escaped from arbitrary plugin/IO code) is treated as internal.
    pub fn is_semantic_release_error(&self) -> bool {
        !matches!(self, ReleaseError::Other(_))
    }

    /// A short markdown details block, mirroring the `{code, message, details}`
    /// shape described in spec.md §7.
    pub fn details(&self) -> String {
        format!("**{}**\n\n{}", self.code(), self)
    }
}

/// Collects multiple independent failures from one validation phase.
///
/// Used wherever spec.md §7 requires "collect all independent errors
/// into an aggregate before surfacing" (branch validation, the
/// all-must-succeed plugin steps in `PipelineDriver`).
#[derive(Debug, Error)]
#[error("{}", format_aggregate(.0))]
pub struct AggregateError(pub Vec<ReleaseError>);

fn format_aggregate(errors: &[ReleaseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AggregateError {
    pub fn new(errors: Vec<ReleaseError>) -> Self {
        Self(errors)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_result(self) -> Result<(), AggregateError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Splits into (semantic-release-marked, internal) errors, per the
    /// driver's surfacing rule in spec.md §7/§4.5: marked errors go to
    /// `fail`, internal ones are logged only.
    pub fn split_marked(self) -> (Vec<ReleaseError>, Vec<ReleaseError>) {
        self.0
            .into_iter()
            .partition(|e| e.is_semantic_release_error())
    }
}

// Keep anyhow available for conversions even though it's pulled transitively
// through thiserror. sr-core re-exports it so downstream crates don't need a
// direct dependency.
pub use anyhow;
