use crate::commit::Commit;
use crate::error::ReleaseError;

/// A tag as read directly off the repository, before `TagIndex` parses it
/// against the configured `tagFormat` (spec.md §4.1/§4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTag {
    pub name: String,
    pub head: String,
}

/// Which ref namespace `check_ref_format` validates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Heads,
    Tags,
}

/// Thin contract over a git executable (spec.md §4.1).
///
/// `tag_head`, `ref_exists`, `remote_head`, `is_branch_up_to_date` return
/// `None`/`false` on non-fatal absence (the ref simply doesn't exist, no
/// error). `verify_auth`, `tag`, `push`, and `fetch` propagate failures.
pub trait GitFacade: Send + Sync {
    fn is_repo(&self) -> bool;

    /// The branch HEAD currently points at, used by the CLI to identify
    /// the active branch when no CI environment supplies one.
    fn current_branch(&self) -> Result<String, ReleaseError>;

    fn tags(&self) -> Result<Vec<RawTag>, ReleaseError>;

    fn tag_head(&self, name: &str) -> Option<String>;

    fn is_ancestor(&self, commit: &str, branch_tip: &str) -> bool;

    fn ref_exists(&self, git_ref: &str) -> bool;

    /// Unshallow + fetch all tags. Must succeed even when the repo is
    /// already complete.
    fn fetch(&self) -> Result<(), ReleaseError>;

    fn head(&self) -> Result<String, ReleaseError>;

    fn remote_url(&self) -> Result<String, ReleaseError>;

    /// Push dry-run against `branch`.
    fn verify_auth(&self, url: &str, branch: &str) -> Result<(), ReleaseError>;

    /// Create an annotated tag `name` at `git_ref`.
    fn tag(&self, name: &str, git_ref: &str) -> Result<(), ReleaseError>;

    /// Push commits and tags for `branch` to `url`.
    fn push(&self, url: &str, branch: &str) -> Result<(), ReleaseError>;

    fn check_ref_format(&self, kind: RefKind, name: &str) -> bool;

    /// The remote's head commit for `branch`, via `ls-remote`.
    fn remote_head(&self, branch: &str) -> Option<String>;

    /// Whether the remote head of `branch` is an ancestor of the local
    /// branch tip.
    fn is_branch_up_to_date(&self, branch: &str) -> bool;

    /// Commits in `(from, to]`; all commits reachable from `to` if `from`
    /// is `None`. Not part of spec.md §4.1's named surface, but every
    /// concrete GitFacade needs it to gather commits for `analyzeCommits`
    /// and changelog generation.
    fn commits_between(&self, from: Option<&str>, to: &str) -> Result<Vec<Commit>, ReleaseError>;
}
