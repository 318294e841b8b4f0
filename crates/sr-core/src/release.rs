use semver::Version;
use serde::Serialize;

use crate::branch::{Branch, BranchType};
use crate::error::ReleaseError;
use crate::tag::{Tag, TagFormat};
use crate::version::{
    BumpLevel, ReleaseType, apply_bump, bump_prerelease_segment, diff, make_prerelease,
};

/// The `addChannel`/`publish` plugin's view onto a hosted git provider
/// (spec.md §6.1's plugin surface, the concrete-publication half that
/// §1 calls out of core scope). One implementor per hosting provider;
/// `sr-github` is the one this workspace ships.
pub trait VcsProvider: Send + Sync {
    /// Creates a hosted release for `tag`, returning its URL.
    fn create_release(
        &self,
        tag: &str,
        name: &str,
        body: &str,
        prerelease: bool,
    ) -> Result<String, ReleaseError>;

    /// A browsable diff URL between two tags, used in generated notes.
    fn compare_url(&self, base: &str, head: &str) -> Result<String, ReleaseError>;

    fn release_exists(&self, tag: &str) -> Result<bool, ReleaseError>;

    fn delete_release(&self, tag: &str) -> Result<(), ReleaseError>;

    fn repo_url(&self) -> Option<String> {
        None
    }

    /// Attaches build artifacts to an existing release. Providers that
    /// don't support asset upload can accept and ignore the call.
    fn upload_assets(&self, _tag: &str, _files: &[&str]) -> Result<(), ReleaseError> {
        Ok(())
    }
}

/// A `VcsProvider` that does nothing, for runs with no hosting token
/// configured (`sr-cli` falls back to this rather than refusing to run
/// the rest of the pipeline).
pub struct NoopVcsProvider;

impl VcsProvider for NoopVcsProvider {
    fn create_release(
        &self,
        _tag: &str,
        _name: &str,
        _body: &str,
        _prerelease: bool,
    ) -> Result<String, ReleaseError> {
        Ok(String::new())
    }

    fn compare_url(&self, _base: &str, _head: &str) -> Result<String, ReleaseError> {
        Ok(String::new())
    }

    fn release_exists(&self, _tag: &str) -> Result<bool, ReleaseError> {
        Ok(false)
    }

    fn delete_release(&self, _tag: &str) -> Result<(), ReleaseError> {
        Ok(())
    }
}

/// A concrete release, already tagged (or about to be) on some channel
/// (spec.md §3 `Release`).
#[derive(Debug, Clone, Serialize)]
pub struct Release {
    pub kind: ReleaseType,
    pub version: Version,
    pub channel: Option<String>,
    pub git_head: String,
    pub git_tag: String,
    pub name: String,
    pub notes: Option<String>,
}

/// The highest release already present on a branch, or the empty record
/// (spec.md §3 `LastRelease`).
#[derive(Debug, Clone, Default, Serialize)]
pub struct LastRelease {
    pub version: Option<Version>,
    pub channel: Option<String>,
    pub git_head: Option<String>,
    pub git_tag: Option<String>,
}

impl LastRelease {
    pub fn is_empty(&self) -> bool {
        self.version.is_none()
    }
}

/// A version present on a higher channel that must be re-tagged on the
/// active branch's channel (spec.md §3 `ReleaseToAdd`).
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseToAdd {
    pub last_release: LastRelease,
    pub current_release: Release,
    pub next_release: Release,
}

/// Computes `releasesToAdd` and the candidate next-release for one active
/// branch (spec.md §4.4). Deterministic and git-read-only: callers supply
/// the already-computed bump level (from `analyzeCommits`) and the
/// current HEAD; this type never talks to git itself.
pub struct ReleasePlanner<'a> {
    branches: &'a [Branch],
    active_index: usize,
    tag_format: &'a TagFormat,
}

impl<'a> ReleasePlanner<'a> {
    pub fn new(branches: &'a [Branch], active_index: usize, tag_format: &'a TagFormat) -> Self {
        Self {
            branches,
            active_index,
            tag_format,
        }
    }

    pub fn active_branch(&self) -> &Branch {
        &self.branches[self.active_index]
    }

    /// Versions released on a higher channel, not yet present on the
    /// active branch's own channel, in ascending version order.
    pub fn releases_to_add(&self) -> Vec<ReleaseToAdd> {
        let b = self.active_branch();
        let mut out = Vec::new();

        for higher in &self.branches[self.active_index + 1..] {
            if higher.kind == BranchType::Prerelease {
                continue;
            }

            let mut candidates: Vec<&Tag> = b
                .tags
                .iter()
                .filter(|t| t.channel.as_deref() == higher.channel.as_deref())
                .collect();
            candidates.sort_by(|x, y| x.version.cmp(&y.version));

            for tag in candidates {
                let already_on_own_channel = b
                    .tags
                    .iter()
                    .any(|t| t.version == tag.version && t.channel.as_deref() == b.channel.as_deref());
                if already_on_own_channel {
                    continue;
                }

                let last = b.highest_tag_before(&tag.version);
                let kind = diff(last.map(|t| &t.version), &tag.version);

                let current_release = Release {
                    kind,
                    version: tag.version.clone(),
                    channel: higher.channel.clone(),
                    git_head: tag.git_head.clone(),
                    git_tag: tag.raw_name.clone(),
                    name: tag.version.to_string(),
                    notes: None,
                };

                let next_tag = self.tag_format.render(&tag.version, b.channel.as_deref());
                let next_release = Release {
                    kind,
                    version: tag.version.clone(),
                    channel: b.channel.clone(),
                    git_head: tag.git_head.clone(),
                    git_tag: next_tag,
                    name: tag.version.to_string(),
                    notes: None,
                };

                out.push(ReleaseToAdd {
                    last_release: LastRelease {
                        version: last.map(|t| t.version.clone()),
                        channel: b.channel.clone(),
                        git_head: last.map(|t| t.git_head.clone()),
                        git_tag: last.map(|t| t.raw_name.clone()),
                    },
                    current_release,
                    next_release,
                });
            }
        }

        out.sort_by(|a, b| a.next_release.version.cmp(&b.next_release.version));
        out
    }

    /// Entries whose `nextRelease.version` falls outside the active
    /// branch's `mergeRange`, per spec.md §4.4's maintenance-branch rule.
    /// Those entries are individually invalid; the rest still proceed.
    pub fn invalid_merge_range_entries<'b>(
        &self,
        to_add: &'b [ReleaseToAdd],
    ) -> Vec<(&'b ReleaseToAdd, ReleaseError)> {
        let b = self.active_branch();
        let Some(range) = &b.merge_range else {
            return Vec::new();
        };
        to_add
            .iter()
            .filter(|r| !range.matches(&r.next_release.version))
            .map(|r| {
                let err = ReleaseError::InvalidLtsMerge(
                    r.next_release.version.to_string(),
                    b.name.clone(),
                    range.to_string(),
                );
                (r, err)
            })
            .collect()
    }

    /// The highest-versioned tag on the active branch's own channel
    /// (spec.md §4.4 "Next-release"). `{}` if none.
    pub fn last_release(&self) -> LastRelease {
        let b = self.active_branch();
        match b.highest_own_channel_tag() {
            Some(tag) => LastRelease {
                version: Some(tag.version.clone()),
                channel: b.channel.clone(),
                git_head: Some(tag.git_head.clone()),
                git_tag: Some(tag.raw_name.clone()),
            },
            None => LastRelease::default(),
        }
    }

    /// Computes the candidate next-release from an already-decided bump
    /// level (spec.md §4.4). `None` bump means no release. `head` is the
    /// current commit the tag would point at.
    pub fn next_release(
        &self,
        last: &LastRelease,
        bump: Option<BumpLevel>,
        head: &str,
    ) -> Result<Option<Release>, ReleaseError> {
        let Some(bump) = bump else {
            return Ok(None);
        };
        let b = self.active_branch();

        let next_version = compute_next_version(b, last, bump);

        if !b.range.contains(&next_version) {
            return Err(ReleaseError::InvalidNextVersion(
                next_version.to_string(),
                b.name.clone(),
                b.range.to_string(),
            ));
        }

        let git_tag = self.tag_format.render(&next_version, b.channel.as_deref());
        let kind = diff(last.version.as_ref(), &next_version);

        Ok(Some(Release {
            kind,
            version: next_version.clone(),
            channel: b.channel.clone(),
            git_head: head.to_string(),
            git_tag,
            name: next_version.to_string(),
            notes: None,
        }))
    }
}

fn compute_next_version(branch: &Branch, last: &LastRelease, bump: BumpLevel) -> Version {
    match branch.kind {
        BranchType::Prerelease => {
            let prerelease_id = branch.prerelease.as_deref().unwrap_or_default();
            match &last.version {
                Some(v) => {
                    if let Some(bumped) = bump_prerelease_segment(v, prerelease_id) {
                        bumped
                    } else {
                        let base = apply_bump(v, bump);
                        make_prerelease(&base, prerelease_id, 0)
                    }
                }
                None => make_prerelease(&Version::new(1, 0, 0), prerelease_id, 0),
            }
        }
        _ => match &last.version {
            Some(v) => apply_bump(v, bump),
            None => Version::new(1, 0, 0),
        },
    }
}

/// Today's date as `YYYY-MM-DD`, shelled out to `date` rather than pulled
/// in as a chrono dependency the teacher never carried.
pub fn today_string() -> String {
    std::process::Command::new("date")
        .arg("+%Y-%m-%d")
        .output()
        .ok()
        .and_then(|o| {
            if o.status.success() {
                Some(String::from_utf8_lossy(&o.stdout).trim().to_string())
            } else {
                None
            }
        })
        .unwrap_or_else(|| "unknown".to_string())
}
