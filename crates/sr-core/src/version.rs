use std::fmt;

use semver::{BuildMetadata, Prerelease, Version};

use crate::commit::{CommitClassifier, ConventionalCommit};

/// The kind of version bump `analyzeCommits` can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BumpLevel {
    Patch,
    Minor,
    Major,
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpLevel::Patch => write!(f, "patch"),
            BumpLevel::Minor => write!(f, "minor"),
            BumpLevel::Major => write!(f, "major"),
        }
    }
}

/// The kind of release a computed version represents (spec.md §3 `Release.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseType {
    Major,
    Minor,
    Patch,
    PrereleaseBump,
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseType::Major => write!(f, "major"),
            ReleaseType::Minor => write!(f, "minor"),
            ReleaseType::Patch => write!(f, "patch"),
            ReleaseType::PrereleaseBump => write!(f, "prerelease"),
        }
    }
}

/// Determine the highest bump level from a set of conventional commits.
///
/// Returns `None` if no commits warrant a release.
pub fn determine_bump(
    commits: &[ConventionalCommit],
    classifier: &dyn CommitClassifier,
) -> Option<BumpLevel> {
    commits
        .iter()
        .filter_map(|c| classifier.bump_level(&c.r#type, c.breaking))
        .max()
}

/// Apply a bump level to a version, returning the new version with no
/// prerelease/build metadata attached.
pub fn apply_bump(version: &Version, bump: BumpLevel) -> Version {
    match bump {
        BumpLevel::Major => Version::new(version.major + 1, 0, 0),
        BumpLevel::Minor => Version::new(version.major, version.minor + 1, 0),
        BumpLevel::Patch => Version::new(version.major, version.minor, version.patch + 1),
    }
}

/// Whether a version carries a semver prerelease identifier (`1.0.0-beta.1`).
pub fn is_prerelease(version: &Version) -> bool {
    !version.pre.is_empty()
}

/// The semver-diff between two versions, per spec.md §4.4's `currentRelease.type`
/// rule: `major` when there is no prior version to diff against.
pub fn diff(from: Option<&Version>, to: &Version) -> ReleaseType {
    let Some(from) = from else {
        return ReleaseType::Major;
    };
    if is_prerelease(to) {
        return ReleaseType::PrereleaseBump;
    }
    if to.major != from.major {
        ReleaseType::Major
    } else if to.minor != from.minor {
        ReleaseType::Minor
    } else if to.patch != from.patch {
        ReleaseType::Patch
    } else {
        ReleaseType::PrereleaseBump
    }
}

/// Construct `{major}.{minor}.{patch}-{id}.{n}`, the shape a prerelease branch's
/// first release on a new base version takes (spec.md §4.4).
pub fn make_prerelease(base: &Version, prerelease_id: &str, n: u64) -> Version {
    let mut v = base.clone();
    v.pre = Prerelease::new(&format!("{prerelease_id}.{n}")).unwrap_or(Prerelease::EMPTY);
    v.build = BuildMetadata::EMPTY;
    v
}

/// If `version`'s prerelease identifier matches `prerelease_id`, bump the
/// trailing numeric component (`1.0.0-beta.1` -> `1.0.0-beta.2`). Returns
/// `None` if the version has no prerelease segment, or its identifier differs.
pub fn bump_prerelease_segment(version: &Version, prerelease_id: &str) -> Option<Version> {
    let pre = version.pre.as_str();
    let (id, n) = pre.rsplit_once('.')?;
    if id != prerelease_id {
        return None;
    }
    let n: u64 = n.parse().ok()?;
    Some(make_prerelease(version, prerelease_id, n + 1))
}

/// The half-open range `[lower, upper)` a branch is allowed to publish into.
/// `upper = None` means unbounded ("+∞" in spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub lower: Version,
    pub upper: Option<Version>,
}

impl Range {
    pub fn new(lower: Version, upper: Option<Version>) -> Self {
        Self { lower, upper }
    }

    pub fn unbounded_from(lower: Version) -> Self {
        Self { lower, upper: None }
    }

    /// Containment compares only `{major, minor, patch}` plus ordering against
    /// prerelease components: the bound check must accept a branch's own
    /// prerelease versions even though `semver`'s default ordering treats
    /// prereleases as "less than" their release counterpart.
    pub fn contains(&self, version: &Version) -> bool {
        if core_triplet(version) < core_triplet(&self.lower) {
            return false;
        }
        if core_triplet(version) == core_triplet(&self.lower) && version < &self.lower {
            return false;
        }
        match &self.upper {
            None => true,
            Some(upper) => core_triplet(version) < core_triplet(upper),
        }
    }
}

fn core_triplet(v: &Version) -> (u64, u64, u64) {
    (v.major, v.minor, v.patch)
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.upper {
            Some(upper) => write!(f, ">={} <{upper}", self.lower),
            None => write!(f, ">={}", self.lower),
        }
    }
}
