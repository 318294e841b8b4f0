use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{AggregateError, ReleaseError};
use crate::tag::Tag;
use crate::version::Range;

/// `prerelease: <id>` or `prerelease: true` (substitutes the branch name).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PrereleaseSpec {
    Flag(bool),
    Id(String),
}

/// The declarative, user-authored branch entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSpec {
    pub name: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub prerelease: Option<PrereleaseSpec>,
    #[serde(default)]
    pub merge_range: Option<String>,
}

impl BranchSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            channel: None,
            range: None,
            prerelease: None,
            merge_range: None,
        }
    }
}

/// The three branch kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchType {
    Maintenance,
    Release,
    Prerelease,
}

/// A fully classified, normalised branch.
#[derive(Debug, Clone)]
pub struct Branch {
    pub name: String,
    pub kind: BranchType,
    pub channel: Option<String>,
    pub range: Range,
    pub tags: Vec<Tag>,
    pub prerelease: Option<String>,
    pub merge_range: Option<semver::VersionReq>,
    /// The numeric bucket a maintenance branch's name implies, e.g. `1.x`
    /// implies `[1.0.0, 2.0.0)`. Used to check pairwise disjointness and to
    /// intersect the tag-derived range.
    maintenance_bucket: Option<Range>,
}

impl Branch {
    /// The highest tagged version on this branch's own channel, excluding
    /// prerelease versions unless this is itself a prerelease branch.
    pub fn highest_own_channel_tag(&self) -> Option<&Tag> {
        self.tags
            .iter()
            .filter(|t| t.channel.as_deref() == self.channel.as_deref())
            .filter(|t| self.kind == BranchType::Prerelease || t.version.pre.is_empty())
            .max_by(|a, b| a.version.cmp(&b.version))
    }

    pub fn highest_tag_before(&self, version: &Version) -> Option<&Tag> {
        self.tags
            .iter()
            .filter(|t| &t.version < version)
            .max_by(|a, b| a.version.cmp(&b.version))
    }
}

static MAINTENANCE_NAME: &str = r"^(\d+)(?:\.(\d+))?\.x$";
static SAFE_ID: &str = r"^[A-Za-z0-9][A-Za-z0-9._-]*$";

fn maintenance_name_bucket(name: &str) -> Option<Range> {
    let re = Regex::new(MAINTENANCE_NAME).unwrap();
    let caps = re.captures(name)?;
    let major: u64 = caps.get(1)?.as_str().parse().ok()?;
    match caps.get(2) {
        Some(minor) => {
            let minor: u64 = minor.as_str().parse().ok()?;
            let lower = Version::new(major, minor, 0);
            let upper = Version::new(major, minor + 1, 0);
            Some(Range::new(lower, Some(upper)))
        }
        None => {
            let lower = Version::new(major, 0, 0);
            let upper = Version::new(major + 1, 0, 0);
            Some(Range::new(lower, Some(upper)))
        }
    }
}

fn ranges_overlap(a: &Range, b: &Range) -> bool {
    let a_upper = a.upper.clone().unwrap_or(Version::new(u64::MAX, 0, 0));
    let b_upper = b.upper.clone().unwrap_or(Version::new(u64::MAX, 0, 0));
    a.lower < b_upper && b.lower < a_upper
}

/// Partitions and validates the configured branch list into the three
/// normalised kinds. Tags are *not* yet assigned; callers
/// run `TagIndex::build` against the returned branches, then call
/// `BranchClassifier::compute_ranges` to finish range computation.
pub struct BranchClassifier;

impl BranchClassifier {
    pub fn classify(
        specs: &[BranchSpec],
        check_ref_format: impl Fn(&str) -> bool,
    ) -> Result<Vec<Branch>, AggregateError> {
        let mut errors = Vec::new();

        for spec in specs {
            if spec.name.trim().is_empty() {
                errors.push(ReleaseError::InvalidBranch(
                    "branch name must be non-empty".into(),
                ));
            } else if !check_ref_format(&spec.name) {
                errors.push(ReleaseError::InvalidBranchName(spec.name.clone()));
            }
        }

        let mut seen = std::collections::HashSet::new();
        for spec in specs {
            if !seen.insert(spec.name.as_str()) {
                errors.push(ReleaseError::DuplicateBranches(spec.name.clone()));
            }
        }

        if !errors.is_empty() {
            return Err(AggregateError::new(errors));
        }

        let mut maintenance: Vec<(&BranchSpec, Range)> = Vec::new();
        let mut prerelease: Vec<(&BranchSpec, String)> = Vec::new();
        let mut release: Vec<&BranchSpec> = Vec::new();

        for spec in specs {
            if let Some(bucket) = maintenance_name_bucket(&spec.name) {
                if let Some(explicit) = &spec.range {
                    match maintenance_name_bucket(explicit) {
                        Some(explicit_bucket) if explicit_bucket == bucket => {}
                        _ => errors.push(ReleaseError::MaintenanceBranch(
                            spec.name.clone(),
                            format!("range '{explicit}' does not match the branch name"),
                        )),
                    }
                }
                maintenance.push((spec, bucket));
            } else if let Some(pre) = &spec.prerelease {
                let id = match pre {
                    PrereleaseSpec::Id(id) => id.clone(),
                    PrereleaseSpec::Flag(true) => spec.name.clone(),
                    PrereleaseSpec::Flag(false) => {
                        errors.push(ReleaseError::PrereleaseBranch(
                            spec.name.clone(),
                            "prerelease: false is not a prerelease branch".into(),
                        ));
                        release.push(spec);
                        continue;
                    }
                };
                let safe = Regex::new(SAFE_ID).unwrap();
                if id.is_empty() || !safe.is_match(&id) {
                    errors.push(ReleaseError::PrereleaseBranch(
                        spec.name.clone(),
                        format!("prerelease id '{id}' contains unsafe characters"),
                    ));
                }
                prerelease.push((spec, id));
            } else {
                release.push(spec);
            }
        }

        maintenance.sort_by(|a, b| a.1.lower.cmp(&b.1.lower));
        for w in maintenance.windows(2) {
            if ranges_overlap(&w[0].1, &w[1].1) {
                errors.push(ReleaseError::MaintenanceBranches(format!(
                    "'{}' and '{}' overlap",
                    w[0].0.name, w[1].0.name
                )));
            }
        }

        if release.is_empty() {
            errors.push(ReleaseError::ReleaseBranches(
                "at least one release branch is required".into(),
            ));
        }
        if release.len() > 7 {
            errors.push(ReleaseError::ReleaseBranches(
                "at most seven release branches are allowed".into(),
            ));
        }

        let mut pre_ids = std::collections::HashSet::new();
        for (spec, id) in &prerelease {
            if !pre_ids.insert(id.clone()) {
                errors.push(ReleaseError::PrereleaseBranch(
                    spec.name.clone(),
                    format!("prerelease id '{id}' is not unique"),
                ));
            }
        }

        if !errors.is_empty() {
            return Err(AggregateError::new(errors));
        }

        let mut branches = Vec::new();

        for (idx, (spec, bucket)) in maintenance.iter().enumerate() {
            branches.push(Branch {
                name: spec.name.clone(),
                kind: BranchType::Maintenance,
                channel: spec.channel.clone().or_else(|| Some(spec.name.clone())),
                range: bucket.clone(),
                tags: Vec::new(),
                prerelease: None,
                merge_range: spec
                    .merge_range
                    .as_deref()
                    .and_then(|r| semver::VersionReq::parse(r).ok()),
                maintenance_bucket: Some(bucket.clone()),
            });
            let _ = idx;
        }

        for (idx, spec) in release.iter().enumerate() {
            branches.push(Branch {
                name: spec.name.clone(),
                kind: BranchType::Release,
                channel: spec
                    .channel
                    .clone()
                    .or(if idx == 0 { None } else { Some(spec.name.clone()) }),
                range: Range::unbounded_from(Version::new(1, 0, 0)),
                tags: Vec::new(),
                prerelease: None,
                merge_range: None,
                maintenance_bucket: None,
            });
        }

        for (spec, id) in &prerelease {
            branches.push(Branch {
                name: spec.name.clone(),
                kind: BranchType::Prerelease,
                channel: spec.channel.clone().or_else(|| Some(spec.name.clone())),
                range: Range::unbounded_from(Version::new(1, 0, 0)),
                tags: Vec::new(),
                prerelease: Some(id.clone()),
                merge_range: None,
                maintenance_bucket: None,
            });
        }

        Ok(branches)
    }

    /// Computes each branch's final `range` once tags have been assigned
    /// (spec.md §4.3 "Range computation"). `branches` must already be in
    /// the fixed order `classify` produced: maintenance (ascending) →
    /// release (configured order) → prerelease.
    pub fn compute_ranges(branches: &mut [Branch]) {
        let mut floor = Version::new(1, 0, 0);

        for i in 0..branches.len() {
            let highest_here_or_below: Option<Version> = branches[..=i]
                .iter()
                .flat_map(|b| b.tags.iter().map(|t| t.version.clone()))
                .max();

            let lower = highest_here_or_below.unwrap_or_else(|| floor.clone());

            let upper = if i + 1 < branches.len() {
                let next_highest: Option<Version> = branches[..=i + 1]
                    .iter()
                    .flat_map(|b| b.tags.iter().map(|t| t.version.clone()))
                    .max();
                Some(next_highest.unwrap_or_else(|| floor.clone()))
            } else {
                None
            };

            let mut range = Range::new(lower.clone(), upper);
            if let Some(bucket) = branches[i].maintenance_bucket.clone() {
                range = intersect(&range, &bucket);
            }
            branches[i].range = range;
            floor = lower;
        }
    }
}

fn intersect(a: &Range, b: &Range) -> Range {
    let lower = if a.lower > b.lower { a.lower.clone() } else { b.lower.clone() };
    let upper = match (&a.upper, &b.upper) {
        (Some(x), Some(y)) => Some(if x < y { x.clone() } else { y.clone() }),
        (Some(x), None) => Some(x.clone()),
        (None, Some(y)) => Some(y.clone()),
        (None, None) => None,
    };
    Range::new(lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept_all(_: &str) -> bool {
        true
    }

    #[test]
    fn single_release_branch_classifies() {
        let specs = vec![BranchSpec::named("main")];
        let branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].kind, BranchType::Release);
        assert_eq!(branches[0].channel, None);
    }

    #[test]
    fn second_release_branch_defaults_channel_to_name() {
        let specs = vec![BranchSpec::named("main"), BranchSpec::named("next")];
        let branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        assert_eq!(branches[1].channel.as_deref(), Some("next"));
    }

    #[test]
    fn empty_branch_list_is_rejected() {
        let specs: Vec<BranchSpec> = vec![];
        let err = BranchClassifier::classify(&specs, accept_all).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ReleaseError::ReleaseBranches(_))));
    }

    #[test]
    fn too_many_release_branches_rejected() {
        let specs: Vec<BranchSpec> = (0..8).map(|i| BranchSpec::named(format!("b{i}"))).collect();
        let err = BranchClassifier::classify(&specs, accept_all).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ReleaseError::ReleaseBranches(_))));
    }

    #[test]
    fn duplicate_names_rejected() {
        let specs = vec![BranchSpec::named("main"), BranchSpec::named("main")];
        let err = BranchClassifier::classify(&specs, accept_all).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ReleaseError::DuplicateBranches(_))));
    }

    #[test]
    fn invalid_ref_name_rejected() {
        let specs = vec![BranchSpec::named("main")];
        let err = BranchClassifier::classify(&specs, |_| false).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ReleaseError::InvalidBranchName(_))));
    }

    #[test]
    fn maintenance_branch_recognised_by_name() {
        let specs = vec![BranchSpec::named("1.x"), BranchSpec::named("main")];
        let branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        assert_eq!(branches[0].kind, BranchType::Maintenance);
        assert_eq!(branches[0].channel.as_deref(), Some("1.x"));
        assert_eq!(branches[1].kind, BranchType::Release);
    }

    #[test]
    fn maintenance_branches_ordered_ascending() {
        let specs = vec![
            BranchSpec::named("2.x"),
            BranchSpec::named("1.x"),
            BranchSpec::named("main"),
        ];
        let branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        assert_eq!(branches[0].name, "1.x");
        assert_eq!(branches[1].name, "2.x");
        assert_eq!(branches[2].name, "main");
    }

    #[test]
    fn overlapping_maintenance_ranges_rejected() {
        let specs = vec![
            BranchSpec::named("1.x"),
            BranchSpec::named("1.2.x"),
            BranchSpec::named("main"),
        ];
        let err = BranchClassifier::classify(&specs, accept_all).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ReleaseError::MaintenanceBranches(_))));
    }

    #[test]
    fn prerelease_branch_with_explicit_id() {
        let mut spec = BranchSpec::named("beta");
        spec.prerelease = Some(PrereleaseSpec::Id("beta".into()));
        let specs = vec![BranchSpec::named("main"), spec];
        let branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        assert_eq!(branches[1].kind, BranchType::Prerelease);
        assert_eq!(branches[1].prerelease.as_deref(), Some("beta"));
    }

    #[test]
    fn prerelease_true_substitutes_branch_name() {
        let mut spec = BranchSpec::named("beta");
        spec.prerelease = Some(PrereleaseSpec::Flag(true));
        let specs = vec![BranchSpec::named("main"), spec];
        let branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        assert_eq!(branches[1].prerelease.as_deref(), Some("beta"));
    }

    #[test]
    fn duplicate_prerelease_ids_rejected() {
        let mut a = BranchSpec::named("beta");
        a.prerelease = Some(PrereleaseSpec::Id("next".into()));
        let mut b = BranchSpec::named("alpha");
        b.prerelease = Some(PrereleaseSpec::Id("next".into()));
        let specs = vec![BranchSpec::named("main"), a, b];
        let err = BranchClassifier::classify(&specs, accept_all).unwrap_err();
        assert!(err.0.iter().any(|e| matches!(e, ReleaseError::PrereleaseBranch(..))));
    }

    #[test]
    fn compute_ranges_cover_from_one_zero_zero_to_infinity() {
        let specs = vec![BranchSpec::named("1.x"), BranchSpec::named("main")];
        let mut branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        BranchClassifier::compute_ranges(&mut branches);
        assert_eq!(branches[0].range.lower, Version::new(1, 0, 0));
        assert_eq!(branches[1].range.upper, None);
    }

    #[test]
    fn compute_ranges_uses_highest_tag_as_floor() {
        let specs = vec![BranchSpec::named("main"), BranchSpec::named("next")];
        let mut branches = BranchClassifier::classify(&specs, accept_all).unwrap();
        branches[0].tags.push(Tag {
            raw_name: "v1.5.0".into(),
            version: Version::new(1, 5, 0),
            channel: None,
            git_head: "a".into(),
        });
        BranchClassifier::compute_ranges(&mut branches);
        assert_eq!(branches[0].range.lower, Version::new(1, 5, 0));
        assert_eq!(branches[1].range.lower, Version::new(1, 5, 0));
    }
}
