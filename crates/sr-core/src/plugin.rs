use std::collections::HashMap;

use crate::branch::{Branch, BranchType};
use crate::commit::{CommitClassifier, ConventionalCommit, is_skip_release_commit};
use crate::config::ReleaseConfig;
use crate::error::ReleaseError;
use crate::hooks::{HookCommand, HookContext, HookRunner, ShellHookRunner};
use crate::release::{LastRelease, Release, VcsProvider};
use crate::version::{BumpLevel, determine_bump};

/// The state threaded through one plugin pipeline step (spec.md §6.1):
/// `{options, branch, branches, logger}` plus the per-step subset of
/// `{lastRelease, currentRelease, nextRelease, commits, releases, errors}`.
#[derive(Debug)]
pub struct PluginContext {
    pub config: ReleaseConfig,
    pub branch: Branch,
    pub branches: Vec<Branch>,
    pub dry_run: bool,
    pub env: HashMap<String, String>,
    pub last_release: Option<LastRelease>,
    pub current_release: Option<Release>,
    pub next_release: Option<Release>,
    pub commits: Vec<ConventionalCommit>,
    pub releases: Vec<Release>,
    pub errors: Vec<ReleaseError>,
}

impl PluginContext {
    pub fn new(config: ReleaseConfig, branch: Branch, branches: Vec<Branch>, dry_run: bool) -> Self {
        Self {
            config,
            branch,
            branches,
            dry_run,
            env: HashMap::new(),
            last_release: None,
            current_release: None,
            next_release: None,
            commits: Vec::new(),
            releases: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// The plugin contract (spec.md §6.1): one trait covering every named
/// step. Default implementations are no-ops, so a plugin only overrides
/// the steps it participates in — mirroring how a config entry in the
/// original tool only needs to export the hooks it cares about.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn verify_conditions(&self, _ctx: &PluginContext) -> Result<(), ReleaseError> {
        Ok(())
    }

    fn analyze_commits(&self, _ctx: &PluginContext) -> Result<Option<BumpLevel>, ReleaseError> {
        Ok(None)
    }

    fn verify_release(&self, _ctx: &PluginContext) -> Result<(), ReleaseError> {
        Ok(())
    }

    fn generate_notes(&self, _ctx: &PluginContext) -> Result<Option<String>, ReleaseError> {
        Ok(None)
    }

    /// May mutate the working copy (e.g. bump a manifest version, write a
    /// changelog file, create a commit).
    fn prepare(&self, _ctx: &PluginContext) -> Result<(), ReleaseError> {
        Ok(())
    }

    fn add_channel(&self, _ctx: &PluginContext) -> Result<Option<Release>, ReleaseError> {
        Ok(None)
    }

    fn publish(&self, _ctx: &PluginContext) -> Result<Option<Release>, ReleaseError> {
        Ok(None)
    }

    /// Called even if an earlier `success` plugin errored; errors are
    /// logged, never propagated (spec.md §4.5).
    fn success(&self, _ctx: &PluginContext) -> Result<(), ReleaseError> {
        Ok(())
    }

    fn fail(&self, _ctx: &PluginContext) -> Result<(), ReleaseError> {
        Ok(())
    }
}

/// Adapts a fixed shell-command list to the plugin contract, generalising
/// the teacher's `ShellHookRunner` from a hardcoded trunk-release hook
/// list to named pipeline steps any config can populate.
pub struct ShellPlugin {
    runner: ShellHookRunner,
}

impl ShellPlugin {
    pub fn new() -> Self {
        Self {
            runner: ShellHookRunner,
        }
    }

    fn run(&self, commands: &[String], ctx: &PluginContext) -> Result<(), ReleaseError> {
        let hooks: Vec<HookCommand> = commands
            .iter()
            .map(|c| HookCommand { command: c.clone() })
            .collect();
        let mut hook_ctx = HookContext::default();
        hook_ctx.env = ctx.env.clone();
        self.runner.run(&hooks, &hook_ctx)
    }
}

impl Default for ShellPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl Plugin for ShellPlugin {
    fn name(&self) -> &str {
        "shell"
    }

    fn prepare(&self, ctx: &PluginContext) -> Result<(), ReleaseError> {
        self.run(&ctx.config.hooks.pre_release, ctx)
    }

    fn add_channel(&self, ctx: &PluginContext) -> Result<Option<Release>, ReleaseError> {
        self.run(&ctx.config.hooks.post_tag, ctx)?;
        Ok(None)
    }

    fn success(&self, ctx: &PluginContext) -> Result<(), ReleaseError> {
        self.run(&ctx.config.hooks.post_release, ctx)
    }

    fn fail(&self, ctx: &PluginContext) -> Result<(), ReleaseError> {
        self.run(&ctx.config.hooks.on_failure, ctx)
    }
}

/// The zero-config `analyzeCommits` plugin: classifies commits with a
/// `CommitClassifier` and drops `[skip release]`-marked commits first
/// (spec.md §9 "skip-release pattern location" — this filter is plugin
/// policy, not core policy).
pub struct DefaultAnalyzeCommitsPlugin {
    classifier: Box<dyn CommitClassifier>,
}

impl DefaultAnalyzeCommitsPlugin {
    pub fn new(classifier: Box<dyn CommitClassifier>) -> Self {
        Self { classifier }
    }
}

impl Plugin for DefaultAnalyzeCommitsPlugin {
    fn name(&self) -> &str {
        "analyze-commits"
    }

    fn analyze_commits(&self, ctx: &PluginContext) -> Result<Option<BumpLevel>, ReleaseError> {
        let releasable: Vec<ConventionalCommit> = ctx
            .commits
            .iter()
            .filter(|c| {
                let full = format!("{}\n\n{}", c.description, c.body.as_deref().unwrap_or(""));
                !is_skip_release_commit(&full)
            })
            .cloned()
            .collect();
        Ok(determine_bump(&releasable, self.classifier.as_ref()))
    }
}

/// `addChannel`/`publish` against a hosted git provider (spec.md §6.1).
/// Creates the release if it doesn't already exist, then uploads any
/// configured build artifacts. Used for both steps: a back-ported
/// release and a fresh next-release are both "make this version visible
/// on the provider", differing only in which `ctx.next_release` is set.
pub struct VcsPublishPlugin<V: VcsProvider> {
    vcs: V,
}

impl<V: VcsProvider> VcsPublishPlugin<V> {
    pub fn new(vcs: V) -> Self {
        Self { vcs }
    }

    fn publish_current(&self, ctx: &PluginContext) -> Result<Option<Release>, ReleaseError> {
        let Some(next) = &ctx.next_release else {
            return Ok(None);
        };

        if self.vcs.release_exists(&next.git_tag)? {
            return Ok(Some(next.clone()));
        }

        let prerelease = ctx.branch.kind == BranchType::Prerelease;
        let notes = next.notes.clone().unwrap_or_default();
        self.vcs
            .create_release(&next.git_tag, &next.name, &notes, prerelease)?;

        let artifacts = resolve_artifact_globs(&ctx.config.artifacts);
        if !artifacts.is_empty() {
            let refs: Vec<&str> = artifacts.iter().map(String::as_str).collect();
            self.vcs.upload_assets(&next.git_tag, &refs)?;
        }

        Ok(Some(next.clone()))
    }
}

impl<V: VcsProvider> Plugin for VcsPublishPlugin<V> {
    fn name(&self) -> &str {
        "vcs-publish"
    }

    fn add_channel(&self, ctx: &PluginContext) -> Result<Option<Release>, ReleaseError> {
        self.publish_current(ctx)
    }

    fn publish(&self, ctx: &PluginContext) -> Result<Option<Release>, ReleaseError> {
        self.publish_current(ctx)
    }
}

/// Expands `artifacts` glob patterns (spec.md §9 ambient publish step)
/// against the working directory, silently skipping patterns that match
/// nothing or fail to parse: a stale glob shouldn't fail a release.
fn resolve_artifact_globs(patterns: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for pattern in patterns {
        let Ok(paths) = glob::glob(pattern) else {
            continue;
        };
        for entry in paths.flatten() {
            if let Some(s) = entry.to_str() {
                out.push(s.to_string());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchClassifier;

    fn ctx_with_hooks(pre: Vec<String>) -> PluginContext {
        let mut config = ReleaseConfig::default();
        config.hooks.pre_release = pre;
        let branches = BranchClassifier::classify(&config.branches, |_| true).unwrap();
        let branch = branches[0].clone();
        PluginContext::new(config, branch, branches, false)
    }

    #[test]
    fn shell_plugin_runs_pre_release_on_prepare() {
        let ctx = ctx_with_hooks(vec!["true".into()]);
        ShellPlugin::new().prepare(&ctx).unwrap();
    }

    #[test]
    fn shell_plugin_propagates_failure() {
        let ctx = ctx_with_hooks(vec!["false".into()]);
        assert!(ShellPlugin::new().prepare(&ctx).is_err());
    }

    #[test]
    fn default_plugin_methods_are_noops() {
        struct Noop;
        impl Plugin for Noop {
            fn name(&self) -> &str {
                "noop"
            }
        }
        let ctx = ctx_with_hooks(vec![]);
        let p = Noop;
        assert!(p.verify_conditions(&ctx).is_ok());
        assert_eq!(p.analyze_commits(&ctx).unwrap(), None);
        assert_eq!(p.generate_notes(&ctx).unwrap(), None);
    }

    #[test]
    fn default_analyze_commits_picks_highest_bump() {
        use crate::commit::DefaultCommitClassifier;

        let classifier = DefaultCommitClassifier::default();
        let plugin = DefaultAnalyzeCommitsPlugin::new(Box::new(classifier));
        let mut ctx = ctx_with_hooks(vec![]);
        ctx.commits = vec![
            ConventionalCommit {
                sha: "a".into(),
                r#type: "fix".into(),
                scope: None,
                description: "x".into(),
                body: None,
                breaking: false,
            },
            ConventionalCommit {
                sha: "b".into(),
                r#type: "feat".into(),
                scope: None,
                description: "y".into(),
                body: None,
                breaking: false,
            },
        ];
        assert_eq!(
            plugin.analyze_commits(&ctx).unwrap(),
            Some(crate::version::BumpLevel::Minor)
        );
    }

    #[test]
    fn default_analyze_commits_ignores_skip_release_marker() {
        use crate::commit::DefaultCommitClassifier;

        let classifier = DefaultCommitClassifier::default();
        let plugin = DefaultAnalyzeCommitsPlugin::new(Box::new(classifier));
        let mut ctx = ctx_with_hooks(vec![]);
        ctx.commits = vec![ConventionalCommit {
            sha: "a".into(),
            r#type: "feat".into(),
            scope: None,
            description: "y".into(),
            body: Some("[skip release]".into()),
            breaking: false,
        }];
        assert_eq!(plugin.analyze_commits(&ctx).unwrap(), None);
    }

    struct FakeVcs {
        exists: bool,
        created: std::sync::Mutex<Vec<String>>,
    }

    impl VcsProvider for FakeVcs {
        fn create_release(
            &self,
            tag: &str,
            _name: &str,
            _body: &str,
            _prerelease: bool,
        ) -> Result<String, ReleaseError> {
            self.created.lock().unwrap().push(tag.to_string());
            Ok(format!("https://example.test/releases/{tag}"))
        }
        fn compare_url(&self, _base: &str, _head: &str) -> Result<String, ReleaseError> {
            Ok(String::new())
        }
        fn release_exists(&self, _tag: &str) -> Result<bool, ReleaseError> {
            Ok(self.exists)
        }
        fn delete_release(&self, _tag: &str) -> Result<(), ReleaseError> {
            Ok(())
        }
    }

    fn ctx_with_next_release(version: &str) -> PluginContext {
        let mut ctx = ctx_with_hooks(vec![]);
        ctx.next_release = Some(Release {
            kind: crate::version::ReleaseType::Minor,
            version: semver::Version::parse(version).unwrap(),
            channel: None,
            git_head: "deadbeef".into(),
            git_tag: format!("v{version}"),
            name: version.into(),
            notes: Some("release notes".into()),
        });
        ctx
    }

    #[test]
    fn vcs_publish_creates_release_when_absent() {
        let vcs = FakeVcs {
            exists: false,
            created: std::sync::Mutex::new(Vec::new()),
        };
        let plugin = VcsPublishPlugin::new(vcs);
        let ctx = ctx_with_next_release("1.0.0");

        let result = plugin.publish(&ctx).unwrap();
        assert!(result.is_some());
        assert_eq!(plugin.vcs.created.lock().unwrap().as_slice(), ["v1.0.0"]);
    }

    #[test]
    fn vcs_publish_skips_existing_release() {
        let vcs = FakeVcs {
            exists: true,
            created: std::sync::Mutex::new(Vec::new()),
        };
        let plugin = VcsPublishPlugin::new(vcs);
        let ctx = ctx_with_next_release("1.0.0");

        plugin.add_channel(&ctx).unwrap();
        assert!(plugin.vcs.created.lock().unwrap().is_empty());
    }

    #[test]
    fn vcs_publish_noop_without_next_release() {
        let vcs = FakeVcs {
            exists: false,
            created: std::sync::Mutex::new(Vec::new()),
        };
        let plugin = VcsPublishPlugin::new(vcs);
        let ctx = ctx_with_hooks(vec![]);
        assert!(plugin.publish(&ctx).unwrap().is_none());
    }
}
