use std::collections::HashMap;

use crate::branch::Branch;
use crate::commit::CommitParser;
use crate::config::ReleaseConfig;
use crate::error::{AggregateError, ReleaseError};
use crate::git::GitFacade;
use crate::plugin::{Plugin, PluginContext};
use crate::release::{Release, ReleasePlanner};
use crate::scrub::ScrubbedOutput;
use crate::tag::TagFormat;

/// The result of one `PipelineDriver::run` invocation (spec.md §4.5 steps
/// 1-10; "return falsy"/"return truthy" map to the `NoRelease`/`DryRun`/
/// `Released` variants below).
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Back-ports (if any) ran, but there was no new commit-driven release.
    NoRelease,
    /// Computed and verified, but stopped short of tagging (step 5).
    DryRun { next_release: Release },
    /// Tagged, pushed, and published (and any back-ports along the way).
    Released { releases: Vec<Release> },
}

/// Runs the fixed, ordered plugin pipeline for one active branch (spec.md
/// §4.5). The step table itself (order / aggregation mode / error policy)
/// is encoded directly in `run`'s control flow per step, per spec.md §9's
/// "plugin steps as data" note — aggregation mode varies too much between
/// steps (all-must-succeed vs first-wins vs concatenate vs best-effort) to
/// gain anything from a further layer of indirection over nine steps.
pub struct PipelineDriver<'a, G: GitFacade> {
    git: &'a G,
    plugins: &'a [Box<dyn Plugin>],
    tag_format: &'a TagFormat,
    commit_parser: &'a dyn CommitParser,
    repo_url: &'a str,
    out: &'a ScrubbedOutput<'a>,
}

impl<'a, G: GitFacade> PipelineDriver<'a, G> {
    pub fn new(
        git: &'a G,
        plugins: &'a [Box<dyn Plugin>],
        tag_format: &'a TagFormat,
        commit_parser: &'a dyn CommitParser,
        repo_url: &'a str,
        out: &'a ScrubbedOutput<'a>,
    ) -> Self {
        Self {
            git,
            plugins,
            tag_format,
            commit_parser,
            repo_url,
            out,
        }
    }

    pub fn run(
        &self,
        config: ReleaseConfig,
        branches: Vec<Branch>,
        active_index: usize,
        dry_run: bool,
        env: HashMap<String, String>,
    ) -> Result<PipelineOutcome, AggregateError> {
        let planner = ReleasePlanner::new(&branches, active_index, self.tag_format);
        let to_add = planner.releases_to_add();
        let invalid_entries = planner.invalid_merge_range_entries(&to_add);
        let invalid_versions: std::collections::HashSet<_> = invalid_entries
            .iter()
            .map(|(r, _)| r.next_release.version.clone())
            .collect();
        // Each out-of-mergeRange entry fails individually with
        // EINVALIDLTSMERGE (spec.md §4.4); the rest of releasesToAdd still
        // proceeds below, but these errors must still surface in the
        // returned aggregate rather than being dropped.
        let merge_range_errors: Vec<ReleaseError> =
            invalid_entries.into_iter().map(|(_, e)| e).collect();

        let active_branch = branches[active_index].clone();
        let mut ctx = PluginContext::new(config, active_branch, branches.clone(), dry_run);
        ctx.env = env;

        // Step 1: verifyConditions — all-must-succeed, collect every error.
        let mut errors = Vec::new();
        for p in self.plugins {
            if let Err(e) = p.verify_conditions(&ctx) {
                errors.push(e);
            }
        }
        if !errors.is_empty() {
            return self.abort(&mut ctx, errors);
        }

        let mut releases: Vec<Release> = Vec::new();

        // Step 2: releases-to-add, ascending.
        for entry in &to_add {
            if invalid_versions.contains(&entry.next_release.version) {
                continue;
            }

            let commits = self
                .git
                .commits_between(entry.last_release.git_head.as_deref(), &entry.next_release.git_head)
                .map_err(|e| AggregateError::new(vec![e]))?;
            ctx.commits = commits
                .iter()
                .filter_map(|c| self.commit_parser.parse(c).ok())
                .collect();
            ctx.current_release = Some(entry.current_release.clone());
            ctx.next_release = Some(entry.next_release.clone());

            let notes = self.generate_notes(&ctx);
            if let Some(r) = &mut ctx.next_release {
                r.notes = notes;
            }

            if let Err(e) = self.git.tag(&entry.next_release.git_tag, &entry.next_release.git_head) {
                return self.abort(&mut ctx, vec![e]);
            }
            if let Err(e) = self.git.push(self.repo_url, &ctx.branch.name) {
                return self.abort(&mut ctx, vec![e]);
            }

            for p in self.plugins {
                match p.add_channel(&ctx) {
                    Ok(Some(r)) => releases.push(r),
                    Ok(None) => {}
                    Err(e) => return self.abort(&mut ctx, vec![e]),
                }
            }

            ctx.releases = releases.clone();
            self.run_success(&mut ctx);
        }

        let remaining = self.run_remaining(&mut ctx, &planner, releases, dry_run);
        self.surface_merge_range_errors(&mut ctx, remaining, merge_range_errors)
    }

    /// Steps 3-10 of spec.md §4.5: compute and publish the next release.
    /// Split out from `run` so the EINVALIDLTSMERGE errors collected before
    /// step 2 can be folded into whatever this returns, instead of being
    /// silently dropped.
    fn run_remaining(
        &self,
        ctx: &mut PluginContext,
        planner: &ReleasePlanner<'_>,
        mut releases: Vec<Release>,
        dry_run: bool,
    ) -> Result<PipelineOutcome, AggregateError> {
        // Step 3: compute next-release.
        let head = self.git.head().map_err(|e| AggregateError::new(vec![e]))?;
        let last = planner.last_release();
        let commits_raw = self
            .git
            .commits_between(last.git_head.as_deref(), &head)
            .map_err(|e| AggregateError::new(vec![e]))?;
        ctx.commits = commits_raw
            .iter()
            .filter_map(|c| self.commit_parser.parse(c).ok())
            .collect();
        ctx.last_release = Some(last.clone());

        let bump = match self.analyze_commits(ctx) {
            Ok(b) => b,
            Err(e) => return self.abort(ctx, vec![e]),
        };

        let next_release = match planner.next_release(&last, bump, &head) {
            Ok(Some(r)) => r,
            Ok(None) => return Ok(PipelineOutcome::NoRelease),
            Err(e) => return self.abort(ctx, vec![e]),
        };
        ctx.next_release = Some(next_release.clone());

        // Step 4: verifyRelease — all-must-succeed.
        let mut errors = Vec::new();
        for p in self.plugins {
            if let Err(e) = p.verify_release(ctx) {
                errors.push(e);
            }
        }
        if !errors.is_empty() {
            return self.abort(ctx, errors);
        }

        // Step 5: dry-run short-circuit.
        if dry_run {
            let notes = self.generate_notes(ctx);
            if let Some(r) = &mut ctx.next_release {
                r.notes = notes.clone();
            }
            if let Some(n) = &notes {
                self.out.out(n);
            }
            let next_release = ctx.next_release.clone().expect("set above");
            return Ok(PipelineOutcome::DryRun { next_release });
        }

        // Step 6: generateNotes.
        let notes = self.generate_notes(ctx);
        if let Some(r) = &mut ctx.next_release {
            r.notes = notes;
        }

        // Step 7: prepare — sequential, refresh HEAD + notes after each.
        for p in self.plugins {
            if let Err(e) = p.prepare(ctx) {
                return self.abort(ctx, vec![e]);
            }
            let head = match self.git.head() {
                Ok(h) => h,
                Err(e) => return self.abort(ctx, vec![e]),
            };
            if let Some(r) = &mut ctx.next_release {
                r.git_head = head;
            }
            let notes = self.generate_notes(ctx);
            if let Some(r) = &mut ctx.next_release {
                r.notes = notes;
            }
        }

        let next_release = ctx.next_release.clone().expect("set at step 3");

        // Step 8: tag + push.
        if let Err(e) = self.git.tag(&next_release.git_tag, &next_release.git_head) {
            return self.abort(ctx, vec![e]);
        }
        if let Err(e) = self.git.push(self.repo_url, &ctx.branch.name) {
            return self.abort(ctx, vec![e]);
        }

        // Step 9: publish.
        for p in self.plugins {
            match p.publish(ctx) {
                Ok(Some(r)) => releases.push(r),
                Ok(None) => {}
                Err(e) => return self.abort(ctx, vec![e]),
            }
        }
        ctx.releases = releases.clone();

        // Step 10: success.
        self.run_success(ctx);

        Ok(PipelineOutcome::Released { releases })
    }

    /// Folds EINVALIDLTSMERGE errors collected before the back-port loop
    /// into the outcome of the rest of the run (spec.md §4.4: each invalid
    /// entry fails individually but must still be reported). If the rest
    /// of the run already aborted, `fail` already ran for that aggregate;
    /// the merge-range errors are appended to the returned aggregate for
    /// visibility without invoking `fail` a second time. If the rest of
    /// the run would otherwise succeed, this is the run's only failure and
    /// goes through the normal abort path (splitting marked/internal,
    /// calling `fail` unless dry-run).
    fn surface_merge_range_errors(
        &self,
        ctx: &mut PluginContext,
        remaining: Result<PipelineOutcome, AggregateError>,
        merge_range_errors: Vec<ReleaseError>,
    ) -> Result<PipelineOutcome, AggregateError> {
        if merge_range_errors.is_empty() {
            return remaining;
        }
        match remaining {
            Ok(_) => self.abort(ctx, merge_range_errors),
            Err(existing) => {
                let mut combined = existing.0;
                combined.extend(merge_range_errors);
                Err(AggregateError::new(combined))
            }
        }
    }

    /// `generateNotes`: concatenate every plugin's non-`None` output with a
    /// blank-line separator.
    fn generate_notes(&self, ctx: &PluginContext) -> Option<String> {
        let parts: Vec<String> = self
            .plugins
            .iter()
            .filter_map(|p| p.generate_notes(ctx).ok().flatten())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// `analyzeCommits`: first non-null result wins.
    fn analyze_commits(&self, ctx: &PluginContext) -> Result<Option<crate::version::BumpLevel>, ReleaseError> {
        for p in self.plugins {
            if let Some(bump) = p.analyze_commits(ctx)? {
                return Ok(Some(bump));
            }
        }
        Ok(None)
    }

    /// `success`: every plugin runs even if an earlier one errors; errors
    /// are logged, never propagated.
    fn run_success(&self, ctx: &mut PluginContext) {
        for p in self.plugins {
            if let Err(e) = p.success(ctx) {
                self.out.err(&format!("success hook '{}' failed: {e}", p.name()));
                ctx.errors.push(e);
            }
        }
    }

    /// Surfaces an error path (spec.md §7/§4.5): splits semanticRelease-marked
    /// errors from internal ones, calls `fail` with the marked subset unless
    /// this is a dry run, and returns the full aggregate so the caller knows
    /// the run failed.
    fn abort(&self, ctx: &mut PluginContext, errors: Vec<ReleaseError>) -> Result<PipelineOutcome, AggregateError> {
        let dry_run = ctx.dry_run;
        let (marked, internal) = AggregateError::new(errors).split_marked();
        for e in &internal {
            self.out.err(&format!("internal error: {e}"));
        }

        if !marked.is_empty() && !dry_run {
            ctx.errors = marked
                .iter()
                .map(|e| ReleaseError::Plugin {
                    step: "fail".into(),
                    message: e.to_string(),
                })
                .collect();
            for p in self.plugins {
                if let Err(e) = p.fail(ctx) {
                    self.out.err(&format!("fail hook '{}' failed: {e}", p.name()));
                }
            }
        }

        let mut combined = marked;
        combined.extend(internal);
        Err(AggregateError::new(combined))
    }
}
