use std::collections::HashMap;

use crate::branch::Branch;
use crate::ci::CiEnv;
use crate::error::ReleaseError;
use crate::git::GitFacade;
use crate::scrub::ScrubbedOutput;

/// The fixed git identity written into the environment before any plugin
/// runs, when in CI (spec.md §6.5).
pub const GIT_AUTHOR_NAME: &str = "semantic-release-bot";
pub const GIT_AUTHOR_EMAIL: &str = "semantic-release-bot@users.noreply.github.com";

/// Outcome of `GateController::admit`.
#[derive(Debug)]
pub enum GateOutcome {
    /// The run should proceed against `branches[branch_index]`.
    Admitted { branch_index: usize, dry_run: bool },
    /// The run should exit without touching any plugin, with a
    /// human-readable reason already logged by the caller.
    Skip(String),
}

/// The top-level guard deciding whether an invocation runs, previews, or
/// aborts (spec.md §4.6).
pub struct GateController<'a, G: GitFacade> {
    git: &'a G,
}

impl<'a, G: GitFacade> GateController<'a, G> {
    pub fn new(git: &'a G) -> Self {
        Self { git }
    }

    pub fn admit(
        &self,
        branches: &[Branch],
        ci: &CiEnv,
        dry_run: bool,
        no_ci: bool,
        repo_url: &str,
        out: &ScrubbedOutput<'_>,
    ) -> Result<GateOutcome, ReleaseError> {
        let effective_dry_run = if !ci.is_ci && !dry_run && !no_ci {
            out.err("not running in CI and --no-ci not set: forcing --dry-run");
            true
        } else {
            dry_run
        };

        if ci.is_ci && ci.is_pr && !no_ci {
            return Ok(GateOutcome::Skip("pull request runs never release".into()));
        }

        let Some(ci_branch) = ci.branch.as_deref() else {
            return Ok(GateOutcome::Skip(
                "no branch detected from the CI environment".into(),
            ));
        };

        let Some(branch_index) = branches.iter().position(|b| b.name == ci_branch) else {
            let allowed: Vec<&str> = branches.iter().map(|b| b.name.as_str()).collect();
            return Ok(GateOutcome::Skip(format!(
                "branch '{ci_branch}' is not a release branch; configured branches: {}",
                allowed.join(", ")
            )));
        };

        if effective_dry_run {
            return Ok(GateOutcome::Admitted {
                branch_index,
                dry_run: true,
            });
        }

        let branch_name = &branches[branch_index].name;
        if self.git.verify_auth(repo_url, branch_name).is_err() {
            if !self.git.is_branch_up_to_date(branch_name) {
                return Ok(GateOutcome::Skip(
                    "local branch behind remote; refusing to release".into(),
                ));
            }
            return Err(ReleaseError::GitNoPermission(repo_url.to_string()));
        }

        Ok(GateOutcome::Admitted {
            branch_index,
            dry_run: false,
        })
    }
}

/// Sets the fixed git identity plus `GIT_ASKPASS`/`GIT_TERMINAL_PROMPT`
/// before any plugin runs, when in CI. Existing identity values take
/// precedence (spec.md §6.5); the anti-interactive-prompt variables are
/// always forced.
pub fn apply_release_environment(ci: &CiEnv, existing: &HashMap<String, String>) -> HashMap<String, String> {
    let mut env = existing.clone();

    if ci.is_ci {
        env.entry("GIT_AUTHOR_NAME".into())
            .or_insert_with(|| GIT_AUTHOR_NAME.to_string());
        env.entry("GIT_AUTHOR_EMAIL".into())
            .or_insert_with(|| GIT_AUTHOR_EMAIL.to_string());
        env.entry("GIT_COMMITTER_NAME".into())
            .or_insert_with(|| GIT_AUTHOR_NAME.to_string());
        env.entry("GIT_COMMITTER_EMAIL".into())
            .or_insert_with(|| GIT_AUTHOR_EMAIL.to_string());
        env.insert("GIT_ASKPASS".into(), "echo".into());
        env.insert("GIT_TERMINAL_PROMPT".into(), "0".into());
    }

    env
}
