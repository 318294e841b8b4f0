use std::path::{Path, PathBuf};
use std::process::Command;

use sr_core::commit::Commit;
use sr_core::error::ReleaseError;
use sr_core::git::{GitFacade, RawTag, RefKind};

/// Git repository implementation backed by native `git` CLI commands.
pub struct NativeGitRepository {
    path: PathBuf,
}

impl NativeGitRepository {
    pub fn open(path: &Path) -> Result<Self, ReleaseError> {
        let repo = Self {
            path: path.to_path_buf(),
        };
        repo.git(&["rev-parse", "--git-dir"])?;
        Ok(repo)
    }

    fn git(&self, args: &[&str]) -> Result<String, ReleaseError> {
        let output = self
            .command(args)
            .output()
            .map_err(|e| ReleaseError::Git(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReleaseError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Runs `git` and reports only whether it exited 0, for commands where a
    /// non-zero exit is an expected answer rather than a failure (`rev-parse
    /// --verify`, `merge-base --is-ancestor`, `check-ref-format`).
    fn git_ok(&self, args: &[&str]) -> bool {
        self.command(args)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        // Prevent git from ever blocking on interactive credential prompts.
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.arg("-C").arg(&self.path);
        cmd.args(args);
        cmd
    }
}

/// Parse the output of `git log --format=%H%n%B%n--END--` into commits.
fn parse_commit_log(output: &str) -> Vec<Commit> {
    if output.is_empty() {
        return Vec::new();
    }

    let mut commits = Vec::new();
    let mut current_sha: Option<String> = None;
    let mut current_message = String::new();

    for line in output.lines() {
        if line == "--END--" {
            if let Some(sha) = current_sha.take() {
                commits.push(Commit {
                    sha,
                    message: current_message.trim().to_string(),
                });
                current_message.clear();
            }
        } else if current_sha.is_none()
            && line.len() == 40
            && line.chars().all(|c| c.is_ascii_hexdigit())
        {
            current_sha = Some(line.to_string());
        } else {
            if !current_message.is_empty() {
                current_message.push('\n');
            }
            current_message.push_str(line);
        }
    }

    if let Some(sha) = current_sha {
        commits.push(Commit {
            sha,
            message: current_message.trim().to_string(),
        });
    }

    commits
}

/// Parse `git for-each-ref --format=%(refname:short)%09%(objectname)
/// refs/tags` output into `RawTag`s, dereferencing annotated tags to the
/// commit they point at.
fn parse_raw_tags(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(name, head)| (name.to_string(), head.to_string()))
        .collect()
}

impl GitFacade for NativeGitRepository {
    fn is_repo(&self) -> bool {
        self.git_ok(&["rev-parse", "--git-dir"])
    }

    fn current_branch(&self) -> Result<String, ReleaseError> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    fn tags(&self) -> Result<Vec<RawTag>, ReleaseError> {
        let output = self.git(&[
            "for-each-ref",
            "--format=%(refname:short)\t%(objectname)",
            "refs/tags",
        ])?;

        parse_raw_tags(&output)
            .into_iter()
            .map(|(name, _head)| {
                let head = self.git(&[
                    "rev-parse",
                    &format!("refs/tags/{name}^{{commit}}"),
                ])?;
                Ok(RawTag { name, head })
            })
            .collect()
    }

    fn tag_head(&self, name: &str) -> Option<String> {
        self.git(&["rev-parse", &format!("refs/tags/{name}^{{commit}}")])
            .ok()
    }

    fn is_ancestor(&self, commit: &str, branch_tip: &str) -> bool {
        self.git_ok(&["merge-base", "--is-ancestor", commit, branch_tip])
    }

    fn ref_exists(&self, git_ref: &str) -> bool {
        self.git_ok(&["rev-parse", "--verify", "--quiet", git_ref])
    }

    fn fetch(&self) -> Result<(), ReleaseError> {
        let shallow = self
            .git(&["rev-parse", "--is-shallow-repository"])
            .unwrap_or_else(|_| "false".into());
        if shallow == "true" {
            let _ = self.git(&["fetch", "--unshallow", "origin"]);
        }
        self.git(&["fetch", "--tags", "--force", "origin"])?;
        Ok(())
    }

    fn head(&self) -> Result<String, ReleaseError> {
        self.git(&["rev-parse", "HEAD"])
    }

    fn remote_url(&self) -> Result<String, ReleaseError> {
        self.git(&["remote", "get-url", "origin"])
    }

    fn verify_auth(&self, url: &str, branch: &str) -> Result<(), ReleaseError> {
        self.git(&[
            "push",
            "--dry-run",
            url,
            &format!("HEAD:refs/heads/{branch}"),
        ])
        .map(|_| ())
        .map_err(|_| ReleaseError::GitNoPermission(url.to_string()))
    }

    fn tag(&self, name: &str, git_ref: &str) -> Result<(), ReleaseError> {
        self.git(&["tag", "-a", name, "-m", name, git_ref])?;
        Ok(())
    }

    fn push(&self, url: &str, branch: &str) -> Result<(), ReleaseError> {
        self.git(&[
            "push",
            url,
            &format!("HEAD:refs/heads/{branch}"),
            "--tags",
        ])?;
        Ok(())
    }

    fn check_ref_format(&self, kind: RefKind, name: &str) -> bool {
        match kind {
            RefKind::Heads => self.git_ok(&["check-ref-format", "--branch", name]),
            RefKind::Tags => self.git_ok(&["check-ref-format", &format!("refs/tags/{name}")]),
        }
    }

    fn remote_head(&self, branch: &str) -> Option<String> {
        let output = self
            .git(&["ls-remote", "origin", &format!("refs/heads/{branch}")])
            .ok()?;
        output.split_whitespace().next().map(str::to_string)
    }

    fn is_branch_up_to_date(&self, branch: &str) -> bool {
        let Some(remote_head) = self.remote_head(branch) else {
            return true;
        };
        let Ok(local_tip) = self.git(&["rev-parse", &format!("refs/heads/{branch}")]) else {
            return false;
        };
        self.is_ancestor(&remote_head, &local_tip)
    }

    fn commits_between(&self, from: Option<&str>, to: &str) -> Result<Vec<Commit>, ReleaseError> {
        let range = match from {
            Some(sha) => format!("{sha}..{to}"),
            None => to.to_string(),
        };

        let output = self.git(&["log", "--format=%H%n%B%n--END--", &range])?;
        Ok(parse_commit_log(&output))
    }
}
