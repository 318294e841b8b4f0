/// CI environment facts consumed by `GateController` (spec.md §6.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiEnv {
    pub is_ci: bool,
    pub branch: Option<String>,
    pub is_pr: bool,
}

impl CiEnv {
    /// Detects CI state from well-known provider environment variables.
    /// Recognises GitHub Actions and GitLab CI explicitly, with a generic
    /// `CI=true` fallback for everything else.
    pub fn detect(env: impl Fn(&str) -> Option<String>) -> Self {
        let is_github = env("GITHUB_ACTIONS").as_deref() == Some("true");
        let is_gitlab = env("GITLAB_CI").as_deref() == Some("true");

        if is_github {
            let branch = env("GITHUB_REF_NAME").or_else(|| {
                env("GITHUB_REF").map(|r| {
                    r.trim_start_matches("refs/heads/")
                        .trim_start_matches("refs/tags/")
                        .to_string()
                })
            });
            let is_pr = env("GITHUB_EVENT_NAME").as_deref() == Some("pull_request");
            return Self {
                is_ci: true,
                branch,
                is_pr,
            };
        }

        if is_gitlab {
            let branch = env("CI_COMMIT_REF_NAME");
            let is_pr = env("CI_MERGE_REQUEST_IID").is_some();
            return Self {
                is_ci: true,
                branch,
                is_pr,
            };
        }

        let is_ci = env("CI").as_deref() == Some("true");
        Self {
            is_ci,
            branch: None,
            is_pr: false,
        }
    }
}
