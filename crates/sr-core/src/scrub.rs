use regex::Regex;

/// Replaces secret values found in the environment with `[secure]` in any
/// text written to standard output/error during a run (spec.md §6.3).
pub struct Scrubber {
    secrets: Vec<String>,
}

static SECRET_KEY_PATTERN: &str = r"(?i)token|password|credential|secret|private";

impl Scrubber {
    /// Scans `env` for keys matching `/token|password|credential|secret|private/i`
    /// whose value trims non-empty, and builds a scrubber over those values.
    pub fn from_env<'a>(env: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let key_pattern = Regex::new(SECRET_KEY_PATTERN).unwrap();
        let mut secrets: Vec<String> = env
            .into_iter()
            .filter(|(k, v)| key_pattern.is_match(k) && !v.trim().is_empty())
            .map(|(_, v)| v.to_string())
            .collect();
        // Scrub longest values first so a short secret that happens to be a
        // substring of a longer one doesn't partially mask it.
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));
        Self { secrets }
    }

    pub fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        for secret in &self.secrets {
            out = out.replace(secret.as_str(), "[secure]");
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

/// Wraps every stdout/stderr write for the duration of a run so secret
/// values never reach the terminal unscrubbed (spec.md §5, §6.3: "installed
/// by the top-level driver for the duration of the run"). The CLI builds
/// one from the process environment before the gate runs and threads it
/// through `GateController`/`PipelineDriver`; nothing downstream of it
/// should call `println!`/`eprintln!` directly.
pub struct ScrubbedOutput<'a> {
    scrubber: &'a Scrubber,
}

impl<'a> ScrubbedOutput<'a> {
    pub fn new(scrubber: &'a Scrubber) -> Self {
        Self { scrubber }
    }

    pub fn out(&self, text: &str) {
        println!("{}", self.scrubber.scrub(text));
    }

    pub fn err(&self, text: &str) {
        eprintln!("{}", self.scrubber.scrub(text));
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubs_matching_env_value() {
        let s = Scrubber::from_env([("GITHUB_TOKEN", "ghp_abc123")]);
        assert_eq!(s.scrub("using token ghp_abc123 now"), "using token [secure] now");
    }

    #[test]
    fn ignores_non_matching_keys() {
        let s = Scrubber::from_env([("PATH", "/usr/bin")]);
        assert_eq!(s.scrub("PATH=/usr/bin"), "PATH=/usr/bin");
    }

    #[test]
    fn ignores_blank_values() {
        let s = Scrubber::from_env([("API_SECRET", "   ")]);
        assert!(s.is_empty());
    }

    #[test]
    fn matches_case_insensitively_on_key() {
        let s = Scrubber::from_env([("My_Password", "hunter2")]);
        assert_eq!(s.scrub("login with hunter2"), "login with [secure]");
    }

    #[test]
    fn scrubs_multiple_distinct_secrets() {
        let s = Scrubber::from_env([("GH_TOKEN", "aaa"), ("NPM_SECRET", "bbb")]);
        let out = s.scrub("aaa and bbb together");
        assert_eq!(out, "[secure] and [secure] together");
    }
}
