use semver::Version;

use crate::branch::Branch;
use crate::error::ReleaseError;

/// A tag parsed against the configured `tagFormat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub raw_name: String,
    pub version: Version,
    /// `None` means the default (unlabelled) channel.
    pub channel: Option<String>,
    pub git_head: String,
}

/// Renders and parses tag names against a `${version}` template, per
/// spec.md §4.2.
#[derive(Debug, Clone)]
pub struct TagFormat {
    template: String,
    prefix: String,
    suffix: String,
}

impl TagFormat {
    /// Validate and compile a `tagFormat` template.
    ///
    /// Step 1 (spec.md §4.2#1): render with a single-space sentinel for
    /// `${version}`; the result must contain exactly one space, which
    /// splits it into `prefix`/`suffix`.
    ///
    /// Step 2 (spec.md §4.2#2): render with the sentinel `0.0.0` and check
    /// the result is syntactically a valid git tag name.
    pub fn compile(template: &str) -> Result<Self, ReleaseError> {
        let sentinel_render = render_template(template, " ")?;
        let space_count = sentinel_render.matches(' ').count();
        if space_count != 1 {
            return Err(ReleaseError::TagNoVersion(template.to_string()));
        }
        let (prefix, suffix) = sentinel_render
            .split_once(' ')
            .expect("exactly one space checked above");

        let probe = render_template(template, "0.0.0")?;
        if !is_valid_git_tag_name(&probe) {
            return Err(ReleaseError::InvalidTagFormat(
                template.to_string(),
                format!("rendered tag '{probe}' is not a valid git ref name"),
            ));
        }

        Ok(Self {
            template: template.to_string(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
        })
    }

    /// Render a tag name for `version` on `channel` (spec.md glossary:
    /// "tag format" — an `@<channel>` suffix is appended for non-default
    /// channels).
    pub fn render(&self, version: &Version, channel: Option<&str>) -> String {
        let base = render_template(&self.template, &version.to_string())
            .expect("template already validated by compile()");
        match channel {
            Some(c) => format!("{base}@{c}"),
            None => base,
        }
    }

    /// Parse a raw tag name, returning `(version, channel)` on success.
    ///
    /// A tag that doesn't unambiguously match the format, or whose version
    /// segment isn't valid semver, is silently rejected (spec.md §4.2
    /// "Guarantee"): callers treat `None` as "ignore this tag", never as
    /// an error.
    pub fn parse(&self, raw_name: &str) -> Option<(Version, Option<String>)> {
        let (body, channel) = match raw_name.rsplit_once('@') {
            Some((b, c)) if !c.is_empty() => (b, Some(c.to_string())),
            _ => (raw_name, None),
        };

        let version_part = body
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;

        let version = Version::parse(version_part).ok()?;
        Some((version, channel))
    }

    pub fn template(&self) -> &str {
        &self.template
    }
}

fn render_template(template: &str, version: &str) -> Result<String, ReleaseError> {
    let env = minijinja::Environment::new();
    env.render_str(template, minijinja::context! { version => version })
        .map_err(|e| {
            ReleaseError::InvalidTagFormat(template.to_string(), format!("template error: {e}"))
        })
}

/// Syntactic approximation of `git check-ref-format` for a full tag name
/// (the git CLI remains the authority for branch ref names via
/// `GitFacade::check_ref_format`; this check lets `TagFormat::compile`
/// reject obviously bad templates without shelling out).
fn is_valid_git_tag_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('.') || name.ends_with('.') {
        return false;
    }
    if name.ends_with(".lock") || name.ends_with('/') || name.starts_with('/') {
        return false;
    }
    if name.contains("..") || name.contains("//") {
        return false;
    }
    let forbidden = [
        ' ', '~', '^', ':', '?', '*', '[', '\\', '\u{7f}', '@',
    ];
    !name.chars().any(|c| forbidden.contains(&c) || c.is_control())
}

/// Builds, from a compiled `tagFormat` and the raw tag list, a per-branch
/// list of tags (spec.md §4.2 algorithm, steps 3-5).
pub struct TagIndex;

impl TagIndex {
    /// `resolve_head` maps a raw tag name to its commit; tags whose head
    /// can't be resolved are dropped (spec.md §4.2 "Guarantee").
    /// `is_ancestor` tests whether a commit is an ancestor of a branch tip.
    pub fn build(
        format: &TagFormat,
        raw_tags: &[String],
        resolve_head: impl Fn(&str) -> Option<String>,
        branches: &mut [Branch],
        is_ancestor: impl Fn(&str, &str) -> bool,
    ) {
        let mut parsed: Vec<Tag> = Vec::new();
        for raw in raw_tags {
            let Some((version, channel)) = format.parse(raw) else {
                continue;
            };
            let Some(git_head) = resolve_head(raw) else {
                continue;
            };
            parsed.push(Tag {
                raw_name: raw.clone(),
                version,
                channel,
                git_head,
            });
        }

        for branch in branches.iter_mut() {
            branch.tags = parsed
                .iter()
                .filter(|t| is_ancestor(&t.git_head, &branch.name))
                .cloned()
                .collect();
            branch.tags.sort_by(|a, b| a.version.cmp(&b.version));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_rejects_template_without_version() {
        let err = TagFormat::compile("release-note").unwrap_err();
        assert!(matches!(err, ReleaseError::TagNoVersion(_)));
    }

    #[test]
    fn compile_accepts_default_template() {
        let format = TagFormat::compile("v${version}").unwrap();
        assert_eq!(format.template(), "v${version}");
    }

    #[test]
    fn compile_rejects_invalid_rendered_name() {
        let err = TagFormat::compile("release ${version}").unwrap_err();
        // two spaces once rendered with the sentinel -> not exactly one space
        assert!(matches!(err, ReleaseError::TagNoVersion(_)) || matches!(err, ReleaseError::InvalidTagFormat(..)));
        let _ = err;
    }

    #[test]
    fn render_default_channel() {
        let format = TagFormat::compile("v${version}").unwrap();
        let v = Version::new(1, 2, 3);
        assert_eq!(format.render(&v, None), "v1.2.3");
    }

    #[test]
    fn render_with_channel_suffix() {
        let format = TagFormat::compile("v${version}").unwrap();
        let v = Version::new(1, 2, 3);
        assert_eq!(format.render(&v, Some("next")), "v1.2.3@next");
    }

    #[test]
    fn parse_round_trip_default_channel() {
        let format = TagFormat::compile("v${version}").unwrap();
        let v = Version::new(2, 3, 4);
        let rendered = format.render(&v, None);
        let (parsed_v, parsed_c) = format.parse(&rendered).unwrap();
        assert_eq!(parsed_v, v);
        assert_eq!(parsed_c, None);
    }

    #[test]
    fn parse_round_trip_with_channel() {
        let format = TagFormat::compile("v${version}").unwrap();
        let v = Version::new(2, 3, 4);
        let rendered = format.render(&v, Some("beta"));
        let (parsed_v, parsed_c) = format.parse(&rendered).unwrap();
        assert_eq!(parsed_v, v);
        assert_eq!(parsed_c.as_deref(), Some("beta"));
    }

    #[test]
    fn parse_rejects_non_matching_prefix() {
        let format = TagFormat::compile("v${version}").unwrap();
        assert!(format.parse("release-1.0.0").is_none());
    }

    #[test]
    fn parse_rejects_invalid_semver_in_matching_slot() {
        let format = TagFormat::compile("v${version}").unwrap();
        assert!(format.parse("vnotaversion").is_none());
    }

    #[test]
    fn parse_handles_custom_prefix_suffix_template() {
        let format = TagFormat::compile("release-${version}-final").unwrap();
        let v = Version::new(1, 0, 0);
        let rendered = format.render(&v, None);
        assert_eq!(rendered, "release-1.0.0-final");
        let (parsed_v, _) = format.parse(&rendered).unwrap();
        assert_eq!(parsed_v, v);
    }
}
