use std::collections::HashMap;
use std::path::Path;

use clap::{CommandFactory, Parser, Subcommand};
use sr_core::branch::BranchClassifier;
use sr_core::changelog::ChangelogNotesPlugin;
use sr_core::changelog::DefaultChangelogFormatter;
use sr_core::ci::CiEnv;
use sr_core::commit::{DefaultCommitClassifier, DefaultCommitParser};
use sr_core::config::ReleaseConfig;
use sr_core::error::ReleaseError;
use sr_core::gate::{apply_release_environment, GateController, GateOutcome};
use sr_core::git::{GitFacade, RefKind};
use sr_core::pipeline::{PipelineDriver, PipelineOutcome};
use sr_core::plugin::{DefaultAnalyzeCommitsPlugin, Plugin, ShellPlugin, VcsPublishPlugin};
use sr_core::release::NoopVcsProvider;
use sr_core::scrub::{ScrubbedOutput, Scrubber};
use sr_core::tag::{TagFormat, TagIndex};
use sr_core::url;
use sr_core::version_files::VersionFilesPlugin;
use sr_git::NativeGitRepository;
use sr_github::GitHubProvider;

const DEFAULT_CONFIG_FILE: &str = ".urmzd.sr.yml";

#[derive(Parser)]
#[command(name = "sr", about = "Semantic Release CLI", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the current branch, compute the next release and run the
    /// plugin pipeline. Outside CI (and without `--no-ci`) this always
    /// previews without tagging or pushing.
    Release {
        /// Preview what would happen without making changes
        #[arg(long)]
        dry_run: bool,

        /// Run as if in CI even when no CI environment is detected
        #[arg(long)]
        no_ci: bool,
    },

    /// Show the configured branches, their classification and tag ranges
    Branches,

    /// Validate and display resolved configuration
    Config {
        /// Show the fully resolved config with defaults applied
        #[arg(long)]
        resolved: bool,
    },

    /// Create a default configuration file
    Init {
        /// Overwrite the config file if it already exists
        #[arg(long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Resolves the pushable repository URL (with push credentials embedded, if
/// any are configured) and its `(hostname, owner, repo)` breakdown, from the
/// `origin` remote.
fn resolve_repo_url(git: &NativeGitRepository) -> anyhow::Result<url::ResolvedUrl> {
    let remote = git.remote_url()?;
    Ok(url::resolve(&remote, env_lookup)?)
}

/// Builds a `GitHubProvider` from a resolved `origin` URL when the host
/// looks like GitHub and an API token is present in the environment;
/// otherwise returns `None` and the pipeline publishes through a no-op
/// provider instead.
fn github_provider(resolved: &url::ResolvedUrl) -> Option<GitHubProvider> {
    if !resolved.hostname.contains("github") {
        return None;
    }
    let token = env_lookup("GH_TOKEN").or_else(|| env_lookup("GITHUB_TOKEN"))?;
    Some(GitHubProvider::new(
        resolved.owner.clone(),
        resolved.repo.clone(),
        resolved.hostname.clone(),
        token,
    ))
}

fn build_plugins(config: &ReleaseConfig, resolved: &url::ResolvedUrl) -> Vec<Box<dyn Plugin>> {
    let formatter = DefaultChangelogFormatter::new(
        config.changelog.template.clone(),
        config.types.clone(),
        config.breaking_section.clone(),
    );

    let analyze_commits = DefaultAnalyzeCommitsPlugin::new(Box::new(DefaultCommitClassifier::new(
        config.types.clone(),
        config.commit_pattern.clone(),
    )));

    let mut plugins: Vec<Box<dyn Plugin>> = vec![
        Box::new(ShellPlugin::new()),
        Box::new(analyze_commits),
    ];

    match github_provider(resolved) {
        Some(provider) => {
            plugins.push(Box::new(ChangelogNotesPlugin::new(
                formatter,
                Some(Box::new(provider.clone())),
            )));
            plugins.push(Box::new(VersionFilesPlugin));
            plugins.push(Box::new(VcsPublishPlugin::new(provider)));
        }
        None => {
            plugins.push(Box::new(ChangelogNotesPlugin::new(formatter, None)));
            plugins.push(Box::new(VersionFilesPlugin));
            plugins.push(Box::new(VcsPublishPlugin::new(NoopVcsProvider)));
        }
    }

    plugins
}

fn report_outcome(outcome: &PipelineOutcome, out: &ScrubbedOutput<'_>) {
    match outcome {
        PipelineOutcome::NoRelease => {
            out.out("no release");
        }
        PipelineOutcome::DryRun { next_release } => {
            out.out(&format!("dry-run: would release {}", next_release.git_tag));
            if let Some(notes) = &next_release.notes {
                out.out(&format!("\n{notes}"));
            }
        }
        PipelineOutcome::Released { releases } => {
            for r in releases {
                out.out(&format!("released {} ({:?})", r.git_tag, r.kind));
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { force } => {
            let path = Path::new(DEFAULT_CONFIG_FILE);

            if path.exists() && !force {
                anyhow::bail!("{DEFAULT_CONFIG_FILE} already exists (use --force to overwrite)");
            }

            let config = ReleaseConfig::default();
            let yaml = serde_yaml_ng::to_string(&config)?;
            std::fs::write(path, yaml)?;

            eprintln!("wrote {DEFAULT_CONFIG_FILE}");
            Ok(())
        }

        Commands::Config { resolved } => {
            let config = ReleaseConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;
            if resolved {
                let yaml = serde_yaml_ng::to_string(&config)?;
                print!("{yaml}");
            } else {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    let raw = std::fs::read_to_string(path)?;
                    print!("{raw}");
                } else {
                    eprintln!("no config file found; showing defaults");
                    let yaml = serde_yaml_ng::to_string(&config)?;
                    print!("{yaml}");
                }
            }
            Ok(())
        }

        Commands::Branches => {
            let config = ReleaseConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;
            let git = NativeGitRepository::open(Path::new("."))?;

            let mut branches = BranchClassifier::classify(&config.branches, |name| {
                git.check_ref_format(RefKind::Heads, name)
            })?;
            BranchClassifier::compute_ranges(&mut branches);

            for branch in &branches {
                println!(
                    "{} [{:?}] channel={}",
                    branch.name,
                    branch.kind,
                    branch.channel.as_deref().unwrap_or("(default)")
                );
            }
            Ok(())
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "sr", &mut std::io::stdout());
            Ok(())
        }

        Commands::Release { dry_run, no_ci } => {
            let config = ReleaseConfig::load(Path::new(DEFAULT_CONFIG_FILE))?;
            let git = NativeGitRepository::open(Path::new("."))?;

            if !git.is_repo() {
                return Err(ReleaseError::NoGitRepo.into());
            }

            let resolved_url = resolve_repo_url(&git)?;
            let ci = CiEnv::detect(env_lookup);
            let process_env = process_env();
            let scrubber = Scrubber::from_env(
                process_env
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            );
            // Installed before the gate runs so every write to stdout/stderr
            // for the rest of the run, including plugin diagnostics, passes
            // through it (spec.md §5, §6.3).
            let out = ScrubbedOutput::new(&scrubber);

            let mut branches = BranchClassifier::classify(&config.branches, |name| {
                git.check_ref_format(RefKind::Heads, name)
            })?;

            let gate = GateController::new(&git);
            let outcome = gate.admit(&branches, &ci, dry_run, no_ci, &resolved_url.url, &out)?;

            let (branch_index, dry_run) = match outcome {
                GateOutcome::Admitted { branch_index, dry_run } => (branch_index, dry_run),
                GateOutcome::Skip(reason) => {
                    out.out(&format!("skipped: {reason}"));
                    return Ok(());
                }
            };

            if ci.is_ci {
                git.fetch()?;
            }

            let tag_format = TagFormat::compile(&config.tag_format)?;
            let raw_tags: Vec<String> = git.tags()?.into_iter().map(|t| t.name).collect();
            TagIndex::build(
                &tag_format,
                &raw_tags,
                |name| git.tag_head(name),
                &mut branches,
                |commit, branch_tip| git.is_ancestor(commit, branch_tip),
            );
            BranchClassifier::compute_ranges(&mut branches);

            let plugins = build_plugins(&config, &resolved_url);
            let commit_parser = DefaultCommitParser;
            let driver = PipelineDriver::new(
                &git,
                &plugins,
                &tag_format,
                &commit_parser,
                &resolved_url.url,
                &out,
            );

            let env = apply_release_environment(&ci, &process_env);

            match driver.run(config, branches, branch_index, dry_run, env) {
                Ok(outcome) => {
                    report_outcome(&outcome, &out);
                    Ok(())
                }
                Err(aggregate) => {
                    for err in &aggregate.0 {
                        out.err(&format!("error [{}]: {err}", err.code()));
                    }
                    anyhow::bail!("release failed")
                }
            }
        }
    }
}
