//! Release automation action.
//!
//! Runs the manifest-driven release flow against the repository the
//! workflow executes in: publishes releases for freshly merged manifest
//! versions, maintains the release pull request, and computes a
//! deterministic prerelease version for every package with pending
//! changes. The collected `path -> version entry` map is emitted as the
//! `versions` output.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use winch_core::errors::{Result, WinchError};
use winch_core::history::{CommitHistorySource, LocalHistory, RemoteHistory};
use winch_core::manifest::{ManifestSnapshot, diff};
use winch_core::prerelease::{compose_prereleases, stable_versions};
use winch_core::release::{GithubReleaseManager, ReleaseManager};
use winch_core::types::VersionsMap;
use winch_core::{Context, GithubClient, gha};

/// Where commit counts for prerelease versions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum HistorySource {
    /// The hosting API; works on runners without a checkout.
    Remote,
    /// The local git executable; requires a full-depth checkout.
    Local,
}

#[derive(Debug, Parser)]
#[command(name = "winch-release-action", version, about = "Compute release and prerelease versions")]
struct Cli {
    /// API token; defaults to the GITHUB_TOKEN environment variable
    #[arg(long)]
    token: Option<String>,

    /// Channel name embedded in prerelease versions; prerelease
    /// composition is skipped when unset
    #[arg(long)]
    prerelease_channel: Option<String>,

    /// Branch releases are cut from (defaults to the repository default branch)
    #[arg(long)]
    target_branch: Option<String>,

    /// Commit counting backend
    #[arg(long, value_enum, default_value = "remote")]
    history_source: HistorySource,

    /// Checkout root, used by the local history source
    #[arg(long)]
    working_directory: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            gha::set_failed(&e.to_string());
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let mut cli = Cli::parse();
    apply_input_overrides(&mut cli);

    let context = Context::from_env()?;
    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| WinchError::Config("no token input and GITHUB_TOKEN is not set".to_string()))?;

    let github = GithubClient::new(&context.repository, &token)?;
    let target_branch = match &cli.target_branch {
        Some(branch) => branch.clone(),
        None => github.repository()?.default_branch,
    };

    let mut manager = GithubReleaseManager::load(&github, &target_branch)?;

    gha::start_group("Creating releases");
    let created = manager.create_releases()?;
    for release in &created {
        gha::info(&format!(
            "released {} {} as {} ({})",
            release.path, release.version, release.tag, release.html_url
        ));
    }
    if created.is_empty() {
        gha::info("no releases to create");
    }
    gha::end_group();

    gha::start_group("Maintaining release pull request");
    for pull in manager.create_pull_requests()? {
        gha::info(&format!("release PR #{}: {}", pull.number, pull.html_url));
    }
    gha::end_group();

    // Just-released packages get stable entries; changed packages get
    // prerelease entries on top.
    let mut versions = stable_versions(&ManifestSnapshot::from_entries(
        created
            .iter()
            .map(|release| (release.path.clone(), release.version.clone())),
    ));

    if let Some(channel) = &cli.prerelease_channel {
        let released = manager.released_versions()?;
        // A missing release branch or manifest means nothing is pending.
        let changed = match manager.pending_versions()? {
            Some(pending) => diff(&released, &pending),
            None => Default::default(),
        };

        let mut history: Box<dyn CommitHistorySource + '_> = match cli.history_source {
            HistorySource::Remote => Box::new(RemoteHistory::new(&github)),
            HistorySource::Local => {
                let root = cli
                    .working_directory
                    .clone()
                    .or_else(|| std::env::var_os("GITHUB_WORKSPACE").map(PathBuf::from))
                    .ok_or_else(|| {
                        WinchError::Config(
                            "local history needs --working-directory or GITHUB_WORKSPACE"
                                .to_string(),
                        )
                    })?;
                Box::new(LocalHistory::new(&root))
            }
        };

        gha::start_group("Composing prerelease versions");
        compose_prereleases(
            &changed,
            &manager,
            history.as_mut(),
            channel,
            &context.sha,
            &mut versions,
        )?;
        gha::end_group();
    } else {
        gha::info("no prerelease channel configured, skipping prerelease versions");
    }

    emit_versions(&versions)?;
    Ok(())
}

fn emit_versions(versions: &VersionsMap) -> Result<()> {
    let json = serde_json::to_string(versions)
        .map_err(|err| WinchError::InvalidData(format!("versions serialization: {err}")))?;
    gha::info(&format!("versions: {json}"));
    gha::set_output("versions", &json)
}

/// Apply GitHub Actions input environment variables to CLI arguments
fn apply_input_overrides(cli: &mut Cli) {
    apply_input_overrides_with(cli, gha::input);
}

fn apply_input_overrides_with<F>(cli: &mut Cli, input: F)
where
    F: Fn(&str) -> Option<String>,
{
    if cli.token.is_none() {
        cli.token = input("token");
    }

    if cli.prerelease_channel.is_none() {
        cli.prerelease_channel = input("prerelease-channel");
    }

    if cli.target_branch.is_none() {
        cli.target_branch = input("target-branch");
    }

    if let Some(source) = input("history-source") {
        match source.to_ascii_lowercase().as_str() {
            "local" => cli.history_source = HistorySource::Local,
            "remote" => cli.history_source = HistorySource::Remote,
            other => gha::warning(&format!("unknown history-source '{other}', keeping default")),
        }
    }

    if cli.working_directory.is_none() {
        cli.working_directory = input("working-directory").map(PathBuf::from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winch_core::types::{ReleaseType, VersionEntry};

    fn default_cli() -> Cli {
        Cli {
            token: None,
            prerelease_channel: None,
            target_branch: None,
            history_source: HistorySource::Remote,
            working_directory: None,
        }
    }

    #[test]
    fn input_overrides_fill_unset_arguments() {
        let mut cli = default_cli();
        let input = |name: &str| -> Option<String> {
            match name {
                "token" => Some("t0ken".to_string()),
                "prerelease-channel" => Some("next".to_string()),
                "target-branch" => Some("master".to_string()),
                "history-source" => Some("local".to_string()),
                "working-directory" => Some("/workspace".to_string()),
                _ => None,
            }
        };

        apply_input_overrides_with(&mut cli, input);

        assert_eq!(cli.token.as_deref(), Some("t0ken"));
        assert_eq!(cli.prerelease_channel.as_deref(), Some("next"));
        assert_eq!(cli.target_branch.as_deref(), Some("master"));
        assert_eq!(cli.history_source, HistorySource::Local);
        assert_eq!(cli.working_directory.as_deref(), Some("/workspace".as_ref()));
    }

    #[test]
    fn explicit_arguments_win_over_inputs() {
        let mut cli = default_cli();
        cli.token = Some("from-arg".to_string());
        cli.target_branch = Some("main".to_string());

        let input = |name: &str| -> Option<String> {
            match name {
                "token" => Some("from-input".to_string()),
                "target-branch" => Some("master".to_string()),
                _ => None,
            }
        };

        apply_input_overrides_with(&mut cli, input);

        assert_eq!(cli.token.as_deref(), Some("from-arg"));
        assert_eq!(cli.target_branch.as_deref(), Some("main"));
    }

    #[test]
    fn unknown_history_source_keeps_default() {
        let mut cli = default_cli();
        let input =
            |name: &str| -> Option<String> { (name == "history-source").then(|| "ftp".to_string()) };

        apply_input_overrides_with(&mut cli, input);
        assert_eq!(cli.history_source, HistorySource::Remote);
    }

    #[test]
    fn versions_output_is_compact_json() {
        let versions = VersionsMap::from([(
            "actions/setup".to_string(),
            VersionEntry {
                version: "1.1.0-alpha.5+abc1234".to_string(),
                tag: "1.1.0-alpha.5-abc1234".to_string(),
                release_type: ReleaseType::Prerelease,
            },
        )]);

        let json = serde_json::to_string(&versions).unwrap();
        assert_eq!(
            json,
            "{\"actions/setup\":{\"version\":\"1.1.0-alpha.5+abc1234\",\"tag\":\"1.1.0-alpha.5-abc1234\",\"type\":\"prerelease\"}}"
        );
    }
}
