//! Commit linting action.
//!
//! Determines the commit range implied by the triggering event, fetches
//! every commit in it, and lints each message against the conventional
//! commit format. Pull request events cover the full PR range; push
//! events cover the pushed commits, falling back to the head commit
//! alone when the push has no prior state.

use clap::{ArgAction, Parser};
use serde_json::Value;
use std::process::ExitCode;
use winch_core::errors::{Result, WinchError};
use winch_core::lint::{format_report, has_errors, has_warnings, lint_commits};
use winch_core::types::{CommitInfo, CommitRange, GIT_EMPTY_SHA};
use winch_core::{Context, GithubClient, gha};

#[derive(Debug, Parser)]
#[command(name = "winch-commitlint-action", version, about = "Lint commit messages in CI")]
struct Cli {
    /// API token; defaults to the GITHUB_TOKEN environment variable
    #[arg(long)]
    token: Option<String>,

    /// Render the report with ANSI colors
    #[arg(long, action = ArgAction::SetTrue)]
    color: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(clean) => {
            if clean {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            gha::set_failed(&e.to_string());
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<bool> {
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
    let range = resolve_range(&context, &github)?;
    match &range.from {
        Some(from) => gha::debug(&format!("linting commit range {from}..{}", range.to)),
        None => gha::debug(&format!("no prior state, linting head commit {}", range.to)),
    }
    let commits = fetch_commits(&github, &range)?;

    gha::start_group(&format!("Linting {} commits", commits.len()));
    let results = lint_commits(&commits);
    for line in format_report(&results, cli.color).lines() {
        gha::info(line);
    }
    gha::end_group();

    if has_errors(&results) {
        gha::set_failed("one or more commit messages violate the conventional commit format");
        return Ok(false);
    }
    if has_warnings(&results) {
        gha::warning("commit messages produced lint warnings");
    }

    Ok(true)
}

/// Events that carry a pull request whose full range is linted. Review
/// events also expose a `pull_request` payload but lint nothing new.
fn is_pull_request_event(name: &str) -> bool {
    matches!(name, "pull_request" | "pull_request_target")
}

/// The commit range implied by the triggering event.
///
/// Pull request events span `base.sha..head.sha` as reported by the API,
/// so force-pushed heads are picked up. Push events span
/// `before..after`; a `before` of the all-zero sha means the ref is new
/// and only the head commit can be linted.
fn resolve_range(context: &Context, github: &GithubClient) -> Result<CommitRange> {
    if is_pull_request_event(&context.event_name) {
        let number = context
            .payload
            .pointer("/pull_request/number")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                WinchError::Config("pull request payload carries no number".to_string())
            })?;
        gha::debug(&format!("resolving commit range from pull request #{number}"));

        let pull = github.pull_request(number)?;
        return Ok(CommitRange {
            from: Some(pull.base.sha),
            to: pull.head.sha,
        });
    }

    gha::debug(&format!(
        "resolving commit range from {} event payload",
        context.event_name
    ));
    Ok(push_range(&context.payload, &context.sha))
}

/// Range for a push event, from the webhook payload alone.
fn push_range(payload: &Value, head_sha: &str) -> CommitRange {
    let from = payload
        .get("before")
        .and_then(Value::as_str)
        .filter(|before| *before != GIT_EMPTY_SHA)
        .map(str::to_string);

    CommitRange {
        from,
        to: head_sha.to_string(),
    }
}

fn fetch_commits(github: &GithubClient, range: &CommitRange) -> Result<Vec<CommitInfo>> {
    match &range.from {
        Some(from) => {
            let comparison = github.compare(from, &range.to)?;
            Ok(comparison.commits.into_iter().map(Into::into).collect())
        }
        None => Ok(vec![github.commit(&range.to)?]),
    }
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

    if !cli.color
        && let Some(value) = input("color")
    {
        cli.color = value == "1" || value.eq_ignore_ascii_case("true");
    }
}
