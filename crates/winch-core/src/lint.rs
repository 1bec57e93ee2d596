//! Commit message linting against the conventional commit format.
//!
//! Every commit in a range is linted independently; diagnostics are
//! batched so a single run surfaces every violation at once. Errors fail
//! the run, warnings never do.

use crate::types::CommitInfo;
use anstyle::{AnsiColor, Style};
use regex::Regex;
use std::sync::OnceLock;

/// Commit types accepted by the `type-enum` rule.
pub const ALLOWED_TYPES: &[&str] = &[
    "build", "chore", "ci", "docs", "feat", "fix", "perf", "refactor", "revert", "style", "test",
];

pub const MAX_HEADER_LENGTH: usize = 100;

/// Outcome of linting a single commit message. Never mutated after the
/// lint call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// A linted commit, pairing the fetched commit with its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLintResult {
    pub commit: CommitInfo,
    pub outcome: LintOutcome,
}

pub(crate) struct Header<'a> {
    pub(crate) commit_type: &'a str,
    pub(crate) subject: &'a str,
    pub(crate) breaking: bool,
}

pub(crate) fn parse_header(header: &str) -> Option<Header<'_>> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<type>[A-Za-z]+)(?:\((?P<scope>[^()]*)\))?(?P<breaking>!)?: (?P<subject>.*)$")
            .unwrap()
    });

    let caps = re.captures(header)?;
    Some(Header {
        commit_type: caps.name("type").map(|m| m.as_str())?,
        subject: caps.name("subject").map(|m| m.as_str())?,
        breaking: caps.name("breaking").is_some(),
    })
}

/// Lint a single commit message against the fixed rule set.
pub fn lint_message(message: &str) -> LintOutcome {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut lines = message.lines();
    let header = lines.next().unwrap_or("");

    let header_length = header.chars().count();
    if header_length > MAX_HEADER_LENGTH {
        errors.push(format!(
            "header must not be longer than {MAX_HEADER_LENGTH} characters, current length is {header_length}"
        ));
    }

    match parse_header(header) {
        None => errors.push(
            "header does not match the conventional commit format '<type>(<scope>): <subject>'"
                .to_string(),
        ),
        Some(parsed) => {
            let lowered = parsed.commit_type.to_ascii_lowercase();
            if !ALLOWED_TYPES.contains(&lowered.as_str()) {
                errors.push(format!(
                    "type must be one of [{}], found '{}'",
                    ALLOWED_TYPES.join(", "),
                    parsed.commit_type
                ));
            } else if parsed.commit_type != lowered {
                errors.push(format!(
                    "type must be lower-case, found '{}'",
                    parsed.commit_type
                ));
            }

            let subject = parsed.subject.trim();
            if subject.is_empty() {
                errors.push("subject must not be empty".to_string());
            } else {
                if subject.ends_with('.') {
                    errors.push("subject must not end with a full stop".to_string());
                }
                if subject.chars().next().is_some_and(char::is_uppercase) {
                    warnings.push("subject should start lower-case".to_string());
                }
            }
        }
    }

    if let Some(first_body_line) = lines.next()
        && !first_body_line.is_empty()
    {
        warnings.push("body should be separated from the header by a blank line".to_string());
    }

    LintOutcome {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Lint all commits in a range; results preserve input order.
pub fn lint_commits(commits: &[CommitInfo]) -> Vec<CommitLintResult> {
    commits
        .iter()
        .map(|commit| CommitLintResult {
            commit: commit.clone(),
            outcome: lint_message(&commit.message),
        })
        .collect()
}

pub fn has_errors(results: &[CommitLintResult]) -> bool {
    results
        .iter()
        .any(|result| !result.outcome.valid && !result.outcome.errors.is_empty())
}

pub fn has_warnings(results: &[CommitLintResult]) -> bool {
    results
        .iter()
        .any(|result| !result.outcome.warnings.is_empty())
}

fn paint(style: Style, text: &str, color: bool) -> String {
    if color {
        format!("{}{}{}", style.render(), text, style.render_reset())
    } else {
        text.to_string()
    }
}

/// Render a human-readable report of all lint results. Color output is an
/// explicit option, never derived from global process state.
pub fn format_report(results: &[CommitLintResult], color: bool) -> String {
    let gray = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::BrightBlack)));
    let red = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)));
    let yellow = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Yellow)));
    let green = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Green)));

    let mut out = String::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for result in results {
        let header = result.commit.message.lines().next().unwrap_or("");
        let label = format!("{}:", result.commit.short_sha());
        out.push_str(&format!("{} {}\n", paint(gray, &label, color), header));

        for error in &result.outcome.errors {
            out.push_str(&format!("  {} {}\n", paint(red, "✖", color), error));
            total_errors += 1;
        }
        for warning in &result.outcome.warnings {
            out.push_str(&format!("  {} {}\n", paint(yellow, "⚠", color), warning));
            total_warnings += 1;
        }
        if result.outcome.errors.is_empty() && result.outcome.warnings.is_empty() {
            out.push_str(&format!("  {} no problems\n", paint(green, "✔", color)));
        }
        out.push('\n');
    }

    let summary = format!("found {total_errors} problems, {total_warnings} warnings");
    let summary_style = if total_errors > 0 {
        red
    } else if total_warnings > 0 {
        yellow
    } else {
        green
    };
    out.push_str(&paint(summary_style, &summary, color));
    out.push('\n');

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(message: &str) -> CommitInfo {
        CommitInfo {
            sha: "abc1234def".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_messages() {
        for message in [
            "feat: add release action",
            "fix(commitlint): handle empty payloads",
            "chore!: drop old workflow inputs",
            "feat: add thing\n\nlonger body here",
        ] {
            let outcome = lint_message(message);
            assert!(outcome.valid, "expected '{message}' to be valid: {outcome:?}");
            assert!(outcome.errors.is_empty());
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let outcome = lint_message("feature: add thing");
        assert!(!outcome.valid);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("type must be one of"));
    }

    #[test]
    fn rejects_upper_case_type() {
        let outcome = lint_message("Feat: add thing");
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("lower-case"));
    }

    #[test]
    fn rejects_empty_subject() {
        let outcome = lint_message("fix: ");
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("subject must not be empty"));
    }

    #[test]
    fn rejects_trailing_full_stop() {
        let outcome = lint_message("fix: repair the thing.");
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("full stop"));
    }

    #[test]
    fn rejects_unparseable_header() {
        let outcome = lint_message("updated some files");
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("conventional commit format"));
    }

    #[test]
    fn rejects_over_long_header() {
        let header = format!("feat: {}", "x".repeat(120));
        let outcome = lint_message(&header);
        assert!(!outcome.valid);
        assert!(outcome.errors[0].contains("longer than 100"));
    }

    #[test]
    fn warns_on_missing_blank_line_before_body() {
        let outcome = lint_message("feat: add thing\nbody right away");
        assert!(outcome.valid);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("blank line"));
    }

    #[test]
    fn warns_on_upper_case_subject() {
        let outcome = lint_message("feat: Add thing");
        assert!(outcome.valid);
        assert!(outcome.warnings[0].contains("lower-case"));
    }

    #[test]
    fn diagnostics_are_batched_not_short_circuited() {
        let outcome = lint_message("Feature: Add the thing.\nbody");
        assert!(!outcome.valid);
        // Unknown type and full stop both reported in one pass.
        assert!(outcome.errors.len() >= 2);
        assert!(!outcome.warnings.is_empty());
    }

    #[test]
    fn lint_commits_preserves_input_order() {
        let commits = vec![commit("feat: first"), commit("broken"), commit("fix: third")];
        let results = lint_commits(&commits);
        assert_eq!(results.len(), 3);
        assert!(results[0].outcome.valid);
        assert!(!results[1].outcome.valid);
        assert!(results[2].outcome.valid);
        assert_eq!(results[1].commit.message, "broken");
    }

    #[test]
    fn error_and_warning_classification() {
        let results = lint_commits(&[commit("feat: ok"), commit("feat: Capitalized")]);
        assert!(!has_errors(&results));
        assert!(has_warnings(&results));

        let results = lint_commits(&[commit("nope")]);
        assert!(has_errors(&results));
    }

    #[test]
    fn report_without_color_has_no_escape_codes() {
        let results = lint_commits(&[commit("nope")]);
        let report = format_report(&results, false);
        assert!(!report.contains('\u{1b}'));
        assert!(report.contains("found 1 problems, 0 warnings"));
    }

    #[test]
    fn report_labels_each_commit_with_its_short_sha() {
        let results = lint_commits(&[commit("feat: ok")]);
        let report = format_report(&results, false);
        assert!(report.contains("abc1234:"));
        assert!(report.contains("feat: ok"));
    }

    #[test]
    fn report_with_color_styles_the_summary() {
        let results = lint_commits(&[commit("feat: ok")]);
        let report = format_report(&results, true);
        assert!(report.contains('\u{1b}'));
        assert!(report.contains("found 0 problems, 0 warnings"));
    }
}
