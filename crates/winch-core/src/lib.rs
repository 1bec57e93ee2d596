pub mod errors;
pub mod gha;
pub mod github;
pub mod history;
pub mod lint;
pub mod manifest;
pub mod prerelease;
pub mod refs;
pub mod release;
pub mod tag;
pub mod types;

// Re-export commonly used items
pub use errors::{Result, WinchError};
pub use gha::Context;
pub use github::{Comparison, GithubClient, PullRequest};
pub use history::{CommitHistorySource, LocalHistory, RemoteHistory};
pub use lint::{
    CommitLintResult, LintOutcome, format_report, has_errors, has_warnings, lint_commits,
    lint_message,
};
pub use manifest::{MANIFEST_PATH, ManifestSnapshot, diff};
pub use prerelease::{compose_prereleases, stable_versions};
pub use refs::{CheckReport, PackageDescriptor, ResolveReport, check_refs, resolve_refs};
pub use release::{
    CONFIG_PATH, GithubReleaseManager, ReleaseConfig, ReleaseManager, Strategy, TagConfig,
    release_branch_for,
};
pub use tag::{TagName, parse_version};
pub use types::{
    ChangedPackage, CommitInfo, CommitRange, GIT_EMPTY_SHA, ReleaseType, VersionEntry, VersionsMap,
};
