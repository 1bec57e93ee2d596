//! Commit counting between a release tag and HEAD.
//!
//! Two interchangeable sources implement the same capability: one backed
//! by the hosting API (sandboxed runners without a checkout) and one
//! backed by the local git executable (direct checkout access). When the
//! `since` reference does not exist — typically the first release of a
//! component — counting falls back to the repository's genesis commit,
//! inclusive of genesis itself since it has no predecessor to exclude.

use crate::errors::{Result, WinchError};
use crate::github::GithubClient;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Capability for counting commits between two references.
pub trait CommitHistorySource {
    /// Number of commits separating `since_ref` (exclusive) from
    /// `until_ref` (inclusive). Falls back to a genesis-inclusive total
    /// when `since_ref` cannot be resolved.
    fn count_commits(&mut self, since_ref: &str, until_ref: &str) -> Result<u64>;

    /// Total number of commits reachable from `until_ref`, inclusive of
    /// the genesis commit.
    fn count_all(&mut self, until_ref: &str) -> Result<u64>;
}

/// History source backed by the hosting API's compare and listing calls.
pub struct RemoteHistory<'a> {
    github: &'a GithubClient,
    // Genesis resolution pages through the whole history; resolve once
    // per run and reuse.
    genesis: Option<String>,
}

impl<'a> RemoteHistory<'a> {
    pub fn new(github: &'a GithubClient) -> Self {
        Self {
            github,
            genesis: None,
        }
    }

    /// Oldest ancestor of `head`. The history listing is newest-first and
    /// paginated; with one commit per page, the genesis commit is the
    /// single entry of the last page.
    fn genesis_sha(&mut self, head: &str) -> Result<String> {
        if let Some(sha) = &self.genesis {
            return Ok(sha.clone());
        }

        let (first_page, last_page) = self.github.list_commits(head, None, 1, 1)?;
        let nodes = match last_page {
            Some(page) => self.github.list_commits(head, None, 1, page)?.0,
            None => first_page,
        };

        let sha = nodes
            .into_iter()
            .next()
            .map(|node| node.sha)
            .ok_or_else(|| WinchError::GitHub(format!("empty commit history for {head}")))?;

        self.genesis = Some(sha.clone());
        Ok(sha)
    }
}

impl CommitHistorySource for RemoteHistory<'_> {
    fn count_commits(&mut self, since_ref: &str, until_ref: &str) -> Result<u64> {
        match self.github.compare(since_ref, until_ref) {
            Ok(comparison) => Ok(comparison.ahead_by),
            Err(WinchError::NotFound(_)) => self.count_all(until_ref),
            Err(err) => Err(err),
        }
    }

    fn count_all(&mut self, until_ref: &str) -> Result<u64> {
        let genesis = self.genesis_sha(until_ref)?;
        // ahead_by excludes the base commit itself; genesis has no
        // predecessor, so count it in.
        Ok(self.github.compare(&genesis, until_ref)?.ahead_by + 1)
    }
}

/// History source backed by the local git executable.
pub struct LocalHistory {
    root: PathBuf,
    genesis: Option<String>,
}

impl LocalHistory {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            genesis: None,
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .current_dir(&self.root)
            .args(args)
            .output()
            .map_err(WinchError::Io)?;

        if !output.status.success() {
            return Err(WinchError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn ref_exists(&self, reference: &str) -> bool {
        Command::new("git")
            .current_dir(&self.root)
            .args([
                "rev-parse",
                "--verify",
                "--quiet",
                &format!("{reference}^{{commit}}"),
            ])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn genesis_sha(&mut self, head: &str) -> Result<String> {
        if let Some(sha) = &self.genesis {
            return Ok(sha.clone());
        }

        let output = self.git(&["rev-list", "--max-parents=0", head])?;
        // rev-list prints newest first; the oldest root commit is last.
        let sha = output
            .lines()
            .last()
            .map(str::to_string)
            .ok_or_else(|| WinchError::Git(format!("no genesis commit reachable from {head}")))?;

        self.genesis = Some(sha.clone());
        Ok(sha)
    }

    fn count_range(&self, range: &str) -> Result<u64> {
        let output = self.git(&["rev-list", "--count", range])?;
        output
            .parse()
            .map_err(|_| WinchError::Git(format!("unexpected rev-list output '{output}'")))
    }
}

impl CommitHistorySource for LocalHistory {
    fn count_commits(&mut self, since_ref: &str, until_ref: &str) -> Result<u64> {
        if !self.ref_exists(since_ref) {
            return self.count_all(until_ref);
        }
        self.count_range(&format!("{since_ref}..{until_ref}"))
    }

    fn count_all(&mut self, until_ref: &str) -> Result<u64> {
        let genesis = self.genesis_sha(until_ref)?;
        Ok(self.count_range(&format!("{genesis}..{until_ref}"))? + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn git(root: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(root)
            .args([
                "-c",
                "user.name=winch-test",
                "-c",
                "user.email=winch-test@example.com",
            ])
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo_with_commits(root: &Path, count: usize) {
        git(root, &["init", "-q"]);
        for i in 0..count {
            git(
                root,
                &["commit", "--allow-empty", "-q", "-m", &format!("commit {i}")],
            );
        }
    }

    #[test]
    fn local_counts_commits_since_existing_tag() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        init_repo_with_commits(root, 1);
        git(root, &["tag", "pkg-v1.0.0"]);
        git(root, &["commit", "--allow-empty", "-q", "-m", "commit 1"]);
        git(root, &["commit", "--allow-empty", "-q", "-m", "commit 2"]);

        let mut history = LocalHistory::new(root);
        assert_eq!(history.count_commits("pkg-v1.0.0", "HEAD").unwrap(), 2);
    }

    #[test]
    fn local_falls_back_to_genesis_when_tag_is_missing() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        init_repo_with_commits(root, 3);

        let mut history = LocalHistory::new(root);
        // Genesis-inclusive: exclusive count from genesis (2) plus one.
        assert_eq!(history.count_commits("pkg-v1.0.0", "HEAD").unwrap(), 3);
    }

    #[test]
    fn local_count_all_on_single_commit_repo_is_one() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        init_repo_with_commits(root, 1);

        let mut history = LocalHistory::new(root);
        assert_eq!(history.count_all("HEAD").unwrap(), 1);
    }

    #[test]
    fn local_genesis_is_cached_for_the_run() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        init_repo_with_commits(root, 2);

        let mut history = LocalHistory::new(root);
        history.count_all("HEAD").unwrap();
        let cached = history.genesis.clone().unwrap();
        history.count_all("HEAD").unwrap();
        assert_eq!(history.genesis.as_deref(), Some(cached.as_str()));
    }
}
