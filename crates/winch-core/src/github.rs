//! Blocking GitHub API client.
//!
//! Read side: repository metadata, pull requests, commit comparison,
//! single-commit lookup, paginated history listing, and file contents at a
//! ref. Write side (used by the release manager only): refs, releases,
//! single-file content updates, and pull request create/update.
//!
//! A 404 maps to `WinchError::NotFound` (or `None` for content lookups)
//! so callers can route it to fallback paths; every other failure maps to
//! `WinchError::GitHub` and aborts the run without retries.

use crate::errors::{Result, WinchError};
use crate::types::CommitInfo;
use base64::Engine as _;
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::sync::OnceLock;
use std::time::Duration;

const API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("winch/", env!("CARGO_PKG_VERSION"));
const TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestRef {
    pub sha: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub base: PullRequestRef,
    pub head: PullRequestRef,
}

#[derive(Debug, Deserialize)]
pub struct CommitDetail {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitNode {
    pub sha: String,
    pub commit: CommitDetail,
}

impl From<CommitNode> for CommitInfo {
    fn from(node: CommitNode) -> Self {
        CommitInfo {
            sha: node.sha,
            message: node.commit.message,
        }
    }
}

/// Result of `GET /compare/{base}...{head}`.
#[derive(Debug, Deserialize)]
pub struct Comparison {
    /// Commits reachable from head but not base; exclusive of base.
    pub ahead_by: u64,
    pub commits: Vec<CommitNode>,
}

#[derive(Debug, Deserialize)]
pub struct Release {
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    object: RefTarget,
}

#[derive(Debug, Deserialize)]
struct RefTarget {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ContentMeta {
    sha: String,
}

pub struct GithubClient {
    client: reqwest::blocking::Client,
    token: String,
    repo: String,
}

impl GithubClient {
    /// Create a client for `owner/repo` authenticated with `token`.
    pub fn new(repo: &str, token: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token: token.to_string(),
            repo: repo.to_string(),
        })
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn owner(&self) -> &str {
        self.repo.split('/').next().unwrap_or("")
    }

    fn url(&self, path: &str) -> String {
        format!("{API_BASE}/repos/{}{path}", self.repo)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()?;
        Ok(response)
    }

    fn get(&self, path: &str) -> Result<Response> {
        self.send(
            self.client
                .get(self.url(path))
                .header("Accept", "application/vnd.github+json"),
        )
    }

    fn expect_json<T: serde::de::DeserializeOwned>(
        &self,
        context: &str,
        response: Response,
    ) -> Result<T> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(WinchError::NotFound(format!("{context}: not found")));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(WinchError::GitHub(format!(
                "{context}: HTTP {status}: {body}"
            )));
        }
        Ok(response.json::<T>()?)
    }

    /// Repository metadata (used to resolve the default branch).
    pub fn repository(&self) -> Result<Repository> {
        let response = self.get("")?;
        self.expect_json("fetch repository", response)
    }

    pub fn pull_request(&self, number: u64) -> Result<PullRequest> {
        let response = self.get(&format!("/pulls/{number}"))?;
        self.expect_json(&format!("fetch PR #{number}"), response)
    }

    /// Compare `base...head`. A 404 (unknown base or head) surfaces as
    /// `WinchError::NotFound` so callers can fall back.
    pub fn compare(&self, base: &str, head: &str) -> Result<Comparison> {
        let response = self.get(&format!("/compare/{base}...{head}"))?;
        self.expect_json(&format!("compare {base}...{head}"), response)
    }

    pub fn commit(&self, reference: &str) -> Result<CommitInfo> {
        let response = self.get(&format!("/commits/{reference}"))?;
        let node: CommitNode = self.expect_json(&format!("fetch commit {reference}"), response)?;
        Ok(node.into())
    }

    /// List commits reachable from `sha`, newest first, optionally limited
    /// to those touching `path`. Returns the page plus the last page number
    /// from the `Link` header when the listing is paginated.
    pub fn list_commits(
        &self,
        sha: &str,
        path: Option<&str>,
        per_page: u32,
        page: u64,
    ) -> Result<(Vec<CommitNode>, Option<u64>)> {
        let mut url = format!("/commits?sha={sha}&per_page={per_page}&page={page}");
        if let Some(path) = path {
            url.push_str("&path=");
            url.push_str(path);
        }

        let response = self.get(&url)?;
        let link = response
            .headers()
            .get("link")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let nodes: Vec<CommitNode> = self.expect_json("list commits", response)?;

        Ok((nodes, link.as_deref().and_then(last_page_from_link)))
    }

    /// Fetch a file's content at a ref. Missing file or unknown ref is
    /// signal, not an error, and returns `None`.
    pub fn file_content(&self, path: &str, reference: &str) -> Result<Option<String>> {
        let response = self.send(
            self.client
                .get(self.url(&format!("/contents/{path}?ref={reference}")))
                .header("Accept", "application/vnd.github.raw+json"),
        )?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(WinchError::GitHub(format!(
                "fetch {path}@{reference}: HTTP {status}: {body}"
            )));
        }

        Ok(Some(response.text()?))
    }

    /// Blob sha of a file at a ref, needed when updating it in place.
    pub fn file_sha(&self, path: &str, reference: &str) -> Result<Option<String>> {
        let response = self.get(&format!("/contents/{path}?ref={reference}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let meta: ContentMeta = self.expect_json(&format!("stat {path}@{reference}"), response)?;
        Ok(Some(meta.sha))
    }

    fn ref_sha(&self, reference: &str) -> Result<Option<String>> {
        let response = self.get(&format!("/git/ref/{reference}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let object: RefObject = self.expect_json(&format!("resolve ref {reference}"), response)?;
        Ok(Some(object.object.sha))
    }

    pub fn tag_sha(&self, tag: &str) -> Result<Option<String>> {
        self.ref_sha(&format!("tags/{tag}"))
    }

    pub fn branch_sha(&self, branch: &str) -> Result<Option<String>> {
        self.ref_sha(&format!("heads/{branch}"))
    }

    pub fn create_branch(&self, branch: &str, sha: &str) -> Result<()> {
        let payload = json!({ "ref": format!("refs/heads/{branch}"), "sha": sha });
        let response = self.send(
            self.client
                .post(self.url("/git/refs"))
                .header("Accept", "application/vnd.github+json")
                .json(&payload),
        )?;
        let _: serde_json::Value = self.expect_json(&format!("create branch {branch}"), response)?;
        Ok(())
    }

    pub fn create_release(
        &self,
        tag: &str,
        target_commitish: &str,
        name: &str,
        body: &str,
        prerelease: bool,
    ) -> Result<Release> {
        let payload = json!({
            "tag_name": tag,
            "target_commitish": target_commitish,
            "name": name,
            "body": body,
            "prerelease": prerelease,
        });
        let response = self.send(
            self.client
                .post(self.url("/releases"))
                .header("Accept", "application/vnd.github+json")
                .json(&payload),
        )?;
        self.expect_json(&format!("create release {tag}"), response)
    }

    /// Create or update a single file on a branch via the contents API.
    pub fn put_file(
        &self,
        path: &str,
        branch: &str,
        message: &str,
        content: &str,
        existing_sha: Option<&str>,
    ) -> Result<()> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(content);
        let mut payload = json!({
            "message": message,
            "content": encoded,
            "branch": branch,
        });
        if let Some(sha) = existing_sha {
            payload["sha"] = json!(sha);
        }

        let response = self.send(
            self.client
                .put(self.url(&format!("/contents/{path}")))
                .header("Accept", "application/vnd.github+json")
                .json(&payload),
        )?;
        let _: serde_json::Value =
            self.expect_json(&format!("update {path} on {branch}"), response)?;
        Ok(())
    }

    /// Find the open PR whose head is the given branch of this repository.
    pub fn find_open_pull_request(&self, head_branch: &str) -> Result<Option<PullRequest>> {
        let response = self.get(&format!(
            "/pulls?state=open&head={}:{head_branch}",
            self.owner()
        ))?;
        let mut pulls: Vec<PullRequest> = self.expect_json("list open PRs", response)?;
        Ok(if pulls.is_empty() {
            None
        } else {
            Some(pulls.remove(0))
        })
    }

    pub fn create_pull_request(
        &self,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest> {
        let payload = json!({
            "title": title,
            "head": head_branch,
            "base": base_branch,
            "body": body,
        });
        let response = self.send(
            self.client
                .post(self.url("/pulls"))
                .header("Accept", "application/vnd.github+json")
                .json(&payload),
        )?;
        self.expect_json(&format!("create PR {head_branch} -> {base_branch}"), response)
    }

    pub fn update_pull_request(&self, number: u64, title: &str, body: &str) -> Result<PullRequest> {
        let payload = json!({ "title": title, "body": body });
        let response = self.send(
            self.client
                .patch(self.url(&format!("/pulls/{number}")))
                .header("Accept", "application/vnd.github+json")
                .json(&payload),
        )?;
        self.expect_json(&format!("update PR #{number}"), response)
    }
}

/// Extract the last page number from a GitHub `Link` header.
pub fn last_page_from_link(link: &str) -> Option<u64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r#"page=(\d+)>; rel="last""#).unwrap());
    re.captures(link)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_parses_github_link_header() {
        let link = "<https://api.github.com/repositories/1/commits?per_page=1&page=2>; \
                    rel=\"next\", <https://api.github.com/repositories/1/commits?per_page=1&page=347>; \
                    rel=\"last\"";
        assert_eq!(last_page_from_link(link), Some(347));
    }

    #[test]
    fn last_page_absent_when_single_page() {
        assert_eq!(last_page_from_link(""), None);
        assert_eq!(
            last_page_from_link("<https://api.github.com/x?page=2>; rel=\"next\""),
            None
        );
    }

    #[test]
    fn comparison_deserializes_from_api_shape() {
        let json = r#"{
            "ahead_by": 5,
            "behind_by": 0,
            "commits": [
                {"sha": "abc1234def", "commit": {"message": "feat: add thing"}}
            ]
        }"#;

        let comparison: Comparison = serde_json::from_str(json).unwrap();
        assert_eq!(comparison.ahead_by, 5);
        assert_eq!(comparison.commits.len(), 1);

        let info: CommitInfo = comparison.commits.into_iter().next().unwrap().into();
        assert_eq!(info.sha, "abc1234def");
        assert_eq!(info.message, "feat: add thing");
    }

    #[test]
    fn pull_request_deserializes_base_and_head_shas() {
        let json = r#"{
            "number": 42,
            "title": "chore: release main",
            "html_url": "https://github.com/a/b/pull/42",
            "base": {"sha": "base000", "ref": "main"},
            "head": {"sha": "head111", "ref": "release-please--branches--main"}
        }"#;

        let pr: PullRequest = serde_json::from_str(json).unwrap();
        assert_eq!(pr.number, 42);
        assert_eq!(pr.base.sha, "base000");
        assert_eq!(pr.head.sha, "head111");
    }
}
