//! Release management against the hosting API.
//!
//! The manager owns the manifest-driven release flow: it reads the
//! release configuration and the released-versions manifest from the
//! target branch, tags and publishes releases for manifest entries that
//! lack one, and maintains a release pull request carrying the pending
//! manifest on a dedicated branch. Version bumps are inferred from
//! conventional commit headers touching each tracked path.

use crate::errors::{Result, WinchError};
use crate::github::{CommitNode, GithubClient, PullRequest};
use crate::lint::parse_header;
use crate::manifest::{self, MANIFEST_PATH, ManifestSnapshot};
use crate::tag::{TagName, parse_version};
use crate::types::CommitInfo;
use rustc_hash::FxHashSet;
use semver::Version;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Fixed repository path of the release configuration.
pub const CONFIG_PATH: &str = "release-please-config.json";

const COMMITS_PER_PAGE: u32 = 100;

/// Branch the pending manifest and release pull request live on.
pub fn release_branch_for(target_branch: &str) -> String {
    format!("release-please--branches--{target_branch}")
}

/// How release tags are composed for this repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagConfig {
    pub separator: String,
    pub include_v: bool,
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            separator: "-".to_string(),
            include_v: true,
        }
    }
}

/// Per-package section of the release configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageConfig {
    /// Tag component; defaults to the package descriptor's name.
    pub component: Option<String>,
    #[serde(default = "default_true", rename = "include-component-in-tag")]
    pub include_component_in_tag: bool,
    #[serde(rename = "include-v-in-tag")]
    pub include_v_in_tag: Option<bool>,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            component: None,
            include_component_in_tag: true,
            include_v_in_tag: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// The release configuration file, `release-please-config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseConfig {
    pub packages: BTreeMap<String, PackageConfig>,
    #[serde(default = "default_separator", rename = "tag-separator")]
    pub tag_separator: String,
    #[serde(default = "default_true", rename = "include-v-in-tag")]
    pub include_v_in_tag: bool,
}

fn default_separator() -> String {
    "-".to_string()
}

impl ReleaseConfig {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|err| WinchError::Config(format!("invalid release config: {err}")))
    }

    /// Tag configuration for one tracked path, package overrides applied.
    pub fn tag_config(&self, path: &str) -> TagConfig {
        let include_v = self
            .packages
            .get(path)
            .and_then(|package| package.include_v_in_tag)
            .unwrap_or(self.include_v_in_tag);
        TagConfig {
            separator: self.tag_separator.clone(),
            include_v,
        }
    }
}

/// Versioning strategy for one tracked path.
pub trait Strategy {
    /// Tag component this path releases under, `None` when the tag
    /// carries the bare version.
    fn component_name(&self) -> Result<Option<String>>;
}

/// Package name with any `@scope/` prefix stripped.
fn unscoped(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Strategy derived from the release configuration. Without an explicit
/// component, the name comes from the package descriptor at the tracked
/// path, falling back to the path's last segment.
pub struct ConfiguredStrategy<'a> {
    path: String,
    component: Option<String>,
    include_component: bool,
    descriptor_source: Option<(&'a GithubClient, String)>,
}

impl<'a> ConfiguredStrategy<'a> {
    pub fn for_package(path: &str, config: &PackageConfig) -> Self {
        Self {
            path: path.to_string(),
            component: config.component.clone(),
            include_component: config.include_component_in_tag,
            descriptor_source: None,
        }
    }

    /// Resolve the default component from `{path}/package.json` on the
    /// given branch.
    pub fn with_remote_descriptor(mut self, github: &'a GithubClient, branch: &str) -> Self {
        self.descriptor_source = Some((github, branch.to_string()));
        self
    }
}

impl Strategy for ConfiguredStrategy<'_> {
    fn component_name(&self) -> Result<Option<String>> {
        if !self.include_component {
            return Ok(None);
        }
        if let Some(component) = &self.component {
            return Ok(Some(component.clone()));
        }

        if let Some((github, branch)) = &self.descriptor_source
            && let Some(text) = github.file_content(&format!("{}/package.json", self.path), branch)?
        {
            let descriptor: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
                WinchError::Config(format!("invalid package descriptor at {}: {err}", self.path))
            })?;
            if let Some(name) = descriptor.get("name").and_then(serde_json::Value::as_str) {
                return Ok(Some(unscoped(name).to_string()));
            }
        }

        Ok(self
            .path
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_string))
    }
}

/// A release created by `create_releases`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRelease {
    pub path: String,
    pub version: String,
    pub tag: String,
    pub html_url: String,
}

/// The manifest-driven release flow, seam for the prerelease composer.
pub trait ReleaseManager {
    /// Released versions, read from the manifest on the target branch.
    fn released_versions(&mut self) -> Result<ManifestSnapshot>;

    /// Pending versions from the release branch, `None` when no release
    /// pull request is in flight.
    fn pending_versions(&mut self) -> Result<Option<ManifestSnapshot>>;

    fn tag_config(&self, path: &str) -> TagConfig;

    /// Strategy for a tracked path, `None` when the path is not part of
    /// the release configuration.
    fn strategy(&self, path: &str) -> Option<Box<dyn Strategy + '_>>;

    /// Tag and publish a release for every manifest entry without one.
    fn create_releases(&mut self) -> Result<Vec<CreatedRelease>>;

    /// Maintain the release pull request: push the pending manifest to
    /// the release branch and open or refresh the PR.
    fn create_pull_requests(&mut self) -> Result<Vec<PullRequest>>;
}

/// Severity of a version bump inferred from commit messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Bump {
    Patch,
    Minor,
    Major,
}

/// Classify one commit message. `None` for commit types that do not
/// trigger a release (docs, chore, ci, ...).
fn bump_for_message(message: &str) -> Option<Bump> {
    if message.contains("BREAKING CHANGE") {
        return Some(Bump::Major);
    }

    let header = parse_header(message.lines().next().unwrap_or(""))?;
    if header.breaking {
        return Some(Bump::Major);
    }
    match header.commit_type {
        "feat" => Some(Bump::Minor),
        "fix" | "perf" | "revert" => Some(Bump::Patch),
        _ => None,
    }
}

/// Strongest bump across a set of commits, `None` when nothing in the
/// set is releasable.
pub fn bump_for_commits<'a, I>(messages: I) -> Option<Bump>
where
    I: IntoIterator<Item = &'a str>,
{
    messages.into_iter().filter_map(bump_for_message).max()
}

/// Apply a bump to a released version. Prerelease and build suffixes of
/// the current version never carry over.
pub fn next_version(current: &Version, bump: Bump) -> Version {
    match bump {
        Bump::Major => Version::new(current.major + 1, 0, 0),
        Bump::Minor => Version::new(current.major, current.minor + 1, 0),
        Bump::Patch => Version::new(current.major, current.minor, current.patch + 1),
    }
}

/// Append a listing page's commits to `out`, stopping at the first
/// commit outside the `since` set. Returns true when that boundary was
/// hit.
fn collect_until_boundary(
    page: Vec<CommitNode>,
    since: Option<&FxHashSet<String>>,
    out: &mut Vec<CommitInfo>,
) -> bool {
    for node in page {
        if let Some(since) = since
            && !since.contains(&node.sha)
        {
            return true;
        }
        out.push(node.into());
    }
    false
}

/// Manager backed by the GitHub API, operating entirely on remote state.
pub struct GithubReleaseManager<'a> {
    github: &'a GithubClient,
    target_branch: String,
    config: ReleaseConfig,
    released: Option<ManifestSnapshot>,
}

impl<'a> GithubReleaseManager<'a> {
    /// Load the release configuration from the target branch.
    pub fn load(github: &'a GithubClient, target_branch: &str) -> Result<Self> {
        let text = github
            .file_content(CONFIG_PATH, target_branch)?
            .ok_or_else(|| {
                WinchError::Config(format!("{CONFIG_PATH} not found on {target_branch}"))
            })?;

        Ok(Self {
            github,
            target_branch: target_branch.to_string(),
            config: ReleaseConfig::parse(&text)?,
            released: None,
        })
    }

    pub fn target_branch(&self) -> &str {
        &self.target_branch
    }

    fn tag_for(&self, path: &str, version: &Version) -> Result<Option<String>> {
        let Some(strategy) = self.strategy(path) else {
            return Ok(None);
        };
        let tag_config = self.tag_config(path);
        let tag = TagName::new(
            version.clone(),
            strategy.component_name()?.as_deref(),
            &tag_config.separator,
            tag_config.include_v,
        );
        Ok(Some(tag.to_string()))
    }

    /// Commits on the target branch touching `path`, newest first,
    /// bounded by `since_tag` when that tag exists.
    ///
    /// The tagged commit is usually the release merge, which only
    /// touches the manifest, so its sha never appears in a
    /// path-filtered listing. The boundary is therefore the set of
    /// shas ahead of the tag: the first listed commit outside that set
    /// predates the tag.
    fn commits_since(&self, path: &str, since_tag: Option<&str>) -> Result<Vec<CommitInfo>> {
        let since: Option<FxHashSet<String>> = match since_tag {
            Some(tag) if self.github.tag_sha(tag)?.is_some() => {
                let comparison = self.github.compare(tag, &self.target_branch)?;
                Some(comparison.commits.into_iter().map(|node| node.sha).collect())
            }
            _ => None,
        };

        let mut commits = Vec::new();
        let mut page = 1;
        loop {
            let (nodes, last_page) =
                self.github
                    .list_commits(&self.target_branch, Some(path), COMMITS_PER_PAGE, page)?;
            if nodes.is_empty() {
                break;
            }

            if collect_until_boundary(nodes, since.as_ref(), &mut commits) {
                return Ok(commits);
            }

            match last_page {
                Some(last) if page < last => page += 1,
                _ => break,
            }
        }

        Ok(commits)
    }

    /// Compute the pending manifest from releasable commits per package.
    fn compute_pending(&mut self) -> Result<ManifestSnapshot> {
        let released = self.released_versions()?;
        let mut pending = released.clone();

        for (path, _) in self.config.packages.clone() {
            let current = released.get(&path).map(str::to_string);
            let since_tag = match &current {
                Some(version) => self.tag_for(&path, &parse_version(version)?)?,
                None => None,
            };

            let commits = self.commits_since(&path, since_tag.as_deref())?;
            let bump = bump_for_commits(commits.iter().map(|c| c.message.as_str()));

            match (&current, bump) {
                (Some(version), Some(bump)) => {
                    pending.set(&path, &next_version(&parse_version(version)?, bump).to_string());
                }
                // First release of a path: any releasable commit seeds it.
                (None, Some(_)) => pending.set(&path, "0.1.0"),
                (_, None) => {}
            }
        }

        Ok(pending)
    }

    fn pull_request_body(released: &ManifestSnapshot, pending: &ManifestSnapshot) -> String {
        let mut body = String::from("Pending releases:\n");
        for (path, change) in manifest::diff(released, pending) {
            match change.current {
                Some(current) => {
                    body.push_str(&format!("- `{path}`: {current} -> {}\n", change.next));
                }
                None => body.push_str(&format!("- `{path}`: {} (first release)\n", change.next)),
            }
        }
        body
    }
}

impl ReleaseManager for GithubReleaseManager<'_> {
    fn released_versions(&mut self) -> Result<ManifestSnapshot> {
        if let Some(snapshot) = &self.released {
            return Ok(snapshot.clone());
        }

        // A fresh repository has no manifest yet; that is an empty
        // released state, not an error.
        let snapshot = match self.github.file_content(MANIFEST_PATH, &self.target_branch)? {
            Some(text) => ManifestSnapshot::parse(&text)?,
            None => ManifestSnapshot::default(),
        };

        self.released = Some(snapshot.clone());
        Ok(snapshot)
    }

    fn pending_versions(&mut self) -> Result<Option<ManifestSnapshot>> {
        let branch = release_branch_for(&self.target_branch);
        match self.github.file_content(MANIFEST_PATH, &branch)? {
            Some(text) => Ok(Some(ManifestSnapshot::parse(&text)?)),
            None => Ok(None),
        }
    }

    fn tag_config(&self, path: &str) -> TagConfig {
        self.config.tag_config(path)
    }

    fn strategy(&self, path: &str) -> Option<Box<dyn Strategy + '_>> {
        self.config.packages.get(path).map(|package| {
            Box::new(
                ConfiguredStrategy::for_package(path, package)
                    .with_remote_descriptor(self.github, &self.target_branch),
            ) as Box<dyn Strategy + '_>
        })
    }

    fn create_releases(&mut self) -> Result<Vec<CreatedRelease>> {
        let released = self.released_versions()?;
        let mut created = Vec::new();

        for (path, version_str) in released.iter() {
            let version = parse_version(version_str)?;
            let Some(tag) = self.tag_for(path, &version)? else {
                continue;
            };

            if self.github.tag_sha(&tag)?.is_some() {
                continue;
            }

            let release = self.github.create_release(
                &tag,
                &self.target_branch,
                &tag,
                &format!("Release `{path}` {version}"),
                !version.pre.is_empty(),
            )?;
            created.push(CreatedRelease {
                path: path.to_string(),
                version: version.to_string(),
                tag,
                html_url: release.html_url,
            });
        }

        Ok(created)
    }

    fn create_pull_requests(&mut self) -> Result<Vec<PullRequest>> {
        let released = self.released_versions()?;
        let pending = self.compute_pending()?;
        if pending == released {
            return Ok(Vec::new());
        }

        let branch = release_branch_for(&self.target_branch);
        if self.github.branch_sha(&branch)?.is_none() {
            let base_sha = self
                .github
                .branch_sha(&self.target_branch)?
                .ok_or_else(|| {
                    WinchError::Release(format!("branch {} not found", self.target_branch))
                })?;
            self.github.create_branch(&branch, &base_sha)?;
        }

        let title = format!("chore: release {}", self.target_branch);
        let existing_sha = self.github.file_sha(MANIFEST_PATH, &branch)?;
        self.github.put_file(
            MANIFEST_PATH,
            &branch,
            &title,
            &pending.to_json()?,
            existing_sha.as_deref(),
        )?;

        let body = Self::pull_request_body(&released, &pending);
        let pull = match self.github.find_open_pull_request(&branch)? {
            Some(existing) => self.github.update_pull_request(existing.number, &title, &body)?,
            None => self
                .github
                .create_pull_request(&branch, &self.target_branch, &title, &body)?,
        };

        Ok(vec![pull])
    }
}
