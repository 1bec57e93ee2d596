use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The all-zero sha GitHub uses in push payloads when there is no prior
/// state (branch creation, force-push to a new ref).
pub const GIT_EMPTY_SHA: &str = "0000000000000000000000000000000000000000";

/// Whether a computed version refers to a stable release or a prerelease
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Release,
    Prerelease,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Prerelease => "prerelease",
        }
    }
}

impl std::fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A computed version for one tracked path. Immutable once created;
/// the collected `path -> VersionEntry` mapping is the release action's
/// sole machine-readable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
    /// Registry-safe tag form of `version` (no `+` characters).
    pub tag: String,
    #[serde(rename = "type")]
    pub release_type: ReleaseType,
}

/// Ordered mapping from tracked path to its computed version entry.
pub type VersionsMap = BTreeMap<String, VersionEntry>;

/// A package whose pending version differs from its released version.
/// Derived from a manifest diff; lives only within one diff pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPackage {
    /// Last released version, absent when the package is new to the manifest.
    pub current: Option<String>,
    pub next: String,
}

/// A range of commits to inspect. `from` is absent when the triggering
/// event has no meaningful prior point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRange {
    pub from: Option<String>,
    pub to: String,
}

/// A single commit as fetched from the hosting API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
}

impl CommitInfo {
    /// First 7 hex characters of the sha, for display.
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(7)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_entry_serializes_type_field() {
        let entry = VersionEntry {
            version: "2.0.0-alpha.5+abc1234".to_string(),
            tag: "2.0.0-alpha.5-abc1234".to_string(),
            release_type: ReleaseType::Prerelease,
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"type\":\"prerelease\""));

        let back: VersionEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn versions_map_output_is_ordered_by_path() {
        let mut versions = VersionsMap::new();
        versions.insert(
            "workflows/b".to_string(),
            VersionEntry {
                version: "1.0.0".to_string(),
                tag: "1.0.0".to_string(),
                release_type: ReleaseType::Release,
            },
        );
        versions.insert(
            "actions/a".to_string(),
            VersionEntry {
                version: "2.0.0".to_string(),
                tag: "2.0.0".to_string(),
                release_type: ReleaseType::Release,
            },
        );

        let json = serde_json::to_string(&versions).unwrap();
        let a = json.find("actions/a").unwrap();
        let b = json.find("workflows/b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn short_sha_truncates_to_seven() {
        let commit = CommitInfo {
            sha: "abc1234def5678".to_string(),
            message: "feat: thing".to_string(),
        };
        assert_eq!(commit.short_sha(), "abc1234");
    }
}
