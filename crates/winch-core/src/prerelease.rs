//! Prerelease version composition for changed packages.
//!
//! Each package whose pending version differs from its released version
//! gets a deterministic prerelease of the form
//! `{next}-{channel}.{count}+{short_sha}`: the pending version, the
//! channel name, the number of commits since the last release, and the
//! short sha of the current head. The registry-safe tag form replaces
//! the `+` build separator with `-`.

use crate::errors::Result;
use crate::gha;
use crate::history::CommitHistorySource;
use crate::manifest::ManifestSnapshot;
use crate::release::ReleaseManager;
use crate::tag::{TagName, parse_version};
use crate::types::{ChangedPackage, ReleaseType, VersionEntry, VersionsMap};
use std::collections::BTreeMap;

/// Turn the released manifest into stable version entries. Stable tags
/// equal the bare version string.
pub fn stable_versions(manifest: &ManifestSnapshot) -> VersionsMap {
    manifest
        .iter()
        .map(|(path, version)| {
            (
                path.to_string(),
                VersionEntry {
                    version: version.to_string(),
                    tag: version.to_string(),
                    release_type: ReleaseType::Release,
                },
            )
        })
        .collect()
}

/// Compose a prerelease entry for every changed package and insert it
/// into `versions`. Paths already present keep their stable entry;
/// paths without a configured strategy are skipped with a warning.
pub fn compose_prereleases(
    changed: &BTreeMap<String, ChangedPackage>,
    manager: &dyn ReleaseManager,
    history: &mut dyn CommitHistorySource,
    channel: &str,
    head_sha: &str,
    versions: &mut VersionsMap,
) -> Result<()> {
    let short_sha = &head_sha[..head_sha.len().min(7)];

    for (path, change) in changed {
        if versions.contains_key(path) {
            gha::info(&format!("{path}: already released, skipping prerelease"));
            continue;
        }

        let Some(strategy) = manager.strategy(path) else {
            gha::warning(&format!(
                "{path}: changed but not part of the release configuration, skipping"
            ));
            continue;
        };
        let component = strategy.component_name()?;
        let tag_config = manager.tag_config(path);

        let count = match &change.current {
            Some(current) => {
                let since_tag = TagName::new(
                    parse_version(current)?,
                    component.as_deref(),
                    &tag_config.separator,
                    tag_config.include_v,
                )
                .to_string();
                history.count_commits(&since_tag, head_sha)?
            }
            // New package: count the whole history up to head.
            None => history.count_all(head_sha)?,
        };

        let next = parse_version(&change.next)?;
        let version = format!("{next}-{channel}.{count}+{short_sha}");
        let tag = version.replace('+', "-");

        versions.insert(
            path.to_string(),
            VersionEntry {
                version,
                tag,
                release_type: ReleaseType::Prerelease,
            },
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Result, WinchError};
    use crate::github::PullRequest;
    use crate::release::{CreatedRelease, Strategy, TagConfig};
    use std::cell::RefCell;

    struct FixedStrategy(Option<String>);

    impl Strategy for FixedStrategy {
        fn component_name(&self) -> Result<Option<String>> {
            Ok(self.0.clone())
        }
    }

    /// Manager stub: every path except "unconfigured" releases under a
    /// component equal to the path's last segment.
    struct StubManager;

    impl ReleaseManager for StubManager {
        fn released_versions(&mut self) -> Result<ManifestSnapshot> {
            Ok(ManifestSnapshot::default())
        }

        fn pending_versions(&mut self) -> Result<Option<ManifestSnapshot>> {
            Ok(None)
        }

        fn tag_config(&self, _path: &str) -> TagConfig {
            TagConfig::default()
        }

        fn strategy(&self, path: &str) -> Option<Box<dyn Strategy + '_>> {
            if path == "unconfigured" {
                return None;
            }
            let component = path.rsplit('/').next().map(str::to_string);
            Some(Box::new(FixedStrategy(component)))
        }

        fn create_releases(&mut self) -> Result<Vec<CreatedRelease>> {
            Ok(Vec::new())
        }

        fn create_pull_requests(&mut self) -> Result<Vec<PullRequest>> {
            Ok(Vec::new())
        }
    }

    /// History stub recording the references it was asked about.
    struct StubHistory {
        count: u64,
        total: u64,
        since_refs: RefCell<Vec<String>>,
    }

    impl StubHistory {
        fn new(count: u64, total: u64) -> Self {
            Self {
                count,
                total,
                since_refs: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommitHistorySource for StubHistory {
        fn count_commits(&mut self, since_ref: &str, _until_ref: &str) -> Result<u64> {
            self.since_refs.borrow_mut().push(since_ref.to_string());
            Ok(self.count)
        }

        fn count_all(&mut self, _until_ref: &str) -> Result<u64> {
            Ok(self.total)
        }
    }

    fn changed(path: &str, current: Option<&str>, next: &str) -> BTreeMap<String, ChangedPackage> {
        BTreeMap::from([(
            path.to_string(),
            ChangedPackage {
                current: current.map(str::to_string),
                next: next.to_string(),
            },
        )])
    }

    #[test]
    fn composes_version_tag_and_type_for_changed_package() {
        let mut versions = VersionsMap::new();
        let mut history = StubHistory::new(5, 0);

        compose_prereleases(
            &changed("actions/setup", Some("1.0.0"), "1.1.0"),
            &StubManager,
            &mut history,
            "alpha",
            "deadbeef0123456789",
            &mut versions,
        )
        .unwrap();

        let entry = &versions["actions/setup"];
        assert_eq!(entry.version, "1.1.0-alpha.5+deadbee");
        assert_eq!(entry.tag, "1.1.0-alpha.5-deadbee");
        assert_eq!(entry.release_type, ReleaseType::Prerelease);
        // Counted since the tag of the released version.
        assert_eq!(history.since_refs.borrow().as_slice(), ["setup-v1.0.0"]);
    }

    #[test]
    fn new_package_counts_the_whole_history() {
        let mut versions = VersionsMap::new();
        let mut history = StubHistory::new(0, 12);

        compose_prereleases(
            &changed("actions/fresh", None, "0.1.0"),
            &StubManager,
            &mut history,
            "alpha",
            "abc1234def",
            &mut versions,
        )
        .unwrap();

        assert_eq!(versions["actions/fresh"].version, "0.1.0-alpha.12+abc1234");
        assert!(history.since_refs.borrow().is_empty());
    }

    #[test]
    fn existing_stable_entry_is_kept() {
        let mut versions = VersionsMap::from([(
            "actions/setup".to_string(),
            VersionEntry {
                version: "1.1.0".to_string(),
                tag: "1.1.0".to_string(),
                release_type: ReleaseType::Release,
            },
        )]);
        let mut history = StubHistory::new(5, 0);

        compose_prereleases(
            &changed("actions/setup", Some("1.0.0"), "1.1.0"),
            &StubManager,
            &mut history,
            "alpha",
            "deadbeef",
            &mut versions,
        )
        .unwrap();

        assert_eq!(versions["actions/setup"].release_type, ReleaseType::Release);
        assert!(history.since_refs.borrow().is_empty());
    }

    #[test]
    fn unconfigured_path_is_skipped() {
        let mut versions = VersionsMap::new();
        let mut history = StubHistory::new(5, 0);

        compose_prereleases(
            &changed("unconfigured", Some("1.0.0"), "1.1.0"),
            &StubManager,
            &mut history,
            "alpha",
            "deadbeef",
            &mut versions,
        )
        .unwrap();

        assert!(versions.is_empty());
    }

    #[test]
    fn invalid_pending_version_is_an_error() {
        let mut versions = VersionsMap::new();
        let mut history = StubHistory::new(5, 0);

        let err = compose_prereleases(
            &changed("actions/setup", Some("1.0.0"), "not-semver"),
            &StubManager,
            &mut history,
            "alpha",
            "deadbeef",
            &mut versions,
        )
        .unwrap_err();

        assert!(matches!(err, WinchError::InvalidData(_)));
    }

    #[test]
    fn stable_versions_use_bare_version_as_tag() {
        let manifest =
            ManifestSnapshot::from_entries([("actions/a", "1.2.3"), ("workflows/b", "0.4.0")]);

        let versions = stable_versions(&manifest);
        assert_eq!(versions.len(), 2);
        assert_eq!(versions["actions/a"].version, "1.2.3");
        assert_eq!(versions["actions/a"].tag, "1.2.3");
        assert_eq!(versions["actions/a"].release_type, ReleaseType::Release);
    }
}
