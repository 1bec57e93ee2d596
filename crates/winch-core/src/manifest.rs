//! Release manifest snapshots and the pending/current diff.
//!
//! The manifest is a single JSON file at a fixed repository path mapping
//! tracked component paths to their last-released version string. Two
//! snapshots (released state on the target branch, pending state on the
//! release PR branch) are compared to find changed packages.

use crate::errors::{Result, WinchError};
use crate::types::ChangedPackage;
use std::collections::BTreeMap;

/// Fixed repository path of the released-versions manifest.
pub const MANIFEST_PATH: &str = ".release-please-manifest.json";

/// An immutable `path -> version string` mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestSnapshot {
    entries: BTreeMap<String, String>,
}

impl ManifestSnapshot {
    pub fn parse(json: &str) -> Result<Self> {
        let entries: BTreeMap<String, String> = serde_json::from_str(json)
            .map_err(|err| WinchError::InvalidData(format!("invalid manifest JSON: {err}")))?;
        Ok(Self { entries })
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set(&mut self, path: &str, version: &str) {
        self.entries.insert(path.to_string(), version.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Serialize back to the on-disk JSON shape (pretty, trailing newline).
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(&self.entries)
            .map_err(|err| WinchError::InvalidData(format!("manifest serialization: {err}")))?;
        out.push('\n');
        Ok(out)
    }
}

/// Compute the set of changed packages between the released manifest and
/// a pending one.
///
/// A path is reported iff it is present in `pending` and either absent
/// from `current` or carrying a different version string. Comparison is
/// literal string inequality, never semantic-version equality. Paths
/// present only in `current` are ignored.
pub fn diff(
    current: &ManifestSnapshot,
    pending: &ManifestSnapshot,
) -> BTreeMap<String, ChangedPackage> {
    let mut changed = BTreeMap::new();

    for (path, next) in pending.iter() {
        let current_version = current.get(path);
        if current_version != Some(next) {
            changed.insert(
                path.to_string(),
                ChangedPackage {
                    current: current_version.map(str::to_string),
                    next: next.to_string(),
                },
            );
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_serialize_round_trip() {
        let json = "{\n  \"actions/setup\": \"1.2.3\",\n  \"workflows/ci\": \"0.4.0\"\n}\n";
        let snapshot = ManifestSnapshot::parse(json).unwrap();
        assert_eq!(snapshot.get("actions/setup"), Some("1.2.3"));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.to_json().unwrap(), json);
    }

    #[test]
    fn parse_rejects_non_string_values() {
        assert!(ManifestSnapshot::parse("{\"a\": 1}").is_err());
        assert!(ManifestSnapshot::parse("not json").is_err());
    }

    #[test]
    fn diff_of_identical_manifests_is_empty() {
        let manifest = ManifestSnapshot::from_entries([("a", "1.0.0"), ("b", "2.0.0")]);
        assert!(diff(&manifest, &manifest).is_empty());
    }

    #[test]
    fn diff_reports_added_package_without_current_version() {
        let current = ManifestSnapshot::from_entries([("a", "1.0.0")]);
        let pending = ManifestSnapshot::from_entries([("a", "1.0.0"), ("b", "2.0.0")]);

        let changed = diff(&current, &pending);
        assert_eq!(changed.len(), 1);
        assert_eq!(
            changed["b"],
            ChangedPackage {
                current: None,
                next: "2.0.0".to_string(),
            }
        );
    }

    #[test]
    fn diff_reports_version_changes() {
        let current = ManifestSnapshot::from_entries([("a", "1.0.0")]);
        let pending = ManifestSnapshot::from_entries([("a", "1.1.0")]);

        let changed = diff(&current, &pending);
        assert_eq!(
            changed["a"],
            ChangedPackage {
                current: Some("1.0.0".to_string()),
                next: "1.1.0".to_string(),
            }
        );
    }

    #[test]
    fn diff_ignores_removed_packages() {
        let current = ManifestSnapshot::from_entries([("a", "1.0.0"), ("gone", "3.0.0")]);
        let pending = ManifestSnapshot::from_entries([("a", "1.0.0")]);
        assert!(diff(&current, &pending).is_empty());
    }

    #[test]
    fn diff_uses_literal_string_comparison() {
        // Equivalent versions with different formatting are still "changed".
        let current = ManifestSnapshot::from_entries([("a", "1.0.0+b.1")]);
        let pending = ManifestSnapshot::from_entries([("a", "1.0.0+b.01")]);
        assert_eq!(diff(&current, &pending).len(), 1);
    }
}
