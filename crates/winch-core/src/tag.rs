//! Release tag construction and parsing.
//!
//! A tag is composed as `[component][separator]["v"]MAJOR.MINOR.PATCH[-pre][+build]`.
//! The format must match the tags the release manager itself creates, since the
//! prerelease composer re-derives tags that have to resolve to real refs in the
//! hosting system.

use crate::errors::{Result, WinchError};
use regex::Regex;
use semver::Version;

/// Parse a semantic version string, mapping failures to a winch error.
pub fn parse_version(value: &str) -> Result<Version> {
    Version::parse(value.trim())
        .map_err(|err| WinchError::InvalidData(format!("invalid version '{}': {}", value, err)))
}

/// A canonical release tag for one component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagName {
    pub version: Version,
    pub component: Option<String>,
    pub separator: String,
    pub include_v: bool,
}

impl TagName {
    pub fn new(
        version: Version,
        component: Option<&str>,
        separator: &str,
        include_v: bool,
    ) -> Self {
        Self {
            version,
            component: component.filter(|c| !c.is_empty()).map(str::to_string),
            separator: separator.to_string(),
            include_v,
        }
    }

    /// Parse a tag string back into its parts, using the given separator.
    ///
    /// Inverse of `to_string` for tags built from valid versions. The
    /// component is matched greedily, so components containing the
    /// separator round-trip correctly.
    pub fn parse(value: &str, separator: &str) -> Option<Self> {
        let pattern = format!(
            r"^(?:(?P<component>.+){})?(?P<v>v)?(?P<version>\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?(?:\+[0-9A-Za-z.-]+)?)$",
            regex::escape(separator)
        );
        let re = Regex::new(&pattern).ok()?;
        let caps = re.captures(value)?;

        let version = Version::parse(caps.name("version")?.as_str()).ok()?;
        Some(Self {
            version,
            component: caps.name("component").map(|m| m.as_str().to_string()),
            separator: separator.to_string(),
            include_v: caps.name("v").is_some(),
        })
    }
}

impl std::fmt::Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(component) = &self.component {
            write!(f, "{}{}", component, self.separator)?;
        }
        if self.include_v {
            f.write_str("v")?;
        }
        write!(f, "{}", self.version)
    }
}
