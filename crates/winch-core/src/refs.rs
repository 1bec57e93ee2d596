//! Internal cross-reference scanning and rewriting.
//!
//! References between packages of the monorepo look like
//! `abinnovision/actions@{name}-{tag}`, optionally with the reusable
//! workflow sub-path before the `@`. During development every internal
//! reference must carry the `dev` marker tag; version pinning happens at
//! publish time by rewriting the markers in a staging directory.

use crate::errors::{Result, WinchError, io_error_with_path};
use glob::glob;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Namespace all internal references live under.
pub const ACTIONS_NAMESPACE: &str = "abinnovision/actions";

/// Tag suffix denoting "not yet published, resolve at publish time".
pub const DEV_TAG: &str = "dev";

/// Workspace directories holding publishable packages.
const PACKAGE_DIRS: &[&str] = &["actions", "workflows"];

/// A package descriptor (`package.json`) of one publishable unit.
#[derive(Debug, Clone, Deserialize)]
pub struct PackageDescriptor {
    pub name: String,
    pub version: String,
    #[serde(default, rename = "actionDependencies")]
    pub action_dependencies: BTreeMap<String, String>,
}

impl PackageDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| io_error_with_path(err, path))?;
        serde_json::from_str(&text)
            .map_err(|err| WinchError::InvalidData(format!("{}: {}", path.display(), err)))
    }
}

/// Matches both reference shapes:
/// `abinnovision/actions@{name}-{tag}` and
/// `abinnovision/actions/.github/workflows/workflow.yaml@{name}-{tag}`.
fn reference_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"abinnovision/actions(?:/\.github/workflows/workflow\.yaml)?@([a-z0-9-]+)-(\S+)",
        )
        .unwrap()
    })
}

/// A declared dependency range must be `X.Y.Z`, `^X.Y.Z` or `~X.Y.Z`.
pub fn range_is_valid(range: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN.get_or_init(|| Regex::new(r"^(\^|~)?\d+\.\d+\.\d+$").unwrap());
    re.is_match(range)
}

/// All package descriptors under the workspace directories, paired with
/// their descriptor paths.
fn package_descriptors(root: &Path) -> Result<Vec<(PathBuf, PackageDescriptor)>> {
    let mut packages = Vec::new();

    for dir in PACKAGE_DIRS {
        let base = root.join(dir);
        if !base.is_dir() {
            continue;
        }

        for entry in std::fs::read_dir(&base)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            let descriptor_path = entry.path().join("package.json");
            if descriptor_path.is_file() {
                let descriptor = PackageDescriptor::load(&descriptor_path)?;
                packages.push((descriptor_path, descriptor));
            }
        }
    }

    packages.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(packages)
}

/// Names of all internal packages.
fn discover_internal_packages(root: &Path) -> Result<FxHashSet<String>> {
    Ok(package_descriptors(root)?
        .into_iter()
        .map(|(_, descriptor)| descriptor.name)
        .collect())
}

/// Files subject to checking: each package's action/workflow definition
/// plus the repository's own CI workflows.
fn files_to_check(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for (dir, file_name) in [("actions", "action.yml"), ("workflows", "workflow.yaml")] {
        let base = root.join(dir);
        if !base.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(&base)? {
            let candidate = entry?.path().join(file_name);
            if candidate.is_file() {
                files.push(candidate);
            }
        }
    }

    let ci_dir = root.join(".github").join("workflows");
    if ci_dir.is_dir() {
        for entry in std::fs::read_dir(&ci_dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yml" || ext == "yaml");
            if path.is_file() && is_yaml {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Declared action dependencies of the package owning `file`, when the
/// file belongs to a publishable package directory. `None` for repository
/// CI workflows, which are not published.
fn action_dependencies_for(
    root: &Path,
    file: &Path,
) -> Result<Option<BTreeMap<String, String>>> {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut components = relative.components().filter_map(|c| c.as_os_str().to_str());

    let (Some(dir), Some(package)) = (components.next(), components.next()) else {
        return Ok(None);
    };
    if !PACKAGE_DIRS.contains(&dir) {
        return Ok(None);
    }

    let descriptor_path = root.join(dir).join(package).join("package.json");
    if !descriptor_path.is_file() {
        return Ok(None);
    }

    Ok(Some(
        PackageDescriptor::load(&descriptor_path)?.action_dependencies,
    ))
}

fn display_relative(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Result of a check-mode scan. All diagnostics are collected before
/// reporting; a single run surfaces every violation.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub files_checked: usize,
    pub errors: Vec<String>,
}

impl CheckReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check mode: every internal reference must use the `dev` marker, and
/// publishable packages must declare the internal actions they reference
/// with a well-formed version range.
pub fn check_refs(root: &Path) -> Result<CheckReport> {
    let packages = package_descriptors(root)?;
    let internal_names: FxHashSet<String> = packages
        .iter()
        .map(|(_, descriptor)| descriptor.name.clone())
        .collect();
    let files = files_to_check(root)?;
    let mut report = CheckReport {
        files_checked: files.len(),
        ..CheckReport::default()
    };

    // Every declared range is validated, referenced or not.
    for (descriptor_path, descriptor) in &packages {
        let relative = display_relative(root, descriptor_path);
        for (name, range) in &descriptor.action_dependencies {
            if !range_is_valid(range) {
                report.errors.push(format!(
                    "{relative}: actionDependencies['{name}'] has invalid range '{range}', expected '^X.Y.Z', '~X.Y.Z', or 'X.Y.Z'"
                ));
            }
        }
    }

    for file in &files {
        let content = std::fs::read_to_string(file).map_err(|err| io_error_with_path(err, file))?;
        let relative = display_relative(root, file);
        let dependencies = action_dependencies_for(root, file)?;

        for captures in reference_pattern().captures_iter(&content) {
            let name = &captures[1];
            let tag = &captures[2];

            // Only references to internal packages are validated.
            if !internal_names.contains(name) {
                continue;
            }

            if tag != DEV_TAG {
                report.errors.push(format!(
                    "{relative}: found pinned reference '@{name}-{tag}' (expected '@{name}-{DEV_TAG}')"
                ));
            }

            if let Some(declared) = &dependencies
                && tag == DEV_TAG
                && !declared.contains_key(name)
            {
                report.errors.push(format!(
                    "{relative}: references internal action '{name}' but it is not declared in actionDependencies"
                ));
            }
        }
    }

    Ok(report)
}

/// One declared dependency after workspace resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub name: String,
    pub version: String,
    pub used: bool,
}

/// Result of a resolve-mode run over a staging directory.
#[derive(Debug, Default)]
pub struct ResolveReport {
    pub package: String,
    pub replacements: usize,
    pub resolved: Vec<ResolvedDependency>,
    /// Development-marker references to internal packages that were not
    /// declared as dependencies. Fatal.
    pub errors: Vec<String>,
    /// Declared dependencies with zero matching references. Non-fatal.
    pub warnings: Vec<String>,
}

impl ResolveReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

fn find_package_in_workspace(workspace_root: &Path, name: &str) -> Result<PackageDescriptor> {
    for dir in PACKAGE_DIRS {
        let candidate = workspace_root.join(dir).join(name).join("package.json");
        if candidate.is_file() {
            return PackageDescriptor::load(&candidate);
        }
    }

    Err(WinchError::Refs(format!(
        "actionDependency '{name}' not found in workspace, checked actions/{name}/ and workflows/{name}/"
    )))
}

fn yaml_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for extension in ["yml", "yaml"] {
        let pattern = format!("{}/**/*.{extension}", dir.display());
        let entries = glob(&pattern)
            .map_err(|err| WinchError::Refs(format!("invalid glob pattern '{pattern}': {err}")))?;
        for entry in entries {
            files.push(
                entry.map_err(|err| WinchError::Refs(format!("failed to walk {dir:?}: {err}")))?,
            );
        }
    }

    files.sort();
    Ok(files)
}

/// Resolve mode: rewrite every development-marker reference to a declared
/// dependency in the staging directory to that dependency's concrete
/// version (`@{name}-dev` becomes `@{name}-v{version}`).
pub fn resolve_refs(staging_dir: &Path, workspace_root: &Path) -> Result<ResolveReport> {
    let descriptor_path = staging_dir.join("package.json");
    if !descriptor_path.is_file() {
        return Err(WinchError::Config(format!(
            "no package.json found in staging dir {}",
            staging_dir.display()
        )));
    }

    let descriptor = PackageDescriptor::load(&descriptor_path)?;
    let mut report = ResolveReport {
        package: descriptor.name.clone(),
        ..ResolveReport::default()
    };

    if descriptor.action_dependencies.is_empty() {
        return Ok(report);
    }

    let mut resolved = Vec::new();
    for name in descriptor.action_dependencies.keys() {
        let dependency = find_package_in_workspace(workspace_root, name)?;
        resolved.push(ResolvedDependency {
            name: name.clone(),
            version: dependency.version,
            used: false,
        });
    }

    let internal_names = discover_internal_packages(workspace_root)?;
    let declared_names: FxHashSet<String> =
        resolved.iter().map(|dep| dep.name.clone()).collect();

    for file in yaml_files_in(staging_dir)? {
        let content =
            std::fs::read_to_string(&file).map_err(|err| io_error_with_path(err, &file))?;
        let mut rewritten = content;
        let mut modified = false;

        for dependency in &mut resolved {
            let pattern = Regex::new(&format!(
                r"(abinnovision/actions(?:/\.github/workflows/workflow\.yaml)?)@{}-dev",
                regex::escape(&dependency.name)
            ))
            .map_err(|err| WinchError::Refs(format!("invalid reference pattern: {err}")))?;

            let matches = pattern.find_iter(&rewritten).count();
            if matches > 0 {
                let replacement = format!("${{1}}@{}-v{}", dependency.name, dependency.version);
                rewritten = pattern.replace_all(&rewritten, replacement.as_str()).into_owned();
                dependency.used = true;
                report.replacements += matches;
                modified = true;
            }
        }

        // Any remaining development marker pointing at an internal
        // package was not declared as a dependency.
        for captures in reference_pattern().captures_iter(&rewritten) {
            let name = &captures[1];
            let tag = &captures[2];
            if tag == DEV_TAG
                && internal_names.contains(name)
                && !declared_names.contains(name)
            {
                report.errors.push(format!(
                    "{}: references internal action '{name}' not declared in actionDependencies",
                    display_relative(staging_dir, &file)
                ));
            }
        }

        if modified {
            std::fs::write(&file, rewritten).map_err(|err| io_error_with_path(err, &file))?;
        }
    }

    for dependency in &resolved {
        if !dependency.used {
            report.warnings.push(format!(
                "actionDependency '{}' is declared but no matching -dev reference was found",
                dependency.name
            ));
        }
    }

    report.resolved = resolved;
    Ok(report)
}
