//! GitHub Actions runtime helpers: event context, action inputs, the
//! `GITHUB_OUTPUT` file, and workflow-command logging.

use crate::errors::{Result, WinchError};
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;

/// The event context an action runs in, read from the runner environment.
#[derive(Debug, Clone)]
pub struct Context {
    /// Repository slug, `owner/repo`.
    pub repository: String,
    /// Sha of the commit the workflow runs against.
    pub sha: String,
    pub event_name: String,
    /// Raw webhook payload, `Value::Null` when no event file is present.
    pub payload: Value,
}

impl Context {
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let repository = env("GITHUB_REPOSITORY")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| WinchError::Config("GITHUB_REPOSITORY is not set".to_string()))?;
        let sha = env("GITHUB_SHA")
            .filter(|value| !value.is_empty())
            .ok_or_else(|| WinchError::Config("GITHUB_SHA is not set".to_string()))?;
        let event_name = env("GITHUB_EVENT_NAME").unwrap_or_default();

        let payload = match env("GITHUB_EVENT_PATH") {
            Some(path) if !path.is_empty() => {
                let text = std::fs::read_to_string(&path)?;
                serde_json::from_str(&text).map_err(|err| {
                    WinchError::Config(format!("invalid event payload at {path}: {err}"))
                })?
            }
            _ => Value::Null,
        };

        Ok(Self {
            repository,
            sha,
            event_name,
            payload,
        })
    }
}

/// Read an action input from the `INPUT_*` environment, the way the
/// runner passes them. Empty values count as absent.
pub fn input(name: &str) -> Option<String> {
    input_with_env(name, |key| std::env::var(key).ok())
}

pub fn input_with_env<F>(name: &str, env: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let key = format!(
        "INPUT_{}",
        name.to_ascii_uppercase().replace(['-', ' '], "_")
    );
    env(&key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Append a key/value pair to the `GITHUB_OUTPUT` file. A no-op outside
/// of an Actions runner.
pub fn set_output(key: &str, value: &str) -> Result<()> {
    set_output_with_env(key, value, |k| std::env::var_os(k))
}

pub fn set_output_with_env<F>(key: &str, value: &str, env_var_os: F) -> Result<()>
where
    F: Fn(&str) -> Option<std::ffi::OsString>,
{
    if let Some(path) = env_var_os("GITHUB_OUTPUT") {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}={}", key, value)?;
    }

    Ok(())
}

/// Escape payload data for single-line workflow commands.
fn escape_data(data: &str) -> String {
    data.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

pub fn info(message: &str) {
    println!("{message}");
}

pub fn debug(message: &str) {
    println!("::debug::{}", escape_data(message));
}

pub fn warning(message: &str) {
    println!("::warning::{}", escape_data(message));
}

pub fn error(message: &str) {
    println!("::error::{}", escape_data(message));
}

/// Log a fatal error. The caller is responsible for the exit code.
pub fn set_failed(message: &str) {
    error(message);
}

pub fn start_group(title: &str) {
    println!("::group::{}", escape_data(title));
}

pub fn end_group() {
    println!("::endgroup::");
}
