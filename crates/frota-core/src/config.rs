use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use crate::alerts::AlertThresholds;
use crate::lifecycle::ClockSkewPolicy;
use crate::lock::{DEFAULT_LOCK_MAX_AGE_MINUTES, LockPolicy};

/// Directory holding the store and config, relative to the project root.
pub const FROTA_DIR: &str = ".frota";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub locks: LockConfig,
    #[serde(default)]
    pub alerts: AlertThresholds,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_abandon_after_minutes")]
    pub abandon_after_minutes: i64,
    /// How long a mutating call waits for another call on the same order.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            abandon_after_minutes: default_abandon_after_minutes(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl LockConfig {
    /// Edit-lock policy. Non-positive values fall back to the default age.
    #[must_use]
    pub fn policy(&self) -> LockPolicy {
        let minutes = if self.abandon_after_minutes > 0 {
            self.abandon_after_minutes
        } else {
            DEFAULT_LOCK_MAX_AGE_MINUTES
        };
        LockPolicy::new(chrono::Duration::minutes(minutes))
    }

    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default)]
    pub clock_skew_policy: ClockSkewPolicy,
}

/// Read `.frota/config.toml` under `project_root`. A missing file yields
/// defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(FROTA_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Config plus the output mode chosen for this invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub project: ProjectConfig,
    pub resolved_output: String,
}

/// Load the project config and resolve the output mode.
///
/// Precedence: `--json` flag, then `FROTA_FORMAT`, then `FORMAT`, then the
/// config file's `output`, then pretty on a TTY and text otherwise.
///
/// # Errors
///
/// Propagates config read/parse failures.
pub fn resolve_config(project_root: &Path, cli_json: bool) -> Result<EffectiveConfig> {
    let project = load_project_config(project_root)?;
    let env_format = env::var("FROTA_FORMAT").or_else(|_| env::var("FORMAT")).ok();
    let resolved_output = resolve_output(cli_json, project.output.as_deref(), env_format.as_deref());

    Ok(EffectiveConfig {
        project,
        resolved_output,
    })
}

fn normalize_output_mode(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "human" => Some("pretty"),
        "text" | "plain" => Some("text"),
        "json" => Some("json"),
        _ => None,
    }
}

fn resolve_output(cli_json: bool, file_output: Option<&str>, env_format: Option<&str>) -> String {
    if cli_json {
        return "json".to_string();
    }

    let chosen = env_format
        .and_then(normalize_output_mode)
        .or_else(|| file_output.and_then(normalize_output_mode));
    if let Some(mode) = chosen {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

const fn default_abandon_after_minutes() -> i64 {
    DEFAULT_LOCK_MAX_AGE_MINUTES
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}
