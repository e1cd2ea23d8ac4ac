use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// Execution context of a build target.
///
/// The context decides which platform the bundler targets and what happens
/// by default after a rebuild (see [`RebuildAction`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    Node,
    Web,
}

impl Context {
    /// Platform name substituted for `{platform}` in the bundler command.
    pub fn platform(self) -> &'static str {
        match self {
            Context::Node => "node",
            Context::Web => "browser",
        }
    }

    pub fn default_rebuild_action(self) -> RebuildAction {
        match self {
            Context::Node => RebuildAction::RestartRuntime,
            Context::Web => RebuildAction::None,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::Node
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Node => f.write_str("node"),
            Context::Web => f.write_str("web"),
        }
    }
}

/// Bundler optimisation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    Production,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Development
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

/// Side effect attached to a configuration, fired after each successful
/// rebuild in watch mode.
///
/// - `None`: nothing happens.
/// - `RestartRuntime`: restart the runtime launched from this configuration's
///   output (only when the configuration is both watched and run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildAction {
    None,
    RestartRuntime,
}

/// Parse a duration string like `"250ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
