use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// `host:port` of the runtime API.
pub const RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";
/// Directory the handler is resolved against.
pub const TASK_ROOT_VAR: &str = "LAMBDA_TASK_ROOT";
/// Handler reference, `<module>::<entry>`.
pub const HANDLER_VAR: &str = "_HANDLER";
/// Optional path to a YAML file with [`Settings`].
pub const SETTINGS_VAR: &str = "BOOTSTRAP_CONFIG";

/// Limits applied to every HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Receive buffer ceiling while the header block is still incomplete.
    pub max_header_bytes: usize,
    /// Bytes requested per socket read.
    pub read_chunk_size: usize,
    /// Readiness events drained per multiplexer wait.
    pub events_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            read_chunk_size: 1024,
            events_capacity: 128,
        }
    }
}

/// Pause applied between consecutive failed polls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    pub initial_ms: u64,
    pub max_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_ms: 100,
            max_ms: 5_000,
        }
    }
}

impl BackoffSettings {
    /// Delay before the poll following `failures` consecutive failures.
    ///
    /// Doubles from `initial_ms` and never exceeds `max_ms`.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u64.checked_shl(failures - 1).unwrap_or(u64::MAX);
        let ms = self.initial_ms.saturating_mul(factor).min(self.max_ms);
        Duration::from_millis(ms)
    }
}

/// Tunables read from the optional YAML settings file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub client: ClientSettings,
    pub poll_backoff: BackoffSettings,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            poll_backoff: BackoffSettings::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(text).context("Invalid settings YAML")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_yaml(&text)
    }
}

/// Process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub runtime_api: String,
    pub task_root: PathBuf,
    /// Missing here is not a configuration error: it surfaces as an init
    /// failure that gets reported to the runtime API.
    pub handler: Option<String>,
    pub settings: Settings,
}

impl Config {
    /// Reads the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let runtime_api = lookup(RUNTIME_API_VAR)
            .filter(|v| !v.trim().is_empty())
            .with_context(|| format!("{RUNTIME_API_VAR} is not set"))?;
        let task_root = lookup(TASK_ROOT_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let handler = lookup(HANDLER_VAR).filter(|v| !v.trim().is_empty());
        let settings = match lookup(SETTINGS_VAR) {
            Some(path) => Settings::load(Path::new(&path))?,
            None => Settings::default(),
        };

        Ok(Self {
            runtime_api: runtime_api.trim().to_string(),
            task_root,
            handler,
            settings,
        })
    }
}
