//! Backend configuration.
//!
//! Configuration is resolved once per invocation (defaults, then an optional
//! JSON file, then environment, then CLI flags) and handed explicitly to the
//! backend constructors.
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_MODEL: &str = "deepseek-r1:1.5b";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const ENV_BACKEND: &str = "CCHAIN_BACKEND";
pub const ENV_MODEL: &str = "CCHAIN_MODEL";
pub const ENV_BASE_URL: &str = "CCHAIN_BASE_URL";
pub const ENV_LM_COMMAND: &str = "CCHAIN_LM_COMMAND";
pub const ENV_TIMEOUT_SECS: &str = "CCHAIN_TIMEOUT_SECS";

/// Which adapter serves completions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Ollama-compatible HTTP endpoint.
    #[default]
    Ollama,
    /// Local command reading the prompt on stdin.
    Command,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "ollama" => Ok(Self::Ollama),
            "command" => Ok(Self::Command),
            other => Err(anyhow!(
                "backend must be \"ollama\" or \"command\" (got {other:?})"
            )),
        }
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts including the first.
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

/// Everything a backend needs to serve completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    pub schema_version: u32,
    pub backend: BackendKind,
    /// Model identifier passed to the backend.
    pub model: String,
    pub base_url: String,
    /// Command line for the `command` backend (split with shell quoting rules).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Remove `<think>` blocks emitted by reasoning models.
    pub strip_reasoning: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            backend: BackendKind::Ollama,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            command: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: None,
            strip_reasoning: true,
            retry: None,
        }
    }
}

impl ChainConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Values supplied on the command line; they win over file and environment.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Render a pretty JSON config with every default filled in.
pub fn config_stub() -> Result<String> {
    serde_json::to_string_pretty(&ChainConfig::default()).context("serialize config stub")
}

/// Load a config file; omitted fields take their defaults.
pub fn load_config(path: &Path) -> Result<ChainConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: ChainConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse config JSON {}", path.display()))?;
    Ok(config)
}

/// Apply environment overrides through `lookup` so tests can supply their own.
pub fn apply_env_overrides<F>(config: &mut ChainConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(ENV_BACKEND) {
        config.backend = raw.parse().with_context(|| format!("parse {ENV_BACKEND}"))?;
    }
    if let Some(model) = lookup(ENV_MODEL) {
        config.model = model;
    }
    if let Some(base_url) = lookup(ENV_BASE_URL) {
        config.base_url = base_url;
    }
    if let Some(command) = lookup(ENV_LM_COMMAND) {
        config.command = Some(command);
    }
    if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
        config.timeout_secs = raw
            .trim()
            .parse()
            .with_context(|| format!("parse {ENV_TIMEOUT_SECS} as seconds (got {raw:?})"))?;
    }
    Ok(())
}

fn apply_overrides(config: &mut ChainConfig, overrides: &ConfigOverrides) {
    if let Some(model) = &overrides.model {
        config.model = model.clone();
    }
    if let Some(base_url) = &overrides.base_url {
        config.base_url = base_url.clone();
    }
}

/// Check the resolved config before any backend is built.
pub fn validate_config(config: &ChainConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    if config.model.trim().is_empty() {
        return Err(anyhow!("model must be non-empty"));
    }
    if config.timeout_secs == 0 {
        return Err(anyhow!("timeout_secs must be greater than zero"));
    }
    if let Some(temperature) = config.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            return Err(anyhow!(
                "temperature must be between 0 and 2 (got {temperature})"
            ));
        }
    }
    match config.backend {
        BackendKind::Ollama => {
            let url = config.base_url.trim();
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!(
                    "base_url must start with http:// or https:// (got {:?})",
                    config.base_url
                ));
            }
        }
        BackendKind::Command => {
            let command = config.command.as_deref().unwrap_or_default();
            if command.trim().is_empty() {
                return Err(anyhow!(
                    "backend \"command\" requires `command` or {ENV_LM_COMMAND}"
                ));
            }
        }
    }
    if let Some(retry) = &config.retry {
        if retry.max_attempts == 0 {
            return Err(anyhow!("retry.max_attempts must be at least 1"));
        }
    }
    Ok(())
}

/// Resolve defaults, optional file, process environment, then CLI overrides.
pub fn resolve_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<ChainConfig> {
    resolve_config_with(path, overrides, |key| env::var(key).ok())
}

fn resolve_config_with<F>(
    path: Option<&Path>,
    overrides: &ConfigOverrides,
    lookup: F,
) -> Result<ChainConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ChainConfig::default(),
    };
    apply_env_overrides(&mut config, lookup)?;
    apply_overrides(&mut config, overrides);
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
