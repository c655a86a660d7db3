//! Model invocation adapters.
//!
//! Every backend turns one rendered prompt into one completion and reports
//! failures through [`BackendError`]. Backends are built from an explicit
//! [`ChainConfig`]; nothing here reads global state.
mod command;
mod ollama;
mod retry;

pub use command::CommandBackend;
pub use ollama::OllamaBackend;
pub use retry::{RetryPolicy, RetryingBackend};

use crate::config::{BackendKind, ChainConfig};
use crate::error::BackendError;
use anyhow::{anyhow, Result};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Blocking prompt-to-text service.
pub trait ModelBackend {
    /// Send `prompt` and wait for the completion text.
    fn generate(&self, prompt: &str) -> Result<String, BackendError>;

    /// Short identifier used in logs and error messages.
    fn describe(&self) -> String;
}

/// Build the configured backend, wrapped in a retry policy when one is set.
pub fn from_config(config: &ChainConfig) -> Result<Box<dyn ModelBackend>> {
    let backend: Box<dyn ModelBackend> = match config.backend {
        BackendKind::Ollama => Box::new(OllamaBackend::new(config)),
        BackendKind::Command => {
            let command = config
                .command
                .as_deref()
                .ok_or_else(|| anyhow!("backend \"command\" requires a command line"))?;
            Box::new(CommandBackend::new(
                command,
                config.timeout(),
                config.strip_reasoning,
            )?)
        }
    };
    tracing::debug!(backend = %backend.describe(), "model backend ready");

    match &config.retry {
        Some(retry) => Ok(Box::new(RetryingBackend::new(
            backend,
            RetryPolicy::from_config(retry),
        ))),
        None => Ok(backend),
    }
}

/// Normalize raw completion text into the value stored in the bundle.
///
/// With `strip_reasoning`, closed `<think>...</think>` blocks are removed. An
/// empty result is an invalid response.
pub(crate) fn clean_completion(
    backend: &str,
    raw: &str,
    strip_reasoning: bool,
) -> Result<String, BackendError> {
    let text = if strip_reasoning {
        strip_reasoning_blocks(raw)
    } else {
        raw.to_string()
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(BackendError::InvalidResponse {
            backend: backend.to_string(),
            reason: "completion is empty".to_string(),
        });
    }
    Ok(text.to_string())
}

fn strip_reasoning_blocks(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(THINK_OPEN) {
        let after_open = &rest[start + THINK_OPEN.len()..];
        let Some(end) = after_open.find(THINK_CLOSE) else {
            break;
        };
        out.push_str(&rest[..start]);
        rest = &after_open[end + THINK_CLOSE.len()..];
    }
    out.push_str(rest);
    out
}
