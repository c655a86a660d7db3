//! HTTP adapter for an Ollama-compatible `/api/generate` endpoint.
//!
//! One blocking request per prompt with `stream: false`. The agent's global
//! timeout bounds the whole exchange.
use super::{clean_completion, ModelBackend};
use crate::config::ChainConfig;
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::Duration;

const BACKEND_NAME: &str = "ollama";
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Blocking client for a single model on an Ollama server.
pub struct OllamaBackend {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    timeout: Duration,
    strip_reasoning: bool,
}

/// Result of probing the server's model list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub model_count: usize,
    pub model_available: bool,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl OllamaBackend {
    pub fn new(config: &ChainConfig) -> Self {
        let timeout = config.timeout();
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
            strip_reasoning: config.strip_reasoning,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// List the server's models and report whether the configured one is present.
    pub fn probe(&self) -> Result<ProbeReport, BackendError> {
        let mut response = self
            .agent
            .get(&self.endpoint("/api/tags"))
            .call()
            .map_err(|err| self.transport_error(err))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(self.status_error(status, &body));
        }
        let tags: TagsResponse =
            response
                .body_mut()
                .read_json()
                .map_err(|err| BackendError::InvalidResponse {
                    backend: self.describe(),
                    reason: format!("decode model list: {err}"),
                })?;
        Ok(ProbeReport {
            model_count: tags.models.len(),
            model_available: tags
                .models
                .iter()
                .any(|entry| model_matches(&entry.name, &self.model)),
        })
    }

    fn transport_error(&self, err: ureq::Error) -> BackendError {
        classify_transport_error(err, &self.describe(), self.timeout)
    }

    fn status_error(&self, status: u16, body: &str) -> BackendError {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|parsed| parsed.error)
            .unwrap_or_else(|_| truncate_chars(body.trim(), MAX_ERROR_BODY_CHARS));
        if status == 502 || status == 503 {
            return BackendError::Unavailable {
                backend: self.describe(),
                reason: format!("status {status}: {message}"),
            };
        }
        BackendError::Rejected {
            backend: self.describe(),
            status,
            message,
        }
    }
}

impl ModelBackend for OllamaBackend {
    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: self
                .temperature
                .map(|temperature| GenerateOptions { temperature }),
        };
        let mut response = self
            .agent
            .post(&self.endpoint("/api/generate"))
            .send_json(&request)
            .map_err(|err| self.transport_error(err))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.body_mut().read_to_string().unwrap_or_default();
            return Err(self.status_error(status, &body));
        }

        let body: GenerateResponse = response.body_mut().read_json().map_err(|err| match err {
            ureq::Error::Json(err) => BackendError::InvalidResponse {
                backend: self.describe(),
                reason: format!("decode completion: {err}"),
            },
            other => self.transport_error(other),
        })?;
        clean_completion(&self.describe(), &body.response, self.strip_reasoning)
    }

    fn describe(&self) -> String {
        format!("{BACKEND_NAME}:{} at {}", self.model, self.base_url)
    }
}

/// Map a transport failure onto the backend error taxonomy.
fn classify_transport_error(err: ureq::Error, backend: &str, timeout: Duration) -> BackendError {
    match err {
        ureq::Error::Timeout(_) => BackendError::Timeout {
            backend: backend.to_string(),
            after: timeout,
        },
        ureq::Error::Io(io_err) if io_err.kind() == io::ErrorKind::TimedOut => {
            BackendError::Timeout {
                backend: backend.to_string(),
                after: timeout,
            }
        }
        ureq::Error::Io(io_err) => BackendError::Unavailable {
            backend: backend.to_string(),
            reason: io_err.to_string(),
        },
        ureq::Error::HostNotFound | ureq::Error::ConnectionFailed => BackendError::Unavailable {
            backend: backend.to_string(),
            reason: err.to_string(),
        },
        other => BackendError::InvalidResponse {
            backend: backend.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Ollama reports `name:tag`; a bare configured name means `:latest`.
fn model_matches(listed: &str, configured: &str) -> bool {
    if listed == configured {
        return true;
    }
    !configured.contains(':') && listed == format!("{configured}:latest")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_for(url: &str) -> OllamaBackend {
        let config = ChainConfig {
            base_url: url.to_string(),
            model: "deepseek-r1:1.5b".to_string(),
            timeout_secs: 5,
            ..ChainConfig::default()
        };
        OllamaBackend::new(&config)
    }

    #[test]
    fn generate_posts_prompt_and_returns_cleaned_completion() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "deepseek-r1:1.5b",
                "prompt": "Draft a statement",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"deepseek-r1:1.5b","response":"<think>hmm</think>\nWe hear you.","done":true}"#)
            .create();

        let backend = backend_for(&server.url());
        let text = backend.generate("Draft a statement").expect("completion");
        assert_eq!(text, "We hear you.");
        mock.assert();
    }

    #[test]
    fn temperature_is_sent_as_option() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "options": {"temperature": 0.5}
            })))
            .with_status(200)
            .with_body(r#"{"response":"ok"}"#)
            .create();

        let config = ChainConfig {
            base_url: server.url(),
            temperature: Some(0.5),
            ..ChainConfig::default()
        };
        let text = OllamaBackend::new(&config).generate("p").expect("completion");
        assert_eq!(text, "ok");
        mock.assert();
    }

    #[test]
    fn unknown_model_is_rejected_with_server_message() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'deepseek-r1:1.5b' not found"}"#)
            .create();

        let err = backend_for(&server.url())
            .generate("p")
            .expect_err("404 must fail");
        match err {
            BackendError::Rejected {
                status, message, ..
            } => {
                assert_eq!(status, 404);
                assert!(message.contains("not found"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn service_unavailable_status_is_unavailable() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/api/generate")
            .with_status(503)
            .with_body("loading model")
            .create();

        let err = backend_for(&server.url()).generate("p").expect_err("503");
        assert!(matches!(err, BackendError::Unavailable { .. }), "{err}");
    }

    #[test]
    fn malformed_body_is_invalid_response() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(r#"{"unexpected": true}"#)
            .create();

        let err = backend_for(&server.url()).generate("p").expect_err("bad body");
        assert!(matches!(err, BackendError::InvalidResponse { .. }), "{err}");
    }

    #[test]
    fn refused_connection_is_unavailable() {
        let err = backend_for("http://127.0.0.1:1")
            .generate("p")
            .expect_err("nothing listens on port 1");
        assert!(matches!(err, BackendError::Unavailable { .. }), "{err}");
    }

    #[test]
    fn timed_out_io_is_timeout() {
        let err = classify_transport_error(
            ureq::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow")),
            "ollama",
            Duration::from_secs(7),
        );
        match err {
            BackendError::Timeout { after, .. } => assert_eq!(after, Duration::from_secs(7)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn probe_reports_model_presence() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models":[{"name":"llama3.2:latest"},{"name":"deepseek-r1:1.5b"}]}"#)
            .create();

        let report = backend_for(&server.url()).probe().expect("probe");
        assert_eq!(
            report,
            ProbeReport {
                model_count: 2,
                model_available: true,
            }
        );
    }

    #[test]
    fn bare_model_name_matches_latest_tag() {
        assert!(model_matches("llama3.2:latest", "llama3.2"));
        assert!(!model_matches("llama3.2:1b", "llama3.2"));
        assert!(!model_matches("llama3.2:latest", "llama3.2:1b"));
    }
}
