use super::*;
use std::collections::BTreeMap;
use std::io::Write;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: BTreeMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

fn write_config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn defaults_target_local_ollama() {
    let config = ChainConfig::default();
    assert_eq!(config.backend, BackendKind::Ollama);
    assert_eq!(config.model, DEFAULT_MODEL);
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert!(config.strip_reasoning);
    assert!(config.retry.is_none());
    validate_config(&config).expect("defaults are valid");
}

#[test]
fn stub_round_trips_to_defaults() {
    let stub = config_stub().expect("stub");
    let parsed: ChainConfig = serde_json::from_str(&stub).expect("parse stub");
    assert_eq!(parsed, ChainConfig::default());
}

#[test]
fn partial_file_fills_in_defaults() {
    let file = write_config_file(r#"{"model": "llama3.2", "retry": {"max_attempts": 3}}"#);
    let config = load_config(file.path()).expect("load config");
    assert_eq!(config.model, "llama3.2");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    let retry = config.retry.expect("retry configured");
    assert_eq!(retry.max_attempts, 3);
    assert_eq!(retry.base_delay_ms, 500);
}

#[test]
fn unknown_fields_are_rejected() {
    let file = write_config_file(r#"{"modle": "typo"}"#);
    let err = load_config(file.path()).expect_err("unknown field");
    assert!(format!("{err:#}").contains("unknown field"), "{err:#}");
}

#[test]
fn environment_overrides_file_and_flags_override_environment() {
    let file = write_config_file(r#"{"model": "from-file", "timeout_secs": 10}"#);
    let env = env_from(&[
        (ENV_MODEL, "from-env"),
        (ENV_BASE_URL, "http://gpu-box:11434"),
        (ENV_TIMEOUT_SECS, "42"),
    ]);
    let overrides = ConfigOverrides {
        model: Some("from-flag".to_string()),
        base_url: None,
    };
    let config = resolve_config_with(Some(file.path()), &overrides, env).expect("resolve");
    assert_eq!(config.model, "from-flag");
    assert_eq!(config.base_url, "http://gpu-box:11434");
    assert_eq!(config.timeout_secs, 42);
}

#[test]
fn command_backend_from_environment() {
    let env = env_from(&[(ENV_BACKEND, "command"), (ENV_LM_COMMAND, "ollama run llama3.2")]);
    let config =
        resolve_config_with(None, &ConfigOverrides::default(), env).expect("resolve command");
    assert_eq!(config.backend, BackendKind::Command);
    assert_eq!(config.command.as_deref(), Some("ollama run llama3.2"));
}

#[test]
fn invalid_environment_values_are_errors() {
    let bad_backend = env_from(&[(ENV_BACKEND, "openai")]);
    assert!(resolve_config_with(None, &ConfigOverrides::default(), bad_backend).is_err());

    let bad_timeout = env_from(&[(ENV_TIMEOUT_SECS, "soon")]);
    assert!(resolve_config_with(None, &ConfigOverrides::default(), bad_timeout).is_err());
}

#[test]
fn validation_rejects_bad_values() {
    let cases: Vec<(&str, ChainConfig)> = vec![
        (
            "schema",
            ChainConfig {
                schema_version: 9,
                ..ChainConfig::default()
            },
        ),
        (
            "model",
            ChainConfig {
                model: "  ".to_string(),
                ..ChainConfig::default()
            },
        ),
        (
            "timeout",
            ChainConfig {
                timeout_secs: 0,
                ..ChainConfig::default()
            },
        ),
        (
            "temperature",
            ChainConfig {
                temperature: Some(3.5),
                ..ChainConfig::default()
            },
        ),
        (
            "base_url",
            ChainConfig {
                base_url: "localhost:11434".to_string(),
                ..ChainConfig::default()
            },
        ),
        (
            "command",
            ChainConfig {
                backend: BackendKind::Command,
                ..ChainConfig::default()
            },
        ),
        (
            "retry",
            ChainConfig {
                retry: Some(RetryConfig {
                    max_attempts: 0,
                    base_delay_ms: 1,
                    max_delay_ms: 1,
                }),
                ..ChainConfig::default()
            },
        ),
    ];
    for (label, config) in cases {
        assert!(validate_config(&config).is_err(), "{label} should be rejected");
    }
}
