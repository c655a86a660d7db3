//! Shared test infrastructure for integration tests.

use std::env;
use std::path::PathBuf;
use std::process::{Command, Output};

const CCHAIN_ENV: &[&str] = &[
    "CCHAIN_BACKEND",
    "CCHAIN_MODEL",
    "CCHAIN_BASE_URL",
    "CCHAIN_LM_COMMAND",
    "CCHAIN_TIMEOUT_SECS",
    "RUST_LOG",
];

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// `cchain` with no inherited configuration from the developer's shell.
pub fn cchain() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_cchain"));
    for key in CCHAIN_ENV {
        command.env_remove(key);
    }
    command
}

/// `cchain` wired to the scripted model in `tests/mock-lm.sh`.
pub fn cchain_with_mock_lm() -> Command {
    let script = manifest_dir().join("tests/mock-lm.sh");
    let lm_command = format!(
        "sh {}",
        shell_words::quote(&script.display().to_string())
    );
    let mut command = cchain();
    command
        .env("CCHAIN_BACKEND", "command")
        .env("CCHAIN_LM_COMMAND", lm_command);
    command
}

/// Run and return output, panicking only if the process could not start.
pub fn run(command: &mut Command) -> Output {
    command.output().expect("spawn cchain")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
