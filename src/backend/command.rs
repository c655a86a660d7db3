//! Adapter that pipes the prompt to a local model command.
//!
//! The command line is split with shell quoting rules, the prompt is written to
//! stdin and the completion is read from stdout. Any tool that reads text and
//! writes text works (`ollama run <model>`, `llm -m <model>`, a wrapper script).
use super::{clean_completion, ModelBackend};
use crate::error::BackendError;
use anyhow::{anyhow, Context, Result};
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const MAX_STDERR_CHARS: usize = 512;

pub struct CommandBackend {
    argv: Vec<String>,
    timeout: Duration,
    strip_reasoning: bool,
}

impl CommandBackend {
    pub fn new(command: &str, timeout: Duration, strip_reasoning: bool) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self {
            argv,
            timeout,
            strip_reasoning,
        })
    }

    fn program(&self) -> &str {
        &self.argv[0]
    }

    fn spawn(&self) -> Result<Child, BackendError> {
        Command::new(self.program())
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| BackendError::Unavailable {
                backend: self.describe(),
                reason: format!("spawn {}: {err}", self.program()),
            })
    }
}

impl ModelBackend for CommandBackend {
    fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        let start = Instant::now();
        let mut child = self.spawn()?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let writer = child
            .stdin
            .take()
            .map(|stdin| feed(stdin, prompt.as_bytes().to_vec()));

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => {
                    stop(&mut child);
                    return Err(BackendError::Unavailable {
                        backend: self.describe(),
                        reason: format!("wait for command: {err}"),
                    });
                }
            }
            if start.elapsed() > self.timeout {
                stop(&mut child);
                return Err(BackendError::Timeout {
                    backend: self.describe(),
                    after: self.timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        // A command that exits without reading its input closes the pipe;
        // the exit status reports that case.
        if let Some(Err(err)) = writer.and_then(|handle| handle.join().ok()) {
            if err.kind() != io::ErrorKind::BrokenPipe {
                return Err(BackendError::Unavailable {
                    backend: self.describe(),
                    reason: format!("write prompt to stdin: {err}"),
                });
            }
        }

        let stdout = collect(stdout);
        let stderr = collect(stderr);
        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = stdout.len(),
            "lm command complete"
        );

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(BackendError::CommandFailed {
                command: self.argv.join(" "),
                status: status.to_string(),
                stderr: stderr.trim().chars().take(MAX_STDERR_CHARS).collect(),
            });
        }

        let text = String::from_utf8(stdout).map_err(|err| BackendError::InvalidResponse {
            backend: self.describe(),
            reason: format!("stdout is not UTF-8: {err}"),
        })?;
        clean_completion(&self.describe(), &text, self.strip_reasoning)
    }

    fn describe(&self) -> String {
        format!("command:{}", self.program())
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

/// Write the prompt on its own thread so a child that never reads stdin cannot
/// block the timeout loop. Dropping the pipe afterwards signals end of input.
fn feed<W: Write + Send + 'static>(mut pipe: W, input: Vec<u8>) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || pipe.write_all(&input))
}

fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn backend(command: &str, timeout_ms: u64) -> CommandBackend {
        CommandBackend::new(command, Duration::from_millis(timeout_ms), true).expect("backend")
    }

    #[test]
    fn completion_is_read_from_stdout() {
        let text = backend("cat", 5_000)
            .generate("We are aware of the recall.\n")
            .expect("echo prompt");
        assert_eq!(text, "We are aware of the recall.");
    }

    #[test]
    fn quoted_arguments_are_preserved() {
        let text = backend(r#"sh -c 'cat >/dev/null; printf "%s" "two words"'"#, 5_000)
            .generate("ignored")
            .expect("completion");
        assert_eq!(text, "two words");
    }

    #[test]
    fn reasoning_is_stripped_from_command_output() {
        let text = backend(r#"sh -c 'cat >/dev/null; echo "<think>plan</think>Final."'"#, 5_000)
            .generate("p")
            .expect("completion");
        assert_eq!(text, "Final.");
    }

    #[test]
    fn missing_program_is_unavailable() {
        let err = backend("cchain-no-such-model-binary", 5_000)
            .generate("p")
            .expect_err("missing binary");
        assert!(matches!(err, BackendError::Unavailable { .. }), "{err}");
    }

    #[test]
    fn nonzero_exit_is_command_failure_with_stderr() {
        let err = backend(r#"sh -c 'echo "model not loaded" >&2; exit 3'"#, 5_000)
            .generate("p")
            .expect_err("exit 3");
        match err {
            BackendError::CommandFailed { stderr, .. } => {
                assert_eq!(stderr, "model not loaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn slow_command_times_out() {
        let start = Instant::now();
        let err = backend("sleep 5", 100).generate("p").expect_err("timeout");
        assert!(matches!(err, BackendError::Timeout { .. }), "{err}");
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn timeout_holds_when_command_ignores_large_prompt() {
        let start = Instant::now();
        let err = backend("sleep 5", 200)
            .generate(&"x".repeat(1 << 20))
            .expect_err("timeout");
        assert!(matches!(err, BackendError::Timeout { .. }), "{err}");
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn command_that_ignores_stdin_still_succeeds() {
        let text = backend(r#"sh -c 'echo "Statement issued."'"#, 5_000)
            .generate(&"x".repeat(1 << 20))
            .expect("completion");
        assert_eq!(text, "Statement issued.");
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandBackend::new("   ", Duration::from_secs(1), true).is_err());
        assert!(CommandBackend::new("'unterminated", Duration::from_secs(1), true).is_err());
    }
}
