//! Shared integration-test harness for spawning `biocalm` as a child
//! process and driving it over stdin/stdout.

#![allow(dead_code)]

use std::io::Write;
use std::process::Output;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Default timeout for a single view event.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A running `biocalm run` process with helpers for console I/O.
///
/// The child process is killed on drop via `kill_on_drop(true)`.
pub struct BiocalmProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    reader: BufReader<ChildStdout>,
    seen: Vec<Value>,
}

impl BiocalmProcess {
    /// Starts `biocalm run` against the demo service with `extra` arguments.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_run(extra: &[&str]) -> Self {
        let bin = env!("CARGO_BIN_EXE_biocalm");
        let mut child = Command::new(bin)
            .args(["--quiet", "run", "--link", "demo", "--seed", "5"])
            .args(extra)
            .env_remove("BIOCALM_CONFIG")
            .env_remove("BIOCALM_EVENTS")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .expect("failed to spawn biocalm");

        let stdin = child.stdin.take().expect("stdin not captured");
        let stdout = child.stdout.take().expect("stdout not captured");
        Self {
            child,
            stdin: Some(stdin),
            reader: BufReader::new(stdout),
            seen: Vec::new(),
        }
    }

    /// Types one console line.
    #[allow(clippy::missing_panics_doc)]
    pub async fn send(&mut self, line: &str) {
        let stdin = self.stdin.as_mut().expect("stdin already closed");
        stdin
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("failed to write to stdin");
        stdin.flush().await.expect("failed to flush stdin");
    }

    /// Reads one JSON event line.
    ///
    /// Panics on EOF, invalid JSON, or if nothing arrives within `timeout`.
    #[allow(clippy::missing_panics_doc)]
    pub async fn read_event(&mut self, timeout: Duration) -> Value {
        let mut line = String::new();
        let result = tokio::time::timeout(timeout, async {
            loop {
                line.clear();
                let n = self
                    .reader
                    .read_line(&mut line)
                    .await
                    .expect("read_line I/O error");
                assert!(n > 0, "unexpected EOF from biocalm");
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    return serde_json::from_str::<Value>(trimmed)
                        .unwrap_or_else(|e| panic!("invalid JSON event: {e}\nline: {line}"));
                }
            }
        })
        .await;
        let event = result.expect("timed out waiting for an event");
        self.seen.push(event.clone());
        event
    }

    /// Reads events until one satisfies `pred`, and returns it.
    #[allow(clippy::missing_panics_doc)]
    pub async fn wait_for(&mut self, timeout: Duration, pred: impl Fn(&Value) -> bool) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            assert!(!left.is_zero(), "condition not met; events: {:#?}", self.seen);
            let event = self.read_event(left).await;
            if pred(&event) {
                return event;
            }
        }
    }

    /// Waits for `phase_entered` with the given phase name.
    pub async fn wait_for_phase(&mut self, phase: &str) -> Value {
        let phase = phase.to_string();
        self.wait_for(DEFAULT_TIMEOUT, move |e| {
            e["type"] == "PhaseEntered" && e["phase"] == phase.as_str()
        })
        .await
    }

    /// Every event read so far.
    pub fn seen(&self) -> &[Value] {
        &self.seen
    }

    /// Closes stdin and waits for the process to exit.
    #[allow(clippy::missing_panics_doc)]
    pub async fn finish(mut self) -> std::process::ExitStatus {
        drop(self.stdin.take());
        tokio::time::timeout(DEFAULT_TIMEOUT, self.child.wait())
            .await
            .expect("biocalm did not exit")
            .expect("wait failed")
    }
}

/// Runs a one-shot `biocalm` command and collects its output.
#[allow(clippy::missing_panics_doc)]
pub fn spawn_command(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_biocalm"))
        .args(args)
        .env_remove("BIOCALM_CONFIG")
        .output()
        .expect("failed to run biocalm")
}

/// Writes `content` to a temporary file with the given suffix.
#[allow(clippy::missing_panics_doc)]
pub fn temp_file(content: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("failed to write temp file");
    file
}

/// A recorded series: `n` readings that warm up in the second half.
pub fn sample_series(n: usize) -> Value {
    let samples: Vec<Value> = (0..n)
        .map(|i| {
            let late = if i >= n / 2 { 1.0 } else { 0.0 };
            json!({
                "ecg_voltage": 1.6 + 0.05 * late,
                "bpm": 72.0 + 8.0 * late,
                "temperature": 36.5 + 0.2 * late,
            })
        })
        .collect();
    Value::Array(samples)
}
