//! Probe by running the platform `ping` utility.
//!
//! Only the exit status is interpreted; output text is kept for diagnostics.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{ProbeOptions, ProbeOutcome, Prober};
use crate::monitor::HostTarget;

/// Extra time granted to process startup on top of the echo timeout.
const SPAWN_SLACK: Duration = Duration::from_secs(1);

/// Exit status `ping` uses when it sent a request but got no reply.
#[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd"))]
const NO_REPLY_EXIT_CODE: i32 = 2;
#[cfg(not(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd")))]
const NO_REPLY_EXIT_CODE: i32 = 1;

/// Prober that spawns `ping -c 1` per check.
#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
}

impl SystemPing {
    /// Use `ping` from `PATH`.
    pub fn new() -> Self {
        Self::with_program("ping")
    }

    /// Use a specific executable instead of `ping`.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the argument list for a single echo request.
pub fn ping_args(host: &HostTarget, opts: &ProbeOptions) -> Vec<String> {
    let wait_secs = opts.timeout.as_secs().max(1);
    #[cfg(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd"))]
    let wait_flag = "-t";
    #[cfg(not(any(target_os = "macos", target_os = "freebsd", target_os = "openbsd")))]
    let wait_flag = "-W";

    vec![
        "-n".to_owned(),
        "-c".to_owned(),
        "1".to_owned(),
        wait_flag.to_owned(),
        wait_secs.to_string(),
        "-s".to_owned(),
        opts.packet_size.to_string(),
        host.name().to_owned(),
    ]
}

/// Map a `ping` exit status to a probe outcome.
///
/// `None` means the process was terminated by a signal.
pub fn classify_exit(code: Option<i32>, stderr: &str) -> ProbeOutcome {
    match code {
        Some(0) => ProbeOutcome::Reachable,
        Some(c) if c == NO_REPLY_EXIT_CODE => ProbeOutcome::Unreachable,
        Some(c) => {
            let detail = stderr.trim();
            if detail.is_empty() {
                ProbeOutcome::Error(format!("ping exited with status {c}"))
            } else {
                ProbeOutcome::Error(format!("ping exited with status {c}: {detail}"))
            }
        }
        None => ProbeOutcome::Error("ping terminated by signal".to_owned()),
    }
}

#[async_trait]
impl Prober for SystemPing {
    async fn probe(&self, host: &HostTarget, opts: &ProbeOptions) -> ProbeOutcome {
        if host.name().starts_with('-') {
            return ProbeOutcome::Error(format!("refusing option-like host name '{host}'"));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(ping_args(host, opts))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let limit = opts.timeout.saturating_add(SPAWN_SLACK);
        let output = match tokio::time::timeout(limit, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ProbeOutcome::Error(format!("failed to run {}: {e}", self.program));
            }
            Err(_) => return ProbeOutcome::Error(format!("ping timed out after {limit:?}")),
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        let outcome = classify_exit(output.status.code(), &stderr);
        debug!(host = %host, program = %self.program, outcome = %outcome, "system ping finished");
        outcome
    }
}
