//! Execution of external telemetry probes.
//!
//! A probe is one shell command whose output feeds a parser. Probes are
//! slow and unreliable by nature, so every failure mode (spawn error,
//! non-zero exit, timeout) collapses into a `ProbeResult` with `ok: false`
//! rather than an error: callers decide what a missing output means.

use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Probe {
    pub command: String,
    pub timeout: Duration,
}

impl Probe {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub ok: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            output: String::new(),
            error: Some(reason.into()),
        }
    }
}

/// Runs a single probe to completion or its deadline, whichever comes first.
/// `kill_on_drop` ensures a timed-out child does not outlive its window.
pub async fn run_probe(probe: &Probe) -> ProbeResult {
    let child = Command::new("sh")
        .arg("-c")
        .arg(&probe.command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let child = match child {
        Ok(child) => child,
        Err(err) => {
            debug!(command = %probe.command, error = %err, "probe spawn failed");
            return ProbeResult::failed(format!("spawn failed: {err}"));
        }
    };

    match time::timeout(probe.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            if output.status.success() {
                ProbeResult {
                    ok: true,
                    output: String::from_utf8_lossy(&output.stdout).into_owned(),
                    error: None,
                }
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                debug!(
                    command = %probe.command,
                    code = ?output.status.code(),
                    "probe exited with failure"
                );
                let reason = if stderr.is_empty() {
                    format!("exit status {:?}", output.status.code())
                } else {
                    stderr
                };
                ProbeResult::failed(reason)
            }
        }
        Ok(Err(err)) => ProbeResult::failed(format!("wait failed: {err}")),
        Err(_elapsed) => {
            debug!(
                command = %probe.command,
                timeout_ms = probe.timeout.as_millis() as u64,
                "probe timed out"
            );
            ProbeResult::failed("timed out")
        }
    }
}

/// Runs all probes concurrently. Results come back in issue order, and a
/// failed or timed-out probe never cancels its siblings.
pub async fn run_probe_set(probes: &[Probe]) -> Vec<ProbeResult> {
    let handles: Vec<_> = probes
        .iter()
        .cloned()
        .map(|probe| tokio::spawn(async move { run_probe(&probe).await }))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(err) => results.push(ProbeResult::failed(format!("probe task failed: {err}"))),
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_probe_captures_stdout() {
        let probe = Probe::new("echo hello", Duration::from_secs(2));
        let result = run_probe(&probe).await;
        assert!(result.ok);
        assert_eq!(result.output.trim(), "hello");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn failing_probe_reports_error_instead_of_panicking() {
        let probe = Probe::new("definitely_not_a_real_command_xyz", Duration::from_secs(2));
        let result = run_probe(&probe).await;
        assert!(!result.ok);
        assert!(result.output.is_empty());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn slow_probe_is_cut_off_at_its_deadline() {
        let probe = Probe::new("sleep 5", Duration::from_millis(100));
        let started = std::time::Instant::now();
        let result = run_probe(&probe).await;
        assert!(!result.ok);
        assert_eq!(result.error.as_deref(), Some("timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn probe_set_preserves_issue_order_despite_failures() {
        let probes = vec![
            Probe::new("echo first", Duration::from_secs(2)),
            Probe::new("sleep 5", Duration::from_millis(100)),
            Probe::new("echo third", Duration::from_secs(2)),
        ];
        let results = run_probe_set(&probes).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].output.trim(), "first");
        assert!(!results[1].ok);
        assert_eq!(results[2].output.trim(), "third");
    }
}
