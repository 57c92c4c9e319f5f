//! Per-job subprocess isolation: spawn, stream, and enforce a timeout
//! around one child process, framed as one line of JSON in, one line of
//! JSON out, since a task's payload is small structured data rather than
//! a large columnar batch.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use qdata_protocol::{JobOutcome, TaskRequest};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::warn;

const DEFAULT_JOB_TIMEOUT_SECS: u64 = 60;

/// Run one task in a fresh child process and return its reported outcome.
/// Any failure to spawn, write, read, or a timed-out child becomes an
/// `Invalid` outcome rather than propagating — nothing may escape the
/// per-job boundary (spec §7 error taxonomy).
pub async fn run_isolated(jobrunner_path: &Path, request: &TaskRequest) -> JobOutcome {
    match run_isolated_inner(jobrunner_path, request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "job runner child failed");
            JobOutcome::invalid(e.to_string())
        }
    }
}

async fn run_isolated_inner(
    jobrunner_path: &Path,
    request: &TaskRequest,
) -> anyhow::Result<JobOutcome> {
    let input = serde_json::to_vec(request)?;

    let mut child = Command::new(jobrunner_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    {
        let mut stdin = child.stdin.take().expect("stdin was piped");
        stdin.write_all(&input).await?;
        stdin.shutdown().await?;
    }

    let timeout = Duration::from_secs(DEFAULT_JOB_TIMEOUT_SECS);
    let output = tokio::time::timeout(timeout, child.wait_with_output()).await??;

    if !output.status.success() {
        anyhow::bail!("job runner exited with status {}", output.status);
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let outcome: JobOutcome = serde_json::from_str(text.trim())?;
    Ok(outcome)
}
