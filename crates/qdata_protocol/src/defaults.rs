//! Shared constants for the dispatch fabric.

/// Default TTL (seconds) for the per-fingerprint coalescing lock (C1).
pub const DEFAULT_LOCK_TTL_SECS: u64 = 5;

/// Default lease timeout (seconds) before a claimed-but-unacked queue row
/// is considered abandoned and requeued.
pub const DEFAULT_LEASE_TIMEOUT_SECS: i64 = 120;

/// Default bound on concurrently running worker child processes.
pub const DEFAULT_MAX_PROCESS: usize = 10;

/// Default poll interval (ms) while a worker is idle, waiting for new rows.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default poll interval (ms) used only by the startup drain pass, which
/// runs faster than steady state since it never blocks on real work.
pub const DEFAULT_DRAIN_POLL_INTERVAL_MS: u64 = 20;

/// Name of the queue table backing the task queue (C2).
pub const TASK_QUEUE_TABLE: &str = "qdata_task_queue";

/// Name of the queue table backing the response queue (C3).
pub const RESPONSE_QUEUE_TABLE: &str = "qdata_response_queue";

/// Minimum accepted client version, mirroring the original service default.
pub const DEFAULT_CLIENT_VERSION_SPEC: &str = ">=0.4.0";
