//! The worker pool (C4): a one-shot startup drain pass followed by
//! `max_process` independent steady-state loops, each claiming one task
//! at a time from the task queue (C2) — the Rust shape of the original
//! service's `max_process` `multiprocessing.Process` workers, each with
//! `prefetch_count=1`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use qdata_index::WaitSetStore;
use qdata_protocol::{JobOutcome, ResponseEnvelope, TaskEnvelope};
use qdata_provider::Provider;
use qdata_queue::DurableQueue;
use tracing::{debug, info, warn};

use crate::child;

pub struct WorkerPoolConfig {
    pub max_process: usize,
    pub poll_interval: Duration,
    pub lease_timeout_secs: i64,
    pub lease_sweep_interval: Duration,
    pub jobrunner_path: PathBuf,
    /// Startup-drain and egress prefetch: how many rows the drain pass
    /// claims per round before re-checking for more (spec.md §6
    /// `max_concurrency`).
    pub max_concurrency: usize,
    /// Startup-drain quiescence: how long the drain pass waits for
    /// another row to appear before concluding the queue is empty
    /// (spec.md §6 `inactivity_timeout`).
    pub inactivity_timeout_secs: f64,
}

pub struct WorkerPool {
    task_queue: DurableQueue<TaskEnvelope>,
    response_queue: DurableQueue<ResponseEnvelope>,
    index: Arc<dyn WaitSetStore>,
    provider: Arc<dyn Provider>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    /// `provider` is a lightweight, in-process handle used only for its
    /// cheap `fingerprint_override` hook (see `Provider::fingerprint`) so
    /// the worker recomputes the same fingerprint the gateway used — the
    /// actual data path still only ever runs inside the isolated
    /// `qdata-jobrunner` child.
    pub fn new(
        task_queue: DurableQueue<TaskEnvelope>,
        response_queue: DurableQueue<ResponseEnvelope>,
        index: Arc<dyn WaitSetStore>,
        provider: Arc<dyn Provider>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            task_queue,
            response_queue,
            index,
            provider,
            config,
        }
    }

    /// Clear wait sets left behind by tasks that were already queued
    /// before this process started (e.g. a crashed prior instance). Each
    /// drained row is acked without running a job — mirroring the
    /// original's `clear_task`, which only pops the redis wait set and
    /// never invokes a data callback. See DESIGN.md Open Question #3 for
    /// why this clears unconditionally, with no liveness check on the
    /// waiting sessions.
    ///
    /// Claims up to `max_concurrency` rows per round (the configured
    /// drain prefetch) and gives up once `inactivity_timeout_secs` has
    /// passed with no row claimed, in addition to the zero-`waiting_count`
    /// check — matching spec.md §4.4's "stops by inactivity or by zero
    /// waiting_message_count" either-or.
    pub async fn run_startup_drain(&self) -> anyhow::Result<()> {
        info!(
            max_concurrency = self.config.max_concurrency,
            "worker pool starting startup drain pass"
        );
        let idle_deadline = Duration::from_secs_f64(self.config.inactivity_timeout_secs.max(0.0));
        let drain_poll_interval =
            Duration::from_millis(qdata_protocol::defaults::DEFAULT_DRAIN_POLL_INTERVAL_MS);
        let mut cleared = 0u64;
        let mut last_progress = tokio::time::Instant::now();

        loop {
            let mut claimed_in_round = 0u64;
            for _ in 0..self.config.max_concurrency.max(1) {
                match self.task_queue.claim().await {
                    Ok(Some(claimed)) => {
                        let request = claimed.payload.request.clone().normalize();
                        let fp = self.provider.fingerprint(&request);
                        let _ = self.index.drain(&fp).await;
                        self.task_queue.ack(claimed.id).await?;
                        cleared += 1;
                        claimed_in_round += 1;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "drain pass claim failed, stopping drain");
                        info!(cleared, "startup drain pass complete");
                        return Ok(());
                    }
                }
            }

            if claimed_in_round > 0 {
                last_progress = tokio::time::Instant::now();
                continue;
            }

            if self.task_queue.waiting_count().await.unwrap_or(0) == 0 {
                break;
            }
            if tokio::time::Instant::now().duration_since(last_progress) >= idle_deadline {
                break;
            }
            tokio::time::sleep(drain_poll_interval).await;
        }
        info!(cleared, "startup drain pass complete");
        Ok(())
    }

    /// Spawn `max_process` independent steady-state loops plus a lease
    /// sweeper, running until `shutdown` resolves.
    pub async fn run(self: Arc<Self>, shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut handles = Vec::new();
        for worker_index in 0..self.config.max_process {
            let pool = Arc::clone(&self);
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                pool.steady_state_loop(worker_index, &mut shutdown).await;
            }));
        }

        let sweeper_pool = Arc::clone(&self);
        let mut sweeper_shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            sweeper_pool.lease_sweep_loop(&mut sweeper_shutdown).await;
        }));

        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn steady_state_loop(&self, worker_index: usize, shutdown: &mut tokio::sync::watch::Receiver<bool>) {
        debug!(worker_index, "steady-state loop starting");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.task_queue.claim().await {
                Ok(Some(claimed)) => {
                    let id = claimed.id;
                    if let Err(e) = self.process_one(claimed.payload).await {
                        warn!(error = %e, "failed to process claimed task");
                    }
                    if let Err(e) = self.task_queue.ack(id).await {
                        warn!(error = %e, "failed to ack processed task");
                    }
                }
                Ok(None) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "claim failed, backing off");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
        debug!(worker_index, "steady-state loop stopped");
    }

    /// The coalescing decision (`append_and_count` / `n == 1`) was already
    /// made by the gateway before this envelope ever reached C2 (spec.md
    /// §4.3 ingress steps 3-6) — every claimed envelope here is already
    /// the one-and-only task for its fingerprint, so this only recomputes
    /// the fingerprint (it must match the gateway's, the shared
    /// fingerprint-authority contract in spec.md §9) to know which wait
    /// set to drain once the job is done.
    async fn process_one(&self, envelope: TaskEnvelope) -> anyhow::Result<()> {
        let request = envelope.request.normalize();
        let fingerprint = self.provider.fingerprint(&request);

        let outcome: JobOutcome = child::run_isolated(&self.config.jobrunner_path, &request).await;
        let ssids = self.index.drain(&fingerprint).await?;

        if ssids.is_empty() {
            debug!(fingerprint = %fingerprint, "no waiters left for this fingerprint, skipping publish");
            return Ok(());
        }

        let response = ResponseEnvelope {
            kind: request.kind(),
            ssids,
            data: outcome.data,
            status: outcome.status,
            detailed_info: outcome.detailed_info,
        };
        self.response_queue.publish(&response).await?;
        Ok(())
    }

    async fn lease_sweep_loop(&self, shutdown: &mut tokio::sync::watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            if let Err(e) = self
                .task_queue
                .sweep_abandoned(self.config.lease_timeout_secs)
                .await
            {
                warn!(error = %e, "lease sweep failed");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.lease_sweep_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdata_index::InMemoryWaitSetStore;
    use qdata_protocol::{TaskFingerprint, TaskRequest};
    use qdata_provider::StubProvider;
    use qdata_queue::ensure_table;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> WorkerPool {
        let pool = SqlitePoolOptions::new()
            .connect(":memory:")
            .await
            .unwrap();
        ensure_table(&pool, "task_queue").await.unwrap();
        ensure_table(&pool, "response_queue").await.unwrap();

        WorkerPool::new(
            DurableQueue::new(pool.clone(), "task_queue"),
            DurableQueue::new(pool, "response_queue"),
            Arc::new(InMemoryWaitSetStore::new()),
            Arc::new(StubProvider),
            WorkerPoolConfig {
                max_process: 1,
                poll_interval: Duration::from_millis(10),
                lease_timeout_secs: 120,
                lease_sweep_interval: Duration::from_secs(30),
                jobrunner_path: PathBuf::from("qdata-jobrunner"),
                max_concurrency: 4,
                inactivity_timeout_secs: 0.05,
            },
        )
    }

    fn calendar_envelope(ssid: &str) -> TaskEnvelope {
        TaskEnvelope {
            ssid: ssid.to_string(),
            request: TaskRequest::Calendar {
                start_time: Some("2020-01-01".into()),
                end_time: Some("2020-06-01".into()),
                freq: "day".into(),
                future: false,
            },
        }
    }

    #[tokio::test]
    async fn startup_drain_clears_stale_wait_sets_without_running_jobs() {
        let pool = test_pool().await;

        let request = calendar_envelope("stale-session").request.clone().normalize();
        let fingerprint = TaskFingerprint::compute(&request);
        pool.index
            .append_and_count(&fingerprint, "stale-session")
            .await
            .unwrap();
        pool.task_queue.publish(&calendar_envelope("stale-session")).await.unwrap();

        pool.run_startup_drain().await.unwrap();

        assert!(pool.index.drain(&fingerprint).await.unwrap().is_empty());
        assert_eq!(pool.task_queue.waiting_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn process_one_recomputes_the_same_fingerprint_the_gateway_used_and_drains_its_waiters() {
        let pool = test_pool().await;
        let envelope = calendar_envelope("session-a");
        let request = envelope.request.clone().normalize();

        let fingerprint = TaskFingerprint::compute(&request);
        pool.index
            .append_and_count(&fingerprint, "session-a")
            .await
            .unwrap();
        pool.index
            .append_and_count(&fingerprint, "session-b")
            .await
            .unwrap();

        pool.process_one(envelope).await.unwrap();

        assert!(pool.index.drain(&fingerprint).await.unwrap().is_empty());
        let stats = pool.response_queue.stats().await.unwrap();
        assert_eq!(stats.queued, 1);
    }

    #[tokio::test]
    async fn process_one_skips_publish_when_no_waiters_remain() {
        let pool = test_pool().await;
        let envelope = calendar_envelope("orphaned-session");

        pool.process_one(envelope).await.unwrap();

        let stats = pool.response_queue.stats().await.unwrap();
        assert_eq!(stats.queued, 0);
    }
}
