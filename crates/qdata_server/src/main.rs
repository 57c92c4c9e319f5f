//! `qdata-server`: CLI entrypoint wiring the configured components (C1-C5)
//! together and running them until Ctrl-C, mirroring the original
//! service's `RequestHandler`/`DataProcessor` pair started from one
//! process, just split into explicit, independently testable crates.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use qdata_config::{Args, Config, Module};
use qdata_index::RedisWaitSetStore;
use qdata_provider::StubProvider;
use qdata_worker::{WorkerPool, WorkerPoolConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    qdata_logging::init_logging(qdata_logging::LogConfig {
        app_name: "qdata-server",
        verbose: args.verbose,
    })?;

    let config = Config::load(&args.config)?;
    let modules = args.modules();
    info!(?modules, "starting qdata-server");

    let pool = qdata_queue::connect_pool(&config.queue_database_url).await?;
    qdata_queue::ensure_schema(&pool).await?;
    let task_queue = qdata_queue::DurableQueue::new(
        pool.clone(),
        qdata_protocol::defaults::TASK_QUEUE_TABLE,
    );
    let response_queue =
        qdata_queue::DurableQueue::new(pool, qdata_protocol::defaults::RESPONSE_QUEUE_TABLE);

    // The coalescing index (C1) and the provider's cheap fingerprint hook
    // are shared by both roles: the gateway calls `append_and_count`
    // before publishing, the worker calls `drain` after the job
    // finishes, and both must agree on the fingerprint for a given
    // request (spec.md §9 "Fingerprint authority").
    let index: Arc<dyn qdata_index::WaitSetStore> = Arc::new(RedisWaitSetStore::new(
        &config.redis_url,
        Duration::from_secs(config.lock_ttl_secs),
    )?);
    let provider: Arc<dyn qdata_provider::Provider> = Arc::new(StubProvider);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    if modules.contains(&Module::DataProcessor) {
        let worker_pool = Arc::new(WorkerPool::new(
            task_queue.clone(),
            response_queue.clone(),
            index.clone(),
            provider.clone(),
            WorkerPoolConfig {
                max_process: config.max_process,
                poll_interval: Duration::from_millis(
                    qdata_protocol::defaults::DEFAULT_POLL_INTERVAL_MS,
                ),
                lease_timeout_secs: config.lease_timeout_secs,
                lease_sweep_interval: Duration::from_secs(30),
                jobrunner_path: jobrunner_path(),
                max_concurrency: config.max_concurrency,
                inactivity_timeout_secs: config.inactivity_timeout_secs,
            },
        ));
        worker_pool.run_startup_drain().await?;
        let shutdown_rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            worker_pool.run(shutdown_rx).await;
        }));
    }

    if modules.contains(&Module::RequestHandler) {
        let config = config.clone();
        let index = index.clone();
        let provider = provider.clone();
        let shutdown_rx = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) =
                qdata_gateway::serve(&config, task_queue, response_queue, index, provider, shutdown_rx)
                    .await
            {
                tracing::error!(error = %e, "gateway exited with error");
            }
        }));
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    for handle in handles {
        let _ = handle.await;
    }
    Ok(())
}

/// Locate the `qdata-jobrunner` binary as a sibling of the running
/// executable — the usual cargo-built-workspace layout — falling back to
/// bare `PATH` resolution if the current executable's directory can't be
/// determined.
fn jobrunner_path() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe) => match exe.parent() {
            Some(dir) => dir.join("qdata-jobrunner"),
            None => PathBuf::from("qdata-jobrunner"),
        },
        Err(_) => PathBuf::from("qdata-jobrunner"),
    }
}
