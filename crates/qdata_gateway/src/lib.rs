//! The session gateway (C5): an Axum WebSocket server combining the
//! original service's `RequestListener` (ingress, see [`ws`]) and
//! `RequestResponder` (egress, see [`egress`]) into one process sharing a
//! session registry.

pub mod egress;
pub mod protocol;
pub mod session;
pub mod state;
pub mod ws;

pub use session::{ServerEvent, SessionId, SessionRegistry};
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use qdata_config::{Config, VersionSpec};
use qdata_index::WaitSetStore;
use qdata_protocol::{ResponseEnvelope, TaskEnvelope};
use qdata_provider::Provider;
use qdata_queue::DurableQueue;
use tracing::info;

/// Build the router and serve it until `shutdown` resolves, also driving
/// the response-queue egress loop for the lifetime of the call.
///
/// `index` and `provider` give ingress coalescing authority (C1): the
/// same handles the worker pool uses, so `append_and_count` here and
/// `drain` there agree on the fingerprint for any given request.
pub async fn serve(
    config: &Config,
    task_queue: DurableQueue<TaskEnvelope>,
    response_queue: DurableQueue<ResponseEnvelope>,
    index: Arc<dyn WaitSetStore>,
    provider: Arc<dyn Provider>,
    shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let version_spec = VersionSpec::parse(&config.client_version)?;
    let ping_interval = Duration::from_secs_f64(config.gateway_ping_interval_secs.max(0.1));
    let state = AppState::new(task_queue, index, provider, version_spec, ping_interval);

    let egress_sessions = state.sessions.clone();
    let egress_shutdown = shutdown.clone();
    let egress_handle = tokio::spawn(egress::run(
        response_queue,
        egress_sessions,
        Duration::from_millis(qdata_protocol::defaults::DEFAULT_POLL_INTERVAL_MS),
        config.max_concurrency,
        egress_shutdown,
    ));

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.gateway_host, config.gateway_port).parse()?;
    info!(%addr, "gateway listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let mut accept_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = accept_shutdown.changed().await;
        })
        .await?;

    let _ = egress_handle.await;
    Ok(())
}
