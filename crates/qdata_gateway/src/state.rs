use std::sync::Arc;
use std::time::Duration;

use qdata_config::VersionSpec;
use qdata_index::WaitSetStore;
use qdata_protocol::TaskEnvelope;
use qdata_provider::Provider;
use qdata_queue::DurableQueue;

use crate::session::SessionRegistry;

/// Shared state for every connection handled by the gateway, grounded on
/// `ob-poc-web`'s `AppState` — one `Clone`-able struct of `Arc`s handed
/// to every Axum route. The response queue (C3) is not here: it is only
/// ever read by the egress loop in [`crate::egress`], not by a route
/// handler.
///
/// `index` and `provider` give ingress the same coalescing authority the
/// worker pool has: `index` to call `append_and_count` before publishing,
/// `provider` purely for its cheap `fingerprint_override` hook, never for
/// the actual data path (that stays isolated in the per-job child).
#[derive(Clone)]
pub struct AppState {
    pub task_queue: DurableQueue<TaskEnvelope>,
    pub index: Arc<dyn WaitSetStore>,
    pub provider: Arc<dyn Provider>,
    pub sessions: Arc<SessionRegistry>,
    pub version_spec: Arc<VersionSpec>,
    pub ping_interval: Duration,
}

impl AppState {
    pub fn new(
        task_queue: DurableQueue<TaskEnvelope>,
        index: Arc<dyn WaitSetStore>,
        provider: Arc<dyn Provider>,
        version_spec: VersionSpec,
        ping_interval: Duration,
    ) -> Self {
        Self {
            task_queue,
            index,
            provider,
            sessions: Arc::new(SessionRegistry::new()),
            version_spec: Arc::new(version_spec),
            ping_interval,
        }
    }
}
