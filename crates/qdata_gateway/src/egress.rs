//! The queue-side half of the `RequestResponder`: claims finished
//! [`ResponseEnvelope`]s off the response queue (C3) and fans each one out
//! to every session named in its `ssids`, exactly mirroring the original
//! `message_callback` -> `respond` pair.

use std::sync::Arc;
use std::time::Duration;

use qdata_protocol::ResponseEnvelope;
use qdata_queue::DurableQueue;
use tracing::warn;

use crate::session::{ServerEvent, SessionRegistry};

/// Drain and fan out finished responses until `shutdown` resolves.
/// `prefetch` (the `max_concurrency` config key, per spec.md §6) bounds
/// how many responses are claimed and dispatched per round before the
/// loop checks the queue again, rather than one at a time.
pub async fn run(
    response_queue: DurableQueue<ResponseEnvelope>,
    sessions: Arc<SessionRegistry>,
    poll_interval: Duration,
    prefetch: usize,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let prefetch = prefetch.max(1);
    loop {
        if *shutdown.borrow() {
            break;
        }
        let mut dispatched = 0usize;
        let mut claim_failed = false;
        for _ in 0..prefetch {
            match response_queue.claim().await {
                Ok(Some(claimed)) => {
                    dispatch(&sessions, &claimed.payload);
                    if let Err(e) = response_queue.ack(claimed.id).await {
                        warn!(error = %e, "failed to ack dispatched response");
                    }
                    dispatched += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "response queue claim failed, backing off");
                    claim_failed = true;
                    break;
                }
            }
        }
        if claim_failed {
            tokio::time::sleep(poll_interval).await;
        } else if dispatched == 0 {
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = shutdown.changed() => {}
            }
        }
    }
}

fn dispatch(sessions: &SessionRegistry, envelope: &ResponseEnvelope) {
    let event = format!("{}_response", envelope.kind.as_str());
    for ssid in &envelope.ssids {
        let Ok(session_id) = ssid.parse() else {
            warn!(ssid, "response ssid is not a valid session id, dropping");
            continue;
        };
        sessions.send_to(
            &session_id,
            ServerEvent {
                event: event.clone(),
                result: envelope.data.clone(),
                status: envelope.status as u8,
                detailed_info: envelope.detailed_info.clone(),
            },
        );
    }
}
