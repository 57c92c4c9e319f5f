//! The `/ws` route: one task per connection reading client events
//! (`RequestListener` equivalent) plus a per-connection writer task that
//! drains this session's `ServerEvent` channel (the `RequestResponder`
//! equivalent's per-socket half — the queue-side half lives in
//! [`crate::egress`]).

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use qdata_protocol::{TaskEnvelope, TaskRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::protocol::{decode_request, ClientEnvelope};
use crate::session::ServerEvent;
use crate::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    let ssid = session_id.to_string();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.sessions.register(session_id, tx);
    info!(ssid = %ssid, "connection established");

    let ping_interval = state.ping_interval;
    let writer = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(ping_interval);
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "failed to encode server event");
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(message)) = ws_receiver.next().await {
        if let Message::Text(text) = message {
            if let Err(e) = handle_client_message(&state, session_id, &ssid, &text).await {
                warn!(ssid = %ssid, error = %e, "failed to handle client message");
            }
        }
    }

    state.sessions.unregister(&session_id);
    writer.abort();
    info!(ssid = %ssid, "connection finished");
}

async fn handle_client_message(
    state: &AppState,
    session_id: Uuid,
    ssid: &str,
    text: &str,
) -> anyhow::Result<()> {
    let envelope: ClientEnvelope = serde_json::from_str(text)?;
    let kind = envelope.event.trim_end_matches("_request").to_string();

    let request = match decode_request(&envelope.event, envelope.body) {
        None => {
            warn!(event = %envelope.event, "unrecognized event");
            return Ok(());
        }
        Some(Err(e)) => {
            invalid_response(state, &session_id, &kind, format!("malformed request body: {e}"));
            return Ok(());
        }
        Some(Ok(request)) => request,
    };

    if !state.version_spec.accepts(&envelope.head.version).unwrap_or(false) {
        invalid_response(
            state,
            &session_id,
            &kind,
            format!(
                "client version mismatch, please upgrade your client ({})",
                envelope.head.version
            ),
        );
        return Ok(());
    }

    let request: TaskRequest = request.normalize();
    publish_task(state, ssid, request).await
}

/// Send a client-fault `INVALID` response directly to `session_id`,
/// never touching C1/C2 (spec §7 taxonomy item 1).
fn invalid_response(state: &AppState, session_id: &Uuid, kind: &str, detail: String) {
    state.sessions.send_to(
        session_id,
        ServerEvent {
            event: format!("{kind}_response"),
            result: None,
            status: 1,
            detailed_info: Some(detail),
        },
    );
}

/// Ingress steps 3-6 of the coalescing protocol: compute the fingerprint,
/// append this session to its wait set, and publish to the task queue
/// only if this call is the first (`n == 1`). Every subsequent identical
/// request simply joins the wait set and waits for the in-flight job's
/// fan-out response — publishing here unconditionally would give every
/// duplicate its own C2 row, defeating coalescing entirely.
async fn publish_task(state: &AppState, ssid: &str, request: TaskRequest) -> anyhow::Result<()> {
    let fingerprint = state.provider.fingerprint(&request);
    let count = state.index.append_and_count(&fingerprint, ssid).await?;
    if count != 1 {
        debug!(ssid, fingerprint = %fingerprint, count, "coalesced onto an in-flight task");
        return Ok(());
    }

    let envelope = TaskEnvelope {
        ssid: ssid.to_string(),
        request,
    };
    state.task_queue.publish(&envelope).await?;
    debug!(ssid, fingerprint = %fingerprint, "published task");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qdata_config::VersionSpec;
    use qdata_index::InMemoryWaitSetStore;
    use qdata_provider::StubProvider;
    use qdata_queue::{ensure_table, DurableQueue};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new().connect(":memory:").await.unwrap();
        ensure_table(&pool, "task_queue").await.unwrap();
        AppState::new(
            DurableQueue::new(pool, "task_queue"),
            Arc::new(InMemoryWaitSetStore::new()),
            Arc::new(StubProvider),
            VersionSpec::parse(">=0.4.0").unwrap(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test]
    async fn valid_request_is_published_to_task_queue() {
        let state = test_state().await;
        let text = serde_json::json!({
            "event": "calendar_request",
            "head": {"version": "0.4.1"},
            "body": {"start_time": "2020-01-01", "end_time": "None", "freq": "day"},
        })
        .to_string();

        handle_client_message(&state, Uuid::new_v4(), "abc", &text)
            .await
            .unwrap();

        assert_eq!(state.task_queue.waiting_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_client_version_is_rejected_without_publishing() {
        let state = test_state().await;
        let session_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.sessions.register(session_id, tx);

        let text = serde_json::json!({
            "event": "calendar_request",
            "head": {"version": "0.2.0"},
            "body": {"start_time": "2020-01-01", "end_time": "None", "freq": "day"},
        })
        .to_string();

        handle_client_message(&state, session_id, "abc", &text)
            .await
            .unwrap();

        assert_eq!(state.task_queue.waiting_count().await.unwrap(), 0);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "calendar_response");
        assert_eq!(event.status, 1);
    }

    #[tokio::test]
    async fn malformed_body_gets_invalid_response_not_silence() {
        let state = test_state().await;
        let session_id = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.sessions.register(session_id, tx);

        let text = serde_json::json!({
            "event": "calendar_request",
            "head": {"version": "0.4.1"},
            "body": {"start_time": "2020-01-01"},
        })
        .to_string();

        handle_client_message(&state, session_id, "abc", &text)
            .await
            .unwrap();

        assert_eq!(state.task_queue.waiting_count().await.unwrap(), 0);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event, "calendar_response");
        assert_eq!(event.status, 1);
        assert!(event.detailed_info.unwrap().contains("malformed"));
    }

    #[tokio::test]
    async fn second_identical_request_coalesces_without_a_second_publish() {
        let state = test_state().await;
        let text = serde_json::json!({
            "event": "calendar_request",
            "head": {"version": "0.4.1"},
            "body": {"start_time": "2020-01-01", "end_time": "None", "freq": "day"},
        })
        .to_string();

        handle_client_message(&state, Uuid::new_v4(), "first", &text)
            .await
            .unwrap();
        handle_client_message(&state, Uuid::new_v4(), "second", &text)
            .await
            .unwrap();

        assert_eq!(state.task_queue.waiting_count().await.unwrap(), 1);
    }
}
