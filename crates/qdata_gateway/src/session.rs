//! Session registry: one entry per connected client, mirroring the
//! original service's Socket.IO `room=ssid` addressing. Kept as a plain
//! `HashMap` behind one `Mutex` rather than `dashmap`, since the table is
//! small and mutated infrequently compared to the per-message hot path.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type SessionId = Uuid;

/// An outbound `{kind}_response` event queued for delivery to one session.
#[derive(Debug, Clone, Serialize)]
pub struct ServerEvent {
    pub event: String,
    pub result: Option<Value>,
    pub status: u8,
    pub detailed_info: Option<String>,
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<HashMap<SessionId, mpsc::UnboundedSender<ServerEvent>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: SessionId, sender: mpsc::UnboundedSender<ServerEvent>) {
        self.inner.lock().unwrap().insert(id, sender);
    }

    pub fn unregister(&self, id: &SessionId) {
        self.inner.lock().unwrap().remove(id);
    }

    /// Send an event to one session, silently dropping it if the session
    /// has already disconnected (the matching `unregister` races with any
    /// in-flight response, and that is fine — nobody is left to read it).
    pub fn send_to(&self, id: &SessionId, event: ServerEvent) {
        let sender = self.inner.lock().unwrap().get(id).cloned();
        if let Some(sender) = sender {
            let _ = sender.send(event);
        }
    }

    pub fn connected_count(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
