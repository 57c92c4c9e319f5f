//! In-memory [`WaitSetStore`] double for tests, grounded on the pattern of
//! plain `HashMap`-backed test doubles used throughout the teacher's
//! sentinel code for its routing/state stores.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use qdata_protocol::TaskFingerprint;

use crate::error::Result;
use crate::store::WaitSetStore;

#[derive(Default)]
pub struct InMemoryWaitSetStore {
    sets: Mutex<HashMap<String, Vec<String>>>,
}

impl InMemoryWaitSetStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WaitSetStore for InMemoryWaitSetStore {
    async fn append_and_count(&self, fingerprint: &TaskFingerprint, ssid: &str) -> Result<usize> {
        let mut sets = self.sets.lock().expect("wait-set lock poisoned");
        let entry = sets.entry(fingerprint.to_hex()).or_default();
        entry.push(ssid.to_string());
        Ok(entry.len())
    }

    async fn drain(&self, fingerprint: &TaskFingerprint) -> Result<Vec<String>> {
        let mut sets = self.sets.lock().expect("wait-set lock poisoned");
        Ok(sets.remove(&fingerprint.to_hex()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_waiter_does_not_trigger_enqueue() {
        let store = InMemoryWaitSetStore::new();
        let req = qdata_protocol::TaskRequest::Calendar {
            start_time: None,
            end_time: None,
            freq: "day".into(),
            future: false,
        };
        let fp = TaskFingerprint::compute(&req);

        let first = store.append_and_count(&fp, "session-a").await.unwrap();
        let second = store.append_and_count(&fp, "session-b").await.unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn drain_clears_the_set() {
        let store = InMemoryWaitSetStore::new();
        let req = qdata_protocol::TaskRequest::Calendar {
            start_time: None,
            end_time: None,
            freq: "day".into(),
            future: false,
        };
        let fp = TaskFingerprint::compute(&req);
        store.append_and_count(&fp, "a").await.unwrap();
        store.append_and_count(&fp, "b").await.unwrap();

        let drained = store.drain(&fp).await.unwrap();
        assert_eq!(drained, vec!["a".to_string(), "b".to_string()]);
        assert!(store.drain(&fp).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_produce_distinct_counts() {
        use std::sync::Arc;
        let store = Arc::new(InMemoryWaitSetStore::new());
        let req = qdata_protocol::TaskRequest::Calendar {
            start_time: None,
            end_time: None,
            freq: "day".into(),
            future: false,
        };
        let fp = TaskFingerprint::compute(&req);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            let fp = fp;
            handles.push(tokio::spawn(async move {
                store.append_and_count(&fp, &format!("s{i}")).await.unwrap()
            }));
        }
        let mut counts: Vec<usize> = Vec::new();
        for handle in handles {
            counts.push(handle.await.unwrap());
        }
        counts.sort();
        assert_eq!(counts, (1..=8).collect::<Vec<_>>());
    }
}
