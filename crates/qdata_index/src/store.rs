//! The coalescing index (C1): `append_and_count` / `drain` over a
//! per-fingerprint wait set, each call serialized by the fencing-token
//! lock in [`crate::lock`].

use std::time::Duration;

use async_trait::async_trait;
use qdata_protocol::TaskFingerprint;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::Result;
use crate::lock;

/// Abstraction over the coalescing index backend, so the worker pool can
/// be tested against an in-memory double instead of a real Redis server.
#[async_trait]
pub trait WaitSetStore: Send + Sync {
    /// Append `ssid` to the wait set for `fingerprint` and return the
    /// resulting set size. A result of `1` means the caller is the first
    /// waiter and must enqueue the task; any other value means an
    /// identical task is already in flight and the caller should simply
    /// wait for the fan-out response.
    async fn append_and_count(&self, fingerprint: &TaskFingerprint, ssid: &str) -> Result<usize>;

    /// Atomically read and clear the wait set for `fingerprint`.
    async fn drain(&self, fingerprint: &TaskFingerprint) -> Result<Vec<String>>;
}

/// Redis-backed [`WaitSetStore`], grounded on the original service's
/// `add_to_task_l_and_check_qlen` / `pop_ssids_from_redis` pair: a Redis
/// list keyed by fingerprint, mutated only while holding `task-<fp>`.
pub struct RedisWaitSetStore {
    client: redis::Client,
    lock_ttl: Duration,
    lock_timeout: Duration,
}

impl RedisWaitSetStore {
    pub fn new(redis_url: &str, lock_ttl: Duration) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            lock_ttl,
            lock_timeout: Duration::from_secs(10),
        })
    }
}

#[async_trait]
impl WaitSetStore for RedisWaitSetStore {
    async fn append_and_count(&self, fingerprint: &TaskFingerprint, ssid: &str) -> Result<usize> {
        let fp_hex = fingerprint.to_hex();
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let held = lock::acquire(&mut conn, &fp_hex, self.lock_ttl, self.lock_timeout).await?;

        let _: () = conn.rpush(&fp_hex, ssid).await?;
        let count: usize = conn.llen(&fp_hex).await?;

        held.release(&mut conn).await?;
        debug!(fingerprint = %fp_hex, count, "appended to wait set");
        Ok(count)
    }

    async fn drain(&self, fingerprint: &TaskFingerprint) -> Result<Vec<String>> {
        let fp_hex = fingerprint.to_hex();
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let held = lock::acquire(&mut conn, &fp_hex, self.lock_ttl, self.lock_timeout).await?;

        let ssids: Vec<String> = conn.lrange(&fp_hex, 0, -1).await?;
        let _: () = conn.del(&fp_hex).await?;

        held.release(&mut conn).await?;
        debug!(fingerprint = %fp_hex, count = ssids.len(), "drained wait set");
        Ok(ssids)
    }
}
