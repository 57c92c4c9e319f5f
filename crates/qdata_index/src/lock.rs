//! A fencing-token distributed lock over Redis, the Rust equivalent of the
//! original service's `python-redis-lock`-based `Lock` context manager
//! (`"task-%s" % task_uri`).

use std::time::Duration;

use rand::Rng;
use redis::aio::MultiplexedConnection;

use crate::error::Result;

const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

const ACQUIRE_RETRY_DELAY_MS: u64 = 25;

/// A held lock on `task-<fingerprint>`. Dropping this without calling
/// [`Lock::release`] leaves the lock to expire on its own via the TTL —
/// the same "crashed holder doesn't wedge a fingerprint forever" property
/// the original's TTL-backed lock gave.
pub struct Lock {
    key: String,
    token: String,
}

pub async fn acquire(
    conn: &mut MultiplexedConnection,
    fingerprint_hex: &str,
    ttl: Duration,
    timeout: Duration,
) -> Result<Lock> {
    let key = format!("task-{fingerprint_hex}");
    let token: String = {
        let mut rng = rand::thread_rng();
        (0..16).map(|_| format!("{:x}", rng.gen_range(0..16))).collect()
    };

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let acquired: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(conn)
            .await?;
        if acquired.is_some() {
            return Ok(Lock { key, token });
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(crate::error::IndexError::LockTimeout(fingerprint_hex.to_string()));
        }
        tokio::time::sleep(Duration::from_millis(ACQUIRE_RETRY_DELAY_MS)).await;
    }
}

impl Lock {
    pub async fn release(self, conn: &mut MultiplexedConnection) -> Result<()> {
        let script = redis::Script::new(RELEASE_SCRIPT);
        let _: i32 = script.key(&self.key).arg(&self.token).invoke_async(conn).await?;
        Ok(())
    }
}
