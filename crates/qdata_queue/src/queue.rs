//! A generic durable FIFO queue, generalized from the teacher's single
//! concrete `cf_processing_queue` job table into one shape reused for both
//! the task queue (C2) and the response queue (C3): atomic claim via
//! `UPDATE ... WHERE status = 'QUEUED'`, per-message ack, and a lease
//! sweep that requeues rows abandoned by a dead consumer (there is no
//! socket to observe disconnecting, the way a broker would, since this is
//! a polled table).

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{Pool, Row, Sqlite};
use tracing::{info, warn};

use crate::error::Result;

/// A row claimed off a [`DurableQueue`], ready to be processed and then
/// acked, failed, or left to the lease sweep.
#[derive(Debug, Clone)]
pub struct ClaimedMessage<T> {
    pub id: i64,
    pub payload: T,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueStats {
    pub queued: i64,
    pub running: i64,
}

/// A durable queue backed by one SQLite table. `table` must be a constant
/// known at construction time (from [`qdata_protocol::defaults`]), never
/// user input, since it is interpolated directly into SQL.
pub struct DurableQueue<T> {
    pool: Pool<Sqlite>,
    table: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T> Clone for DurableQueue<T> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            table: self.table,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<T> DurableQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    /// Wrap a pool for use as a queue backed by `table`. Callers must have
    /// already run [`ensure_schema`] against this pool.
    pub fn new(pool: Pool<Sqlite>, table: &'static str) -> Self {
        Self {
            pool,
            table,
            _marker: std::marker::PhantomData,
        }
    }

    pub async fn publish(&self, payload: &T) -> Result<i64> {
        let body = serde_json::to_string(payload)?;
        let now = Utc::now().to_rfc3339();
        let row = sqlx::query(&format!(
            "INSERT INTO {} (payload, status, created_at) VALUES (?, 'QUEUED', ?)",
            self.table
        ))
        .bind(&body)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(row.last_insert_rowid())
    }

    /// Atomically claim the oldest queued row, marking it `RUNNING`.
    /// Returns `None` if the queue is empty (the caller should back off
    /// and poll again).
    pub async fn claim(&self) -> Result<Option<ClaimedMessage<T>>> {
        let mut tx = self.pool.begin().await?;

        let row_id: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM {} WHERE status = 'QUEUED' ORDER BY id ASC LIMIT 1",
            self.table
        ))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row_id) = row_id else {
            tx.commit().await?;
            return Ok(None);
        };

        let now = Utc::now().to_rfc3339();
        let rows_affected = sqlx::query(&format!(
            "UPDATE {} SET status = 'RUNNING', claimed_at = ? WHERE id = ? AND status = 'QUEUED'",
            self.table
        ))
        .bind(&now)
        .bind(row_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            // Raced with another consumer; let them have it.
            tx.commit().await?;
            return Ok(None);
        }

        let payload_text: String = sqlx::query_scalar(&format!(
            "SELECT payload FROM {} WHERE id = ?",
            self.table
        ))
        .bind(row_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        let payload: T = serde_json::from_str(&payload_text)?;
        Ok(Some(ClaimedMessage {
            id: row_id,
            payload,
        }))
    }

    /// Ack a successfully-processed message, removing it from the table.
    pub async fn ack(&self, id: i64) -> Result<()> {
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?", self.table))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a message back to `QUEUED` for redelivery, e.g. after a
    /// consumer-side failure that should be retried.
    pub async fn requeue(&self, id: i64) -> Result<()> {
        sqlx::query(&format!(
            "UPDATE {} SET status = 'QUEUED', claimed_at = NULL WHERE id = ?",
            self.table
        ))
        .bind(id)
        .execute(&self.pool)
        .await?;
        info!(table = self.table, id, "requeued message");
        Ok(())
    }

    /// Requeue every `RUNNING` row whose `claimed_at` is older than
    /// `lease_timeout_secs` — the polled-table equivalent of redelivering
    /// a broker message whose consumer disconnected without acking.
    pub async fn sweep_abandoned(&self, lease_timeout_secs: i64) -> Result<u64> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(lease_timeout_secs)).to_rfc3339();
        let result = sqlx::query(&format!(
            "UPDATE {} SET status = 'QUEUED', claimed_at = NULL \
             WHERE status = 'RUNNING' AND claimed_at < ?",
            self.table
        ))
        .bind(&cutoff)
        .execute(&self.pool)
        .await?;
        let affected = result.rows_affected();
        if affected > 0 {
            warn!(table = self.table, affected, "swept abandoned claims");
        }
        Ok(affected)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(&format!(
            "SELECT \
                (SELECT COUNT(*) FROM {table} WHERE status = 'QUEUED') AS queued, \
                (SELECT COUNT(*) FROM {table} WHERE status = 'RUNNING') AS running",
            table = self.table
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(QueueStats {
            queued: row.try_get("queued")?,
            running: row.try_get("running")?,
        })
    }

    /// Number of queued rows still waiting, used by the startup drain pass
    /// to decide when it has caught up (the equivalent of the original's
    /// `get_waiting_message_count() == 0` termination check).
    pub async fn waiting_count(&self) -> Result<i64> {
        Ok(self.stats().await?.queued)
    }
}

/// Create the backing table for a [`DurableQueue`] if it does not already
/// exist. `table` must be a trusted constant.
pub async fn ensure_table(pool: &Pool<Sqlite>, table: &str) -> Result<()> {
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            payload TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'QUEUED',
            claimed_at TEXT,
            created_at TEXT NOT NULL
        )"
    ))
    .execute(pool)
    .await?;
    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_status ON {table} (status)"
    ))
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use sqlx::sqlite::SqlitePoolOptions;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
    struct Payload {
        value: String,
    }

    async fn setup() -> DurableQueue<Payload> {
        let pool = SqlitePoolOptions::new()
            .connect(":memory:")
            .await
            .unwrap();
        ensure_table(&pool, "test_queue").await.unwrap();
        DurableQueue::new(pool, "test_queue")
    }

    #[tokio::test]
    async fn claim_is_fifo_and_empty_queue_returns_none() {
        let queue = setup().await;
        assert!(queue.claim().await.unwrap().is_none());

        queue
            .publish(&Payload {
                value: "first".into(),
            })
            .await
            .unwrap();
        queue
            .publish(&Payload {
                value: "second".into(),
            })
            .await
            .unwrap();

        let claimed = queue.claim().await.unwrap().unwrap();
        assert_eq!(claimed.payload.value, "first");
    }

    #[tokio::test]
    async fn claimed_row_is_not_claimed_twice() {
        let queue = setup().await;
        queue
            .publish(&Payload {
                value: "only".into(),
            })
            .await
            .unwrap();

        let first = queue.claim().await.unwrap();
        assert!(first.is_some());
        let second = queue.claim().await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn ack_removes_the_row() {
        let queue = setup().await;
        let id = queue
            .publish(&Payload {
                value: "x".into(),
            })
            .await
            .unwrap();
        queue.ack(id).await.unwrap();
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.running, 0);
    }

    #[tokio::test]
    async fn requeue_makes_it_claimable_again() {
        let queue = setup().await;
        queue
            .publish(&Payload {
                value: "x".into(),
            })
            .await
            .unwrap();
        let claimed = queue.claim().await.unwrap().unwrap();
        queue.requeue(claimed.id).await.unwrap();
        let reclaimed = queue.claim().await.unwrap();
        assert!(reclaimed.is_some());
    }

    #[tokio::test]
    async fn sweep_requeues_only_stale_claims() {
        let queue = setup().await;
        queue
            .publish(&Payload {
                value: "x".into(),
            })
            .await
            .unwrap();
        queue.claim().await.unwrap();

        // Lease timeout of 0 means "claimed at or before now" counts as
        // stale immediately.
        let swept = queue.sweep_abandoned(-1).await.unwrap();
        assert_eq!(swept, 1);
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.queued, 1);
    }

    #[tokio::test]
    async fn waiting_count_tracks_queued_rows() {
        let queue = setup().await;
        assert_eq!(queue.waiting_count().await.unwrap(), 0);
        queue
            .publish(&Payload {
                value: "x".into(),
            })
            .await
            .unwrap();
        assert_eq!(queue.waiting_count().await.unwrap(), 1);
    }
}
