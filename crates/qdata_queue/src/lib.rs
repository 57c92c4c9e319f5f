//! Durable FIFO queues backing the task queue (C2) and response queue
//! (C3): at-least-once delivery with per-message ack, atomic claim, and a
//! lease sweep for consumers that die mid-job.

pub mod error;
pub mod queue;

pub use error::{QueueError, Result};
pub use queue::{ensure_table, ClaimedMessage, DurableQueue, QueueStats};

use sqlx::sqlite::{SqlitePoolOptions, SqliteConnectOptions};
use sqlx::Pool;
use sqlx::Sqlite;
use std::str::FromStr;

/// Connect to the queue database, creating the SQLite file if needed.
pub async fn connect_pool(database_url: &str) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(QueueError::Db)?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .map_err(QueueError::Db)?;
    Ok(pool)
}

/// Create both the task-queue and response-queue tables on a fresh pool.
pub async fn ensure_schema(pool: &Pool<Sqlite>) -> Result<()> {
    ensure_table(pool, qdata_protocol::defaults::TASK_QUEUE_TABLE).await?;
    ensure_table(pool, qdata_protocol::defaults::RESPONSE_QUEUE_TABLE).await?;
    Ok(())
}
