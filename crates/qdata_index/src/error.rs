use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("could not acquire lock for fingerprint {0} within the timeout")]
    LockTimeout(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
