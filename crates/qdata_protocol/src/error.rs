//! Error type for the wire protocol between gateway, queues and workers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid fingerprint hex string: {0}")]
    InvalidFingerprintHex(String),

    #[error("unrecognized task kind: {0}")]
    UnknownKind(String),

    #[error("unparsable client version: {0}")]
    InvalidVersion(String),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
