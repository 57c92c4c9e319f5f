//! Wire types for the request-coalescing dispatch fabric.
//!
//! Shared between the gateway (C5), the coalescing index (C1), the durable
//! queues (C2/C3) and the worker pool (C4) so that every component agrees
//! on how a request is normalized and fingerprinted.

pub mod defaults;
pub mod error;
pub mod fingerprint;
pub mod types;

pub use error::{ProtocolError, Result};
pub use fingerprint::TaskFingerprint;
pub use types::{
    Instruments, JobOutcome, ResponseEnvelope, ResponseStatus, TaskEnvelope, TaskKind, TaskRequest,
};
