//! The worker pool (C4): startup drain, steady-state task processing with
//! per-job subprocess isolation, and lease-based redelivery.

pub mod child;
pub mod pool;

pub use pool::{WorkerPool, WorkerPoolConfig};
