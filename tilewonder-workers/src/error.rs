//! Worker pool error types.

use thiserror::Error;
use tilewonder_core::{ConfigError, TileError};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool has no workers")]
    NoWorkers,

    #[error("invalid pool config: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid tile request: {0}")]
    InvalidRequest(#[from] TileError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("worker {worker} is no longer accepting tasks")]
    WorkerDisconnected { worker: usize },

    #[error("worker {worker} stopped unexpectedly")]
    WorkerDied { worker: usize },

    #[error("all workers have stopped")]
    AllWorkersStopped,
}
