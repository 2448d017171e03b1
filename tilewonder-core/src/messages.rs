use crate::{TileBuffer, TileId, TileRequest};
use serde::{Deserialize, Serialize};

/// Messages sent from the pool to a worker.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum MainToWorker {
    /// Queue a tile at the coarsest refinement stage.
    Task { id: TileId, request: TileRequest },

    /// Drop every queued task at every stage. A computation already running finishes.
    Clear,

    /// Stop the worker's run loop.
    Terminate,
}

/// Messages sent from a worker to the pool.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum WorkerToMain {
    /// One refinement stage of a tile finished.
    TileComplete {
        worker: usize,
        id: TileId,
        stage: u32,
        buffer: TileBuffer,
        is_final_stage: bool,
        compute_time_ms: f64,
    },
}
