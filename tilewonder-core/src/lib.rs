pub mod config;
pub mod error;
pub mod messages;
pub mod tile;

pub use config::{
    max_iterations_for_zoom, tile_region, PoolConfig, TileRegion, BASE_PIXEL_SIZE,
    DEFAULT_POOL_CONFIG, DEFAULT_REFINEMENT_STAGES, DEFAULT_TILE_SIZE, DEFAULT_WORKER_COUNT,
    MAX_REFINEMENT_STAGES,
};
pub use error::{ConfigError, TileError};
pub use messages::{MainToWorker, WorkerToMain};
pub use tile::{TileBuffer, TileId, TileRequest, TileTask};
