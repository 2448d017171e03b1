//! Worker pool scheduling tile computations across compute threads.

pub mod error;
pub mod handle;
pub mod pool;
pub mod stats;

pub use error::PoolError;
pub use handle::TileHandle;
pub use pool::WorkerPool;
pub use stats::PoolStats;
