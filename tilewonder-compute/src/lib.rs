pub mod computer;
pub mod mandelbrot;
pub mod pipeline;
pub mod stats;
pub mod worker;

pub use computer::TileComputer;
pub use mandelbrot::{colorize, compute_tile, escape_time, MandelbrotComputer, ESCAPE_RADIUS_SQ};
pub use pipeline::{RefinementPipeline, RefinementStage, StageOutput};
pub use stats::ComputeStats;
pub use worker::{spawn_worker, WorkerHandle};

// Re-export core types for convenience
pub use tilewonder_core::*;
