//! Validation error types shared by the compute and worker crates.

use thiserror::Error;

/// A tile request or buffer that violates the kernel's preconditions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileError {
    #[error("tile size must be non-zero")]
    ZeroTileSize,

    #[error("pixel size must be finite and positive, got {0}")]
    InvalidPixelSize(f64),

    #[error("tile origin must be finite, got ({min_x}, {min_y})")]
    NonFiniteOrigin { min_x: f64, min_y: f64 },

    #[error("max iterations must be non-zero")]
    ZeroIterations,

    #[error("buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },
}

/// Invalid pool configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    #[error("refinement stage count must be in 1..={max}, got {stages}")]
    InvalidStageCount { stages: u32, max: u32 },

    #[error("failed to parse pool config: {0}")]
    Parse(#[from] serde_json::Error),
}
