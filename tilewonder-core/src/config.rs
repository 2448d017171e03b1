//! Pool configuration and tile-placement helpers.
//!
//! The helpers here are pure policy used by whatever drives the pool: where a
//! tile sits in the complex plane and how many iterations it gets at a zoom level.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of compute workers when not configured.
pub const DEFAULT_WORKER_COUNT: usize = 3;
/// Refinement stages per tile when not configured (scales 8, 4, 2, 1).
pub const DEFAULT_REFINEMENT_STAGES: u32 = 4;
/// Upper bound on refinement stages; the coarsest stage then samples every 128th pixel.
pub const MAX_REFINEMENT_STAGES: u32 = 8;
/// Edge length in pixels of a tile.
pub const DEFAULT_TILE_SIZE: u32 = 50;
/// Width of one pixel in the complex plane at zoom level 1.
pub const BASE_PIXEL_SIZE: f64 = 1.0 / 500.0;

/// Worker pool configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Number of coarse-to-fine stages each tile passes through (1 = full resolution only).
    pub refinement_stages: u32,
    /// How often blocking waits check that worker threads are still alive.
    pub liveness_interval_ms: u64,
}

/// Canonical defaults.
pub static DEFAULT_POOL_CONFIG: PoolConfig = PoolConfig {
    worker_count: DEFAULT_WORKER_COUNT,
    refinement_stages: DEFAULT_REFINEMENT_STAGES,
    liveness_interval_ms: 100,
};

impl Default for PoolConfig {
    fn default() -> Self {
        DEFAULT_POOL_CONFIG.clone()
    }
}

impl PoolConfig {
    /// Config with a single full-resolution stage per tile.
    pub fn non_pipelined(worker_count: usize) -> Self {
        Self {
            worker_count,
            refinement_stages: 1,
            ..Self::default()
        }
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.refinement_stages == 0 || self.refinement_stages > MAX_REFINEMENT_STAGES {
            return Err(ConfigError::InvalidStageCount {
                stages: self.refinement_stages,
                max: MAX_REFINEMENT_STAGES,
            });
        }
        Ok(())
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms.max(1))
    }
}

/// Complex-plane placement of one tile.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileRegion {
    pub min_x: f64,
    pub min_y: f64,
    pub pixel_size: f64,
}

/// Placement of the tile at grid `(row, col)`. Columns advance along the real
/// axis, rows along the imaginary axis.
pub fn tile_region(row: i64, col: i64, zoom_level: f64, tile_size: u32) -> TileRegion {
    let pixel_size = BASE_PIXEL_SIZE / zoom_level;
    let tile_span = tile_size as f64;

    TileRegion {
        min_x: col as f64 * tile_span * pixel_size,
        min_y: row as f64 * tile_span * pixel_size,
        pixel_size,
    }
}

/// Iteration budget for a zoom level: `floor(1000 * sqrt(zoom_level))`, at least 2.
///
/// The colour ramp divides by `ln(max_iterations - 1)`, which needs a budget of 2 or more.
pub fn max_iterations_for_zoom(zoom_level: f64) -> u32 {
    let budget = (1000.0 * zoom_level.sqrt()).floor();
    if budget.is_finite() && budget >= 2.0 {
        budget.min(u32::MAX as f64) as u32
    } else {
        2
    }
}
