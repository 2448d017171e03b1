use crate::TileComputer;
use tilewonder_core::{TileBuffer, TileRequest};

/// Squared escape radius: an orbit with `|z|^2` above this never returns.
pub const ESCAPE_RADIUS_SQ: f64 = 160_000.0;

/// Iteration at which the first orbit snapshot is taken. Later snapshots double it.
const FIRST_ORBIT_CHECKPOINT: u32 = 8;

const MAX_CHANNEL: f64 = 255.0;

/// Escape-time Mandelbrot kernel using f64 arithmetic.
#[derive(Clone, Copy, Debug, Default)]
pub struct MandelbrotComputer;

impl TileComputer for MandelbrotComputer {
    fn compute(&self, request: &TileRequest, scale: u32) -> TileBuffer {
        compute_tile(
            request.min_x,
            request.min_y,
            request.pixel_size,
            request.tile_size,
            request.max_iterations,
            scale,
        )
    }
}

/// Compute the RGBA pixels of one tile.
///
/// Pixel `(row, col)` samples `C = (min_x + row * pixel_size) + (min_y + col * pixel_size)i`
/// and is written at byte `((col * tile_size) + row) * 4`. This column-major layout
/// transposes the tile relative to row-major images; callers uploading the buffer
/// must account for it.
///
/// With `scale > 1` only the first pixel of every `scale x scale` block is
/// iterated and its colour fills the whole block (clipped at the tile edge).
/// The buffer always has `tile_size * tile_size * 4` bytes.
pub fn compute_tile(
    min_x: f64,
    min_y: f64,
    pixel_size: f64,
    tile_size: u32,
    max_iterations: u32,
    scale: u32,
) -> TileBuffer {
    debug_assert!(tile_size > 0, "tile_size must be non-zero");
    debug_assert!(scale > 0, "scale must be non-zero");

    let scale = scale.max(1);
    let mut buffer = TileBuffer::blank(tile_size);
    let pixels = buffer.as_bytes_mut();

    for block_col in (0..tile_size).step_by(scale as usize) {
        let cy = min_y + (block_col as f64 * pixel_size);
        let col_end = block_col.saturating_add(scale).min(tile_size);

        for block_row in (0..tile_size).step_by(scale as usize) {
            let cx = min_x + (block_row as f64 * pixel_size);
            let row_end = block_row.saturating_add(scale).min(tile_size);

            let rgba = colorize(escape_time(cx, cy, max_iterations), max_iterations);

            for col in block_col..col_end {
                for row in block_row..row_end {
                    let offset = TileBuffer::pixel_offset(tile_size, row, col);
                    pixels[offset..offset + 4].copy_from_slice(&rgba);
                }
            }
        }
    }

    buffer
}

/// Number of iterations before the orbit of `C = cx + cy*i` escapes, or
/// `max_iterations` for points judged to be inside the set.
///
/// Iteration `n` (0-based) computes `z_{n+1}`; the returned count is the `n` at
/// which `|z|^2` first exceeds [`ESCAPE_RADIUS_SQ`]. Orbits that land exactly on
/// the last snapshot are cyclic and reported as interior right away. Snapshots
/// are taken at iterations 8, 16, 32, ...
pub fn escape_time(cx: f64, cy: f64, max_iterations: u32) -> u32 {
    let mut zx = 0.0_f64;
    let mut zy = 0.0_f64;
    let mut zx_sq = 0.0_f64;
    let mut zy_sq = 0.0_f64;

    let mut orbit_x = 0.0_f64;
    let mut orbit_y = 0.0_f64;
    let mut checkpoint = FIRST_ORBIT_CHECKPOINT;

    for n in 0..max_iterations {
        // z = z^2 + c, with the squares carried over from the previous iteration
        zy = 2.0 * zx * zy + cy;
        zx = zx_sq - zy_sq + cx;
        zx_sq = zx * zx;
        zy_sq = zy * zy;

        if zx_sq + zy_sq > ESCAPE_RADIUS_SQ {
            return n;
        }

        if zx == orbit_x && zy == orbit_y {
            return max_iterations;
        }

        if n == checkpoint {
            orbit_x = zx;
            orbit_y = zy;
            checkpoint = checkpoint.saturating_mul(2);
        }
    }

    max_iterations
}

/// Colour for an escape time.
///
/// Interior points are transparent black. Exterior points follow a three-band ramp
/// over `c = 3 * ln(n) / ln(max_iterations - 1)`: blue rises over `[0, 1)`, green
/// over `[1, 2)`, red over `[2, 3]`.
pub fn colorize(iterations: u32, max_iterations: u32) -> [u8; 4] {
    if iterations == max_iterations {
        return [0, 0, 0, 0];
    }

    let c = 3.0 * (iterations as f64).ln() / (max_iterations as f64 - 1.0).ln();

    if c < 1.0 {
        [0, 0, channel(c), 255]
    } else if c < 2.0 {
        [0, channel(c - 1.0), 255, 255]
    } else {
        [channel(c - 2.0), 255, 255, 255]
    }
}

/// Scale a band fraction to a channel value. `as` truncates and saturates, so
/// `-inf` (from `ln(0)`) and NaN both map to 0.
#[inline]
fn channel(fraction: f64) -> u8 {
    (MAX_CHANNEL * fraction) as u8
}
