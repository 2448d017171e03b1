use crate::{max_iterations_for_zoom, tile_region, TileError};
use serde::{Deserialize, Serialize};

/// Request identifier, assigned sequentially by the worker pool.
pub type TileId = u64;

/// Region of the complex plane to compute for one square tile.
///
/// Pixel `(row, col)` samples `C = (min_x + row * pixel_size) + (min_y + col * pixel_size)i`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileRequest {
    pub min_x: f64,
    pub min_y: f64,
    pub pixel_size: f64,
    pub tile_size: u32,
    pub max_iterations: u32,
}

impl TileRequest {
    pub fn new(
        min_x: f64,
        min_y: f64,
        pixel_size: f64,
        tile_size: u32,
        max_iterations: u32,
    ) -> Self {
        Self {
            min_x,
            min_y,
            pixel_size,
            tile_size,
            max_iterations,
        }
    }

    /// Request for the tile at grid position `(row, col)` at the given zoom level,
    /// with the iteration budget scaled to the zoom.
    pub fn for_tile(row: i64, col: i64, zoom_level: f64, tile_size: u32) -> Self {
        let region = tile_region(row, col, zoom_level, tile_size);
        Self {
            min_x: region.min_x,
            min_y: region.min_y,
            pixel_size: region.pixel_size,
            tile_size,
            max_iterations: max_iterations_for_zoom(zoom_level),
        }
    }

    /// Check the kernel preconditions.
    pub fn validate(&self) -> Result<(), TileError> {
        if self.tile_size == 0 {
            return Err(TileError::ZeroTileSize);
        }
        if !self.pixel_size.is_finite() || self.pixel_size <= 0.0 {
            return Err(TileError::InvalidPixelSize(self.pixel_size));
        }
        if !self.min_x.is_finite() || !self.min_y.is_finite() {
            return Err(TileError::NonFiniteOrigin {
                min_x: self.min_x,
                min_y: self.min_y,
            });
        }
        if self.max_iterations == 0 {
            return Err(TileError::ZeroIterations);
        }
        Ok(())
    }

    /// Length in bytes of the RGBA buffer computed for this request.
    pub fn buffer_len(&self) -> usize {
        TileBuffer::byte_len(self.tile_size)
    }
}

/// A request paired with the id the pool assigned to it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileTask {
    pub id: TileId,
    pub request: TileRequest,
}

impl TileTask {
    pub fn new(id: TileId, request: TileRequest) -> Self {
        Self { id, request }
    }
}

/// RGBA8 pixels for one tile, `tile_size * tile_size * 4` bytes.
///
/// Pixels are stored column-major: pixel `(row, col)` starts at byte
/// `(col * tile_size + row) * 4`, where `row` advances along the real axis and
/// `col` along the imaginary axis.
///
/// An empty buffer is the cancellation sentinel handed to callers whose request
/// was cancelled before it completed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBuffer {
    tile_size: u32,
    pixels: Vec<u8>,
}

impl TileBuffer {
    /// Zero-filled (fully transparent) buffer for a tile of the given size.
    pub fn blank(tile_size: u32) -> Self {
        Self {
            tile_size,
            pixels: vec![0; Self::byte_len(tile_size)],
        }
    }

    /// Wrap existing pixel bytes, checking the length.
    pub fn from_pixels(tile_size: u32, pixels: Vec<u8>) -> Result<Self, TileError> {
        let expected = Self::byte_len(tile_size);
        if pixels.len() != expected {
            return Err(TileError::BufferLength {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { tile_size, pixels })
    }

    /// The cancellation sentinel.
    pub fn cancelled() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Byte length of a full buffer for `tile_size`.
    pub fn byte_len(tile_size: u32) -> usize {
        let side = tile_size as usize;
        side * side * 4
    }

    /// Byte offset of pixel `(row, col)`.
    #[inline]
    pub fn pixel_offset(tile_size: u32, row: u32, col: u32) -> usize {
        ((col as usize * tile_size as usize) + row as usize) * 4
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// RGBA value of pixel `(row, col)`, or `None` outside the tile.
    pub fn pixel(&self, row: u32, col: u32) -> Option<[u8; 4]> {
        if row >= self.tile_size || col >= self.tile_size {
            return None;
        }
        let offset = Self::pixel_offset(self.tile_size, row, col);
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[offset..offset + 4]);
        Some(rgba)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }
}
