use tilewonder_core::{TileBuffer, TileRequest};

/// Turns a tile request into pixels at a given downsample factor.
///
/// Implementations must be deterministic and always return a buffer of
/// `request.buffer_len()` bytes. A `scale` of `s` means one sample per `s x s`
/// pixel block; `scale == 1` is full resolution.
pub trait TileComputer: Send + 'static {
    fn compute(&self, request: &TileRequest, scale: u32) -> TileBuffer;
}
