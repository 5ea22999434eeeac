//! The LZ4 frame format: a self-describing container around raw LZ4 blocks.

mod compress;
mod decompress;
mod error;
mod header;
mod io;
mod oneshot;

/// The four magic bytes at the start of every LZ4 frame.
const MAGIC: u32 = 0x184D2204;
/// The frame format sets the high bit of every length field to indicate that the data was not compressed.
const INCOMPRESSIBLE: u32 = 1 << 31;
/// The LZ4 raw format maintains a lookback window of exactly 64KiB.
const WINDOW_SIZE: usize = 64 * 1024;
/// A block length field of zero terminates the block sequence.
const END_MARK: u32 = 0;

pub use compress::*;
pub use decompress::*;
pub use error::*;
pub use header::{capacity_for, BlockSizeId, Flags, FrameDescriptor, MAX_HEADER_LEN, MIN_HEADER_LEN};
pub use io::*;
pub use oneshot::*;

/// An empty buffer with room for `bytes`.
fn reserve_buffer(bytes: usize) -> Result<Vec<u8>, FrameError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(bytes).map_err(|_| FrameError::AllocationFailed { bytes })?;
    Ok(buffer)
}

/// Appends `data` to a lookback window, keeping only the trailing `WINDOW_SIZE` bytes.
fn slide_window(window: &mut Vec<u8>, data: &[u8]) {
    if data.len() >= WINDOW_SIZE {
        window.clear();
        window.extend_from_slice(&data[data.len() - WINDOW_SIZE..]);
    } else {
        let available_bytes = window.len() + data.len();
        if let Some(surplus_bytes) = available_bytes.checked_sub(WINDOW_SIZE) {
            // remove as many bytes from front as we are replacing
            window.drain(..surplus_bytes);
        }
        window.extend_from_slice(data);
    }
    debug_assert!(window.len() <= WINDOW_SIZE);
}
