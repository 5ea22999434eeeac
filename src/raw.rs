//! The raw LZ4 block format.
//!
//! Frames delegate the actual (de)compression of every block to `lz4_flex`; this module is the
//! only place that talks to it. A block that would grow when compressed is stored as-is by the
//! frame layer instead, so the compressed path here never has to fit a negative ratio.

use lz4_flex::block::{self, CompressError, DecompressError};

/// Upper bound on the compressed size of `len` input bytes, as defined by the reference
/// `LZ4_COMPRESSBOUND` macro.
pub const fn block_bound(len: usize) -> usize {
    len + len / 255 + 16
}

/// Scratch space `compress_block` needs for `len` input bytes.
pub const fn scratch_size(len: usize) -> usize {
    block::get_maximum_output_size(len)
}

/// Compresses `input` into `output`, optionally referencing `dict` (the trailing 64KiB matter).
///
/// Returns `None` when the compressed form is not smaller than the input.
pub fn compress_block(input: &[u8], dict: &[u8], output: &mut [u8]) -> Result<Option<usize>, CompressError> {
    // lz4_flex ignores dictionaries this short anyway
    let written = if dict.len() > 3 {
        block::compress_into_with_dict(input, output, dict)?
    } else {
        block::compress_into(input, output)?
    };
    Ok(if written < input.len() { Some(written) } else { None })
}

/// Decompresses one block into `output`, which bounds the decompressed size.
///
/// Back-references may reach into `dict`, which holds the data that logically precedes the block.
pub fn decompress_block(input: &[u8], dict: &[u8], output: &mut [u8]) -> Result<usize, DecompressError> {
    if dict.is_empty() {
        block::decompress_into(input, output)
    } else {
        block::decompress_into_with_dict(input, output, dict)
    }
}
