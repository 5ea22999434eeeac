use fehler::{throw, throws};

use super::compress::{CompressionContext, CompressionSettings};
use super::decompress::{DecompressionContext, Status};
use super::error::FrameError;

type Error = FrameError;

/// Compresses `src` into a single frame with default settings.
#[throws]
pub fn compress_frame(src: &[u8]) -> Vec<u8> {
    compress_frame_with(&CompressionSettings::default(), src)?
}

#[throws]
pub fn compress_frame_with(settings: &CompressionSettings, src: &[u8]) -> Vec<u8> {
    CompressionContext::with_settings(settings.clone())?.compress_frame(src)?
}

/// Largest frame `compress_frame_with` can produce for `len` bytes of input.
pub fn compress_frame_bound(len: usize, settings: &CompressionSettings) -> usize {
    settings.frame_bound(len)
}

/// Decompresses one or more concatenated frames (skippable ones included) held entirely in
/// `src`.
///
/// Fails with `TruncatedInput` if `src` ends inside a frame.
#[throws]
pub fn decompress_frame(src: &[u8]) -> Vec<u8> {
    let mut context = DecompressionContext::new();
    let mut plaintext = Vec::new();
    let mut pos = 0;
    loop {
        let decompressed = context.decompress(&src[pos..], usize::MAX)?;
        pos += decompressed.consumed;
        plaintext.extend_from_slice(&decompressed.data);
        match decompressed.status {
            Status::FrameDone if pos == src.len() => break,
            Status::FrameDone | Status::OutputPending => {}
            Status::NeedInput(needed) => throw!(Error::TruncatedInput { needed }),
        }
    }
    plaintext
}
