//! LZ4 frame format encoder and decoder.
//!
//! Frames wrap raw LZ4 blocks in a self-describing container with a header, size-limited
//! blocks and optional xxHash32 checksums. Both directions are driven by explicit contexts:
//! `CompressionContext` produces frames (in one call or incrementally), and
//! `DecompressionContext` decodes them from input chunks of any size, resuming exactly where
//! the previous chunk ended.
//!
//! ```
//! use lz4_framed::framed::{compress_frame, DecompressionContext};
//!
//! let frame = compress_frame(b"hello world").unwrap();
//! let mut ctx = DecompressionContext::new();
//! let mut plain = Vec::new();
//! for chunk in frame.chunks(3) {
//!     let d = ctx.decompress(chunk, usize::MAX).unwrap();
//!     assert_eq!(d.consumed, chunk.len());
//!     plain.extend(d.data);
//! }
//! assert_eq!(plain, b"hello world");
//! ctx.finish().unwrap();
//! ```

#![forbid(unsafe_code)]
#![allow(non_upper_case_globals)]

pub mod framed;
mod raw;

pub use framed::{
    compress_frame, compress_frame_bound, compress_frame_with, decompress_frame, CompressionContext,
    CompressionSettings, DecompressionContext, FrameError,
};
