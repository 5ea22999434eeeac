use std::io;
use thiserror::Error;

/// Why a frame header was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderFault {
    #[error("header checksum mismatch (stored {stored:#04x}, computed {computed:#04x})")]
    ChecksumMismatch { stored: u8, computed: u8 },
    #[error("frame version {0} not supported")]
    UnsupportedVersion(u8),
    #[error("reserved bits in the FLG byte are set")]
    ReservedFlagBitsSet,
    #[error("reserved bits in the BD byte are set")]
    ReservedBdBitsSet,
}

/// Why a data block was rejected.
#[derive(Error, Debug)]
pub enum BlockFault {
    #[error("block checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("the raw LZ4 decompression failed: {0}")]
    Undecodable(lz4_flex::block::DecompressError),
}

/// Why the frame as a whole was rejected after its last block.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFault {
    #[error("content checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },
    #[error("header declared {declared} bytes of content but the frame holds {actual}")]
    SizeMismatch { declared: u64, actual: u64 },
}

/// Everything that can go wrong while encoding or decoding an LZ4 frame.
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("could not allocate {bytes} bytes")]
    AllocationFailed { bytes: usize },
    /// Recoverable: supply at least `needed` more bytes and try again.
    #[error("input ended early, at least {needed} more bytes are needed")]
    TruncatedInput { needed: usize },
    #[error("wrong magic number in frame header: {0:08x}")]
    WrongMagic(u32),
    #[error("corrupt frame header: {0}")]
    CorruptHeader(HeaderFault),
    #[error("corrupt block: {0}")]
    CorruptBlock(BlockFault),
    #[error("corrupt frame content: {0}")]
    CorruptContent(ContentFault),
    #[error("block declares {declared} bytes but the frame allows at most {capacity}")]
    OversizedBlock { declared: usize, capacity: usize },
    #[error("the frame header names block size id {0}, which is reserved")]
    UnknownBlockSizeId(u8),
    #[error("block size id {0} is not one of 4, 5, 6 or 7")]
    InvalidBlockSizeId(u8),
    #[error("block size of {0} bytes is not one of 64KiB, 256KiB, 1MiB or 4MiB")]
    InvalidBlockSize(usize),
    #[error("a frame header is already partially decoded")]
    HeaderInProgress,
    #[error("a frame is already open on this context")]
    FrameAlreadyOpen,
    #[error("no frame is open on this context")]
    FrameNotOpen,
    #[error("frame was declared to hold {declared} bytes but {actual} were written")]
    ContentSizeMismatch { declared: u64, actual: u64 },
    #[error("the raw LZ4 compression failed: {0}")]
    Compress(lz4_flex::block::CompressError),
    #[error("i/o error")]
    Io(#[from] io::Error),
}

impl FrameError {
    /// Whether feeding more input to the same context can still succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::TruncatedInput { .. })
    }
}

impl From<FrameError> for io::Error {
    fn from(e: FrameError) -> io::Error {
        match e {
            FrameError::Io(e) => e,
            e @ FrameError::TruncatedInput { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            e => io::Error::new(io::ErrorKind::Other, e),
        }
    }
}
