use byteorder::{ByteOrder, LE};
use fehler::{throw, throws};
use std::cmp;
use std::hash::Hasher;
use tracing::{debug, trace};
use twox_hash::XxHash32;

use super::error::{BlockFault, ContentFault, FrameError};
use super::header::{self, FrameDescriptor, MAX_HEADER_LEN, MIN_HEADER_LEN};
use super::{slide_window, END_MARK, INCOMPRESSIBLE, WINDOW_SIZE};
use crate::raw;

type Error = FrameError; // do it this way for better docs

/// Magic number and FLG byte: enough to tell how long the header is.
const HEADER_PREFIX_LEN: usize = 5;

/// Where the decoder is within the current frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    AwaitingHeader,
    /// Waiting for a block size field or for block payload.
    AwaitingBlock,
    /// The payload is complete, its trailing checksum is not.
    AwaitingBlockChecksum,
    AwaitingContentChecksum,
    /// Inside a skippable frame.
    SkippingFrame,
    Done,
}

/// What a `decompress` call left unfinished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// The frame goes on. The value suggests how many bytes the next chunk should have;
    /// it is a sizing hint, any non-empty chunk makes progress.
    NeedInput(usize),
    /// Decoded data did not fit into `max_output`. Call again, the input may be empty.
    OutputPending,
    /// The frame is complete and all of its content has been returned.
    FrameDone,
}

/// The result of one `decompress` call.
#[derive(Debug)]
pub struct Decompressed {
    /// Decoded content, at most `max_output` bytes.
    pub data: Vec<u8>,
    /// How many bytes of the input were used. The caller passes the rest in again.
    pub consumed: usize,
    pub status: Status,
}

impl Decompressed {
    /// Advisory size of the next input chunk; 0 if no input is needed right now.
    pub fn next_hint(&self) -> usize {
        match self.status {
            Status::NeedInput(hint) => hint,
            _ => 0,
        }
    }

    pub fn is_frame_done(&self) -> bool {
        self.status == Status::FrameDone
    }

    /// For callers that passed the whole rest of their input: fails if the frame is cut short.
    #[throws]
    pub fn require_done(&self) {
        if let Status::NeedInput(needed) = self.status {
            throw!(Error::TruncatedInput { needed });
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct BlockInfo {
    len: usize,
    compressed: bool,
}

/// Resumable LZ4 frame decoder.
///
/// Feed it chunks of any size, from single bytes to several frames at once. Structures that
/// are split across calls are carried over in the context, so no byte has to be passed twice.
pub struct DecompressionContext {
    stage: Stage,
    descriptor: Option<FrameDescriptor>,
    capacity: usize,
    verify_checksums: bool,
    /// Carry buffer for headers, blocks and checksums that span calls.
    staging: Vec<u8>,
    block: Option<BlockInfo>,
    /// Reused for every block; sized to the largest capacity seen.
    decoded: Vec<u8>,
    decoded_len: usize,
    flushed: usize,
    window: Vec<u8>,
    dictionary: Vec<u8>,
    content_hasher: Option<XxHash32>,
    content_len: u64,
    skip_remaining: u64,
}

impl Default for DecompressionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DecompressionContext {
    pub fn new() -> Self {
        DecompressionContext {
            stage: Stage::AwaitingHeader,
            descriptor: None,
            capacity: 0,
            verify_checksums: true,
            staging: Vec::new(),
            block: None,
            decoded: Vec::new(),
            decoded_len: 0,
            flushed: 0,
            window: Vec::new(),
            dictionary: Vec::new(),
            content_hasher: None,
            content_len: 0,
            skip_remaining: 0,
        }
    }

    /// Block and content checksums are still read but no longer verified.
    pub fn disable_checksum(&mut self) {
        self.verify_checksums = false;
        self.content_hasher = None;
    }

    /// Data that was used as dictionary when compressing. Only the trailing 64 KiB matter.
    pub fn set_dictionary(&mut self, dict: &[u8]) {
        let start = dict.len().saturating_sub(WINDOW_SIZE);
        self.dictionary.clear();
        self.dictionary.extend_from_slice(&dict[start..]);
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The descriptor of the frame being (or last) decoded.
    pub fn frame_descriptor(&self) -> Option<FrameDescriptor> {
        self.descriptor
    }

    /// Block capacity negotiated from the last header seen, 0 before that.
    pub fn block_capacity(&self) -> usize {
        self.capacity
    }

    /// Drops any partially decoded frame. Buffers and settings are kept.
    pub fn reset(&mut self) {
        self.stage = Stage::AwaitingHeader;
        self.descriptor = None;
        self.staging.clear();
        self.block = None;
        self.decoded_len = 0;
        self.flushed = 0;
        self.window.clear();
        self.content_hasher = None;
        self.content_len = 0;
        self.skip_remaining = 0;
    }

    /// Releases the context. Equivalent to dropping it.
    pub fn close(self) {}

    /// Parses the frame header at the start of `src` without consuming it.
    ///
    /// The block capacity it announces is allocated right away, so the following
    /// `decompress` call cannot fail for lack of memory. Once the header has been decoded,
    /// the known descriptor is returned whatever `src` holds.
    #[throws]
    pub fn frame_info(&mut self, src: &[u8]) -> FrameDescriptor {
        match self.stage {
            Stage::AwaitingHeader | Stage::Done | Stage::SkippingFrame => {}
            _ => {
                if let Some(descriptor) = self.descriptor {
                    return descriptor;
                }
            }
        }
        if self.stage == Stage::AwaitingHeader && !self.staging.is_empty() {
            throw!(Error::HeaderInProgress);
        }

        let (descriptor, _) = FrameDescriptor::decode(src)?;
        self.allocate(descriptor.block_capacity())?;
        descriptor
    }

    /// Checks that the input ended on a frame boundary.
    #[throws]
    pub fn finish(&self) {
        let idle = self.stage == Stage::AwaitingHeader && self.staging.is_empty();
        if !idle && self.stage != Stage::Done {
            throw!(Error::TruncatedInput { needed: self.next_hint() });
        }
    }

    /// Decodes as much of `src` as possible, producing at most `max_output` bytes.
    ///
    /// The call stops early when the output is full or a frame ends; `consumed` tells how much
    /// of `src` was used. Running out of input in the middle of a frame is not an error: the
    /// partial structure is kept and the status is `NeedInput` with a hint for the next chunk.
    /// Truncation is only reported as `TruncatedInput` once the caller says the input is over,
    /// through `finish`, `Decompressed::require_done` or the one-shot `decompress_frame`.
    /// After any error the context is reset and can start over with a new frame.
    pub fn decompress(&mut self, src: &[u8], max_output: usize) -> Result<Decompressed, FrameError> {
        let mut data = Vec::new();
        match self.run(src, max_output, &mut data) {
            Ok(consumed) => Ok(Decompressed { data, consumed, status: self.status() }),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    #[throws]
    fn run(&mut self, src: &[u8], max_output: usize, out: &mut Vec<u8>) -> usize {
        let mut pos = 0;
        let mut finished_frame = false;
        loop {
            if self.flushed < self.decoded_len {
                let room = max_output - out.len();
                if room == 0 {
                    break;
                }
                let n = cmp::min(room, self.decoded_len - self.flushed);
                out.extend_from_slice(&self.decoded[self.flushed..self.flushed + n]);
                self.flushed += n;
                continue;
            }

            if self.stage == Stage::Done {
                // report the end of a frame before starting on the next one
                if finished_frame || pos == src.len() {
                    break;
                }
                self.reset();
            }
            if pos == src.len() {
                break;
            }

            let input = &src[pos..];
            pos += match self.stage {
                Stage::AwaitingHeader => self.read_header(input)?,
                Stage::AwaitingBlock | Stage::AwaitingBlockChecksum => self.read_block(input)?,
                Stage::AwaitingContentChecksum => self.read_content_checksum(input)?,
                Stage::SkippingFrame => self.skip(input),
                Stage::Done => 0,
            };
            finished_frame = self.stage == Stage::Done;
        }
        pos
    }

    fn status(&self) -> Status {
        if self.flushed < self.decoded_len {
            Status::OutputPending
        } else if self.stage == Stage::Done {
            Status::FrameDone
        } else {
            Status::NeedInput(self.next_hint())
        }
    }

    /// Bytes that would complete the structure currently being assembled. While a block is
    /// pending this includes the size field of the block after it.
    fn next_hint(&self) -> usize {
        let staged = self.staging.len();
        match self.stage {
            Stage::AwaitingHeader => match header::header_len(&self.staging) {
                Ok(Some(len)) => len - staged,
                _ => MIN_HEADER_LEN - staged,
            },
            Stage::AwaitingBlock | Stage::AwaitingBlockChecksum => match self.block {
                Some(block) => self.block_target(block) - staged + 4,
                None => 4 - staged,
            },
            Stage::AwaitingContentChecksum => 4 - staged,
            Stage::SkippingFrame => cmp::min(self.skip_remaining, usize::MAX as u64) as usize,
            Stage::Done => 0,
        }
    }

    #[throws]
    fn read_header(&mut self, input: &[u8]) -> usize {
        let mut consumed = 0;
        let len = if self.staging.is_empty() {
            header::header_len(input)?
        } else {
            if self.staging.len() < HEADER_PREFIX_LEN {
                consumed = cmp::min(HEADER_PREFIX_LEN - self.staging.len(), input.len());
                self.staging.extend_from_slice(&input[..consumed]);
            }
            header::header_len(&self.staging)?
        };
        let len = match len {
            Some(len) => len,
            None => {
                // shorter than any header, so all of it belongs to this one
                self.staging.extend_from_slice(&input[consumed..]);
                return input.len();
            }
        };

        let mut buf = [0u8; MAX_HEADER_LEN];
        let (n, complete) = gather(&mut self.staging, &input[consumed..], len);
        consumed += n;
        match complete {
            Some(bytes) => buf[..len].copy_from_slice(bytes),
            None => return consumed,
        }
        self.staging.clear();

        let magic = LE::read_u32(&buf);
        if header::is_skippable(magic) {
            self.skip_remaining = LE::read_u32(&buf[4..]).into();
            self.stage = if self.skip_remaining == 0 { Stage::Done } else { Stage::SkippingFrame };
            debug!(magic, len = self.skip_remaining, "skipping frame");
            return consumed;
        }

        let (descriptor, _) = FrameDescriptor::decode(&buf[..len])?;
        self.negotiate(descriptor)?;
        consumed
    }

    #[throws]
    fn negotiate(&mut self, descriptor: FrameDescriptor) {
        self.allocate(descriptor.block_capacity())?;
        self.window.clear();
        if !descriptor.block_independence {
            self.window.extend_from_slice(&self.dictionary);
        }
        self.content_hasher = if descriptor.content_checksum && self.verify_checksums {
            Some(XxHash32::with_seed(0))
        } else {
            None
        };
        self.content_len = 0;
        self.descriptor = Some(descriptor);
        self.stage = Stage::AwaitingBlock;
        debug!(
            block_size = self.capacity,
            independent = descriptor.block_independence,
            block_checksums = descriptor.block_checksums,
            content_checksum = descriptor.content_checksum,
            content_size = ?descriptor.content_size,
            "frame header decoded"
        );
    }

    #[throws]
    fn allocate(&mut self, capacity: usize) {
        if self.decoded.len() < capacity {
            let additional = capacity - self.decoded.len();
            self.decoded
                .try_reserve_exact(additional)
                .map_err(|_| Error::AllocationFailed { bytes: capacity })?;
            self.decoded.resize(capacity, 0);
        }
        // payload plus block checksum
        let staging = capacity + 4;
        if self.staging.capacity() < staging {
            let additional = staging - self.staging.len();
            self.staging
                .try_reserve_exact(additional)
                .map_err(|_| Error::AllocationFailed { bytes: staging })?;
        }
        self.capacity = capacity;
    }

    fn block_target(&self, block: BlockInfo) -> usize {
        let checksum = match self.descriptor {
            Some(d) if d.block_checksums => 4,
            _ => 0,
        };
        block.len + checksum
    }

    #[throws]
    fn read_block(&mut self, input: &[u8]) -> usize {
        let mut consumed = 0;
        let block = match self.block {
            Some(block) => block,
            None => {
                let (n, field) = gather(&mut self.staging, input, 4);
                consumed += n;
                let field = match field {
                    Some(bytes) => LE::read_u32(bytes),
                    None => return consumed,
                };
                self.staging.clear();

                if field == END_MARK {
                    self.end_blocks()?;
                    return consumed;
                }
                let len = (field & !INCOMPRESSIBLE) as usize;
                if len > self.capacity {
                    throw!(Error::OversizedBlock { declared: len, capacity: self.capacity });
                }
                let block = BlockInfo { len, compressed: field & INCOMPRESSIBLE == 0 };
                self.block = Some(block);
                block
            }
        };

        let target = self.block_target(block);
        let (n, complete) = gather(&mut self.staging, &input[consumed..], target);
        consumed += n;
        let bytes = match complete {
            Some(bytes) => bytes,
            None => {
                if self.staging.len() >= block.len {
                    self.stage = Stage::AwaitingBlockChecksum;
                }
                return consumed;
            }
        };

        let (payload, checksum) = bytes.split_at(block.len);
        if !checksum.is_empty() && self.verify_checksums {
            let stored = LE::read_u32(checksum);
            let mut hasher = XxHash32::with_seed(0);
            hasher.write(payload);
            let computed = hasher.finish() as u32;
            if stored != computed {
                throw!(Error::CorruptBlock(BlockFault::ChecksumMismatch { stored, computed }));
            }
        }

        let independent = self.descriptor.map_or(true, |d| d.block_independence);
        let output = &mut self.decoded[..self.capacity];
        let len = if block.compressed {
            let dict: &[u8] = if independent { &self.dictionary } else { &self.window };
            raw::decompress_block(payload, dict, output)
                .map_err(|e| Error::CorruptBlock(BlockFault::Undecodable(e)))?
        } else {
            output[..payload.len()].copy_from_slice(payload);
            payload.len()
        };
        self.staging.clear();
        self.block = None;
        self.stage = Stage::AwaitingBlock;

        let decoded = &self.decoded[..len];
        if let Some(hasher) = self.content_hasher.as_mut() {
            hasher.write(decoded);
        }
        if !independent {
            slide_window(&mut self.window, decoded);
        }
        self.content_len += len as u64;
        if let Some(declared) = self.descriptor.and_then(|d| d.content_size) {
            if self.content_len > declared {
                throw!(Error::CorruptContent(ContentFault::SizeMismatch { declared, actual: self.content_len }));
            }
        }
        self.decoded_len = len;
        self.flushed = 0;
        trace!(len, compressed = block.compressed, "block decoded");
        consumed
    }

    #[throws]
    fn end_blocks(&mut self) {
        let content_checksum = self.descriptor.map_or(false, |d| d.content_checksum);
        if content_checksum {
            self.stage = Stage::AwaitingContentChecksum;
        } else {
            self.finish_frame()?;
        }
    }

    #[throws]
    fn read_content_checksum(&mut self, input: &[u8]) -> usize {
        let (n, checksum) = gather(&mut self.staging, input, 4);
        let stored = match checksum {
            Some(bytes) => LE::read_u32(bytes),
            None => return n,
        };
        self.staging.clear();

        if let Some(hasher) = self.content_hasher.take() {
            let computed = hasher.finish() as u32;
            if stored != computed {
                throw!(Error::CorruptContent(ContentFault::ChecksumMismatch { stored, computed }));
            }
        }
        self.finish_frame()?;
        n
    }

    #[throws]
    fn finish_frame(&mut self) {
        if let Some(declared) = self.descriptor.and_then(|d| d.content_size) {
            if declared != self.content_len {
                throw!(Error::CorruptContent(ContentFault::SizeMismatch { declared, actual: self.content_len }));
            }
        }
        self.stage = Stage::Done;
        debug!(content_len = self.content_len, "frame decoded");
    }

    fn skip(&mut self, input: &[u8]) -> usize {
        let n = cmp::min(self.skip_remaining, input.len() as u64);
        self.skip_remaining -= n;
        if self.skip_remaining == 0 {
            self.stage = Stage::Done;
        }
        n as usize
    }
}

/// Collects a `target`-byte structure that may be split across calls.
///
/// Returns how much of `input` was taken and, once complete, the structure itself. It is
/// borrowed straight from `input` if it arrived in one piece; otherwise it lives in `staging`,
/// which the caller clears after use.
fn gather<'a>(staging: &'a mut Vec<u8>, input: &'a [u8], target: usize) -> (usize, Option<&'a [u8]>) {
    if staging.is_empty() && input.len() >= target {
        return (target, Some(&input[..target]));
    }
    let take = cmp::min(target - staging.len(), input.len());
    staging.extend_from_slice(&input[..take]);
    if staging.len() == target {
        (take, Some(&staging[..]))
    } else {
        (take, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framed::CompressionContext;

    fn frame_of(data: &[u8]) -> Vec<u8> {
        CompressionContext::new().unwrap().compress_frame(data).unwrap()
    }

    #[test]
    fn empty_frame_is_done() {
        let frame = frame_of(b"");
        let mut ctx = DecompressionContext::new();
        let d = ctx.decompress(&frame, usize::MAX).unwrap();
        assert!(d.data.is_empty());
        assert_eq!(d.consumed, frame.len());
        assert_eq!(d.status, Status::FrameDone);
        assert_eq!(ctx.stage(), Stage::Done);
    }

    #[test]
    fn stages_one_byte_at_a_time() {
        let frame = frame_of(b"hello world");
        let mut ctx = DecompressionContext::new();
        let mut stages = Vec::new();
        let mut out = Vec::new();
        for byte in &frame {
            let d = ctx.decompress(std::slice::from_ref(byte), usize::MAX).unwrap();
            assert_eq!(d.consumed, 1);
            out.extend_from_slice(&d.data);
            if stages.last() != Some(&ctx.stage()) {
                stages.push(ctx.stage());
            }
        }
        assert_eq!(out, b"hello world");
        assert_eq!(
            stages,
            vec![
                Stage::AwaitingHeader,
                Stage::AwaitingBlock,
                Stage::AwaitingBlockChecksum,
                Stage::AwaitingBlock,
                Stage::AwaitingContentChecksum,
                Stage::Done,
            ]
        );
    }

    #[test]
    fn hints_follow_the_structure() {
        let frame = frame_of(b"hello world");
        let mut ctx = DecompressionContext::new();

        let d = ctx.decompress(&frame[..2], usize::MAX).unwrap();
        assert_eq!(d.status, Status::NeedInput(5));
        let d = ctx.decompress(&frame[2..7], usize::MAX).unwrap();
        assert_eq!(d.status, Status::NeedInput(4));
        // block size field: 11 raw bytes + checksum + next size field
        let d = ctx.decompress(&frame[7..11], usize::MAX).unwrap();
        assert_eq!(d.status, Status::NeedInput(11 + 4 + 4));
        let d = ctx.decompress(&frame[11..26], usize::MAX).unwrap();
        assert_eq!(d.data, b"hello world");
        assert_eq!(d.status, Status::NeedInput(4));
        let d = ctx.decompress(&frame[26..30], usize::MAX).unwrap();
        assert_eq!(d.status, Status::NeedInput(4));
        let d = ctx.decompress(&frame[30..], usize::MAX).unwrap();
        assert_eq!(d.status, Status::FrameDone);
        assert_eq!(d.next_hint(), 0);
    }

    #[test]
    fn output_limit_holds_back_data() {
        let frame = frame_of(b"hello world");
        let mut ctx = DecompressionContext::new();
        let d = ctx.decompress(&frame, 4).unwrap();
        assert_eq!(d.data, b"hell");
        assert_eq!(d.status, Status::OutputPending);
        let rest = &frame[d.consumed..];

        let d = ctx.decompress(&[], 4).unwrap();
        assert_eq!(d.data, b"o wo");
        assert_eq!(d.consumed, 0);
        let d = ctx.decompress(rest, 4).unwrap();
        assert_eq!(d.data, b"rld");
        assert_eq!(d.status, Status::FrameDone);
    }

    #[test]
    fn stops_between_frames() {
        let mut frames = frame_of(b"first");
        let first_len = frames.len();
        frames.extend(frame_of(b"second"));

        let mut ctx = DecompressionContext::new();
        let d = ctx.decompress(&frames, usize::MAX).unwrap();
        assert_eq!(d.data, b"first");
        assert_eq!(d.consumed, first_len);
        assert!(d.is_frame_done());

        let d = ctx.decompress(&frames[first_len..], usize::MAX).unwrap();
        assert_eq!(d.data, b"second");
        assert!(d.is_frame_done());
    }

    #[test]
    fn frame_info_does_not_consume() {
        let frame = frame_of(b"hello world");
        let mut ctx = DecompressionContext::new();
        assert!(matches!(ctx.frame_info(&frame[..6]), Err(FrameError::TruncatedInput { needed: 1 })));

        let info = ctx.frame_info(&frame).unwrap();
        assert!(info.block_checksums && info.content_checksum);
        assert_eq!(ctx.block_capacity(), 64 * 1024);
        assert_eq!(ctx.stage(), Stage::AwaitingHeader);

        let d = ctx.decompress(&frame, usize::MAX).unwrap();
        assert_eq!(d.data, b"hello world");
    }

    #[test]
    fn frame_info_refuses_staged_header() {
        let frame = frame_of(b"x");
        let mut ctx = DecompressionContext::new();
        ctx.decompress(&frame[..3], usize::MAX).unwrap();
        assert!(matches!(ctx.frame_info(&frame[3..]), Err(FrameError::HeaderInProgress)));

        ctx.decompress(&frame[3..9], usize::MAX).unwrap();
        assert_eq!(ctx.frame_info(&[]).unwrap(), FrameDescriptor::decode(&frame).unwrap().0);
    }

    #[test]
    fn oversized_block() {
        let mut frame = frame_of(b"hello world");
        LE::write_u32(&mut frame[7..], (64 * 1024 + 1) | INCOMPRESSIBLE);
        let mut ctx = DecompressionContext::new();
        assert!(matches!(
            ctx.decompress(&frame, usize::MAX),
            Err(FrameError::OversizedBlock { declared: 65537, capacity: 65536 })
        ));
        assert_eq!(ctx.stage(), Stage::AwaitingHeader);
    }

    #[test]
    fn finish_reports_truncation() {
        let frame = frame_of(b"hello world");
        let mut ctx = DecompressionContext::new();
        ctx.finish().unwrap();
        ctx.decompress(&frame[..20], usize::MAX).unwrap();
        assert!(matches!(ctx.finish(), Err(FrameError::TruncatedInput { needed: 10 })));
        ctx.decompress(&frame[20..], usize::MAX).unwrap();
        ctx.finish().unwrap();
    }

    #[test]
    fn impossible_capacity_fails_to_allocate() {
        let mut ctx = DecompressionContext::new();
        assert!(matches!(ctx.allocate(usize::MAX), Err(FrameError::AllocationFailed { bytes: usize::MAX })));
        assert_eq!(ctx.block_capacity(), 0);
    }

    #[test]
    fn require_done() {
        let frame = frame_of(b"hello world");
        let mut ctx = DecompressionContext::new();
        let d = ctx.decompress(&frame[..frame.len() - 1], usize::MAX).unwrap();
        assert!(matches!(d.require_done(), Err(FrameError::TruncatedInput { needed: 1 })));
        let d = ctx.decompress(&frame[frame.len() - 1..], usize::MAX).unwrap();
        d.require_done().unwrap();
    }

    #[test]
    fn skippable_frames_are_skipped() {
        let mut stream = vec![0x52, 0x2A, 0x4D, 0x18, 3, 0, 0, 0, 1, 2, 3];
        stream.extend(frame_of(b"after"));

        let mut ctx = DecompressionContext::new();
        let d = ctx.decompress(&stream, usize::MAX).unwrap();
        assert!(d.data.is_empty());
        assert_eq!(d.consumed, 11);
        assert!(d.is_frame_done());

        let d = ctx.decompress(&stream[11..], usize::MAX).unwrap();
        assert_eq!(d.data, b"after");
    }

    #[test]
    fn wrong_magic_is_fatal() {
        let mut ctx = DecompressionContext::new();
        assert!(matches!(
            ctx.decompress(b"PK\x03\x04 not lz4", usize::MAX),
            Err(FrameError::WrongMagic(0x04034B50))
        ));
    }

    #[test]
    fn gather_prefers_input() {
        let mut staging = Vec::new();
        let (n, bytes) = gather(&mut staging, b"abcdef", 4);
        assert_eq!((n, bytes), (4, Some(&b"abcd"[..])));
        assert!(staging.is_empty());

        let (n, bytes) = gather(&mut staging, b"ab", 4);
        assert_eq!((n, bytes), (2, None));
        let (n, bytes) = gather(&mut staging, b"cdef", 4);
        assert_eq!((n, bytes), (2, Some(&b"abcd"[..])));
    }
}
