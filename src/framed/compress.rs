use byteorder::{WriteBytesExt, LE};
use fehler::{throw, throws};
use std::cmp;
use std::hash::Hasher;
use std::io::Write;
use tracing::{debug, trace};
use twox_hash::XxHash32;

use super::error::FrameError;
use super::header::{BlockSizeId, FrameDescriptor, MAX_HEADER_LEN};
use super::{reserve_buffer, slide_window, END_MARK, INCOMPRESSIBLE, WINDOW_SIZE};
use crate::raw;

type Error = FrameError; // do it this way for better docs

/// A builder-style struct that configures compression settings.
///
/// Create it using `Default::default()`.
#[derive(Clone, Debug)]
pub struct CompressionSettings {
    independent_blocks: bool,
    block_checksums: bool,
    content_checksum: bool,
    content_size: bool,
    block_size: BlockSizeId,
    dictionary: Option<Vec<u8>>,
    dictionary_id: Option<u32>,
}
impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            independent_blocks: true,
            block_checksums: true,
            content_checksum: true,
            content_size: false,
            block_size: BlockSizeId::Max64KiB,
            dictionary: None,
            dictionary_id: None,
        }
    }
}
impl CompressionSettings {
    /// In independent mode, blocks are not allowed to reference data from previous blocks.
    /// Dependent ("linked") blocks compress slightly better, but the frame can then only be
    /// decoded from the beginning.
    ///
    /// Blocks are independent by default.
    pub fn independent_blocks(&mut self, v: bool) -> &mut Self {
        self.independent_blocks = v;
        self
    }

    /// Block checksums let a decoder reject a corrupted block before handing out any of its data.
    ///
    /// Block checksums are enabled by default.
    pub fn block_checksums(&mut self, v: bool) -> &mut Self {
        self.block_checksums = v;
        self
    }

    /// The content checksum is calculated over the decompressed contents of the entire frame.
    /// It can only be verified once the whole frame has been read.
    ///
    /// The content checksum is enabled by default.
    pub fn content_checksum(&mut self, v: bool) -> &mut Self {
        self.content_checksum = v;
        self
    }

    /// Record the input length in the header of frames produced by `compress_frame`.
    ///
    /// Disabled by default.
    pub fn content_size(&mut self, v: bool) -> &mut Self {
        self.content_size = v;
        self
    }

    /// The default block size is 64 KiB.
    pub fn block_size(&mut self, v: BlockSizeId) -> &mut Self {
        self.block_size = v;
        self
    }

    /// A dictionary is a constant slice of bytes shared by the compressing and the decompressing
    /// party. Only its trailing 64 KiB can ever be referenced.
    ///
    /// The id is written to the frame header so the decoder can pick the right dictionary.
    pub fn dictionary(&mut self, id: u32, dict: &[u8]) -> &mut Self {
        let start = dict.len().saturating_sub(WINDOW_SIZE);
        self.dictionary = Some(dict[start..].to_vec());
        self.dictionary_id = Some(id);
        self
    }

    pub fn block_capacity(&self) -> usize {
        self.block_size.capacity()
    }

    /// Worst-case size of a frame holding `len` bytes of content.
    ///
    /// Every block is budgeted with the LZ4 block bound even though incompressible
    /// blocks are stored raw, so this is never below the real frame size.
    pub fn frame_bound(&self, len: usize) -> usize {
        let capacity = self.block_capacity();
        let block_overhead = 4 + if self.block_checksums { 4 } else { 0 };
        let full_blocks = len / capacity;
        let last_block = len % capacity;

        let mut bound = MAX_HEADER_LEN + full_blocks * (block_overhead + raw::block_bound(capacity));
        if last_block > 0 {
            bound += block_overhead + raw::block_bound(last_block);
        }
        bound + 4 + if self.content_checksum { 4 } else { 0 }
    }

    fn descriptor(&self, checksums: bool, content_size: Option<u64>) -> FrameDescriptor {
        FrameDescriptor {
            block_independence: self.independent_blocks,
            block_checksums: checksums && self.block_checksums,
            content_checksum: checksums && self.content_checksum,
            block_size: self.block_size,
            content_size,
            dictionary_id: self.dictionary_id,
        }
    }
}

struct OpenFrame {
    descriptor: FrameDescriptor,
    content_hasher: Option<XxHash32>,
    consumed: u64,
}

/// Encoder state for producing LZ4 frames.
///
/// A context produces one frame at a time: `begin`, any number of `update`/`flush` calls,
/// then `end`. Its buffers are reused by the next frame. Dropping the context releases them.
pub struct CompressionContext {
    settings: CompressionSettings,
    checksums: bool,
    frame: Option<OpenFrame>,
    /// Input that does not fill a whole block yet.
    in_buffer: Vec<u8>,
    out_buffer: Vec<u8>,
    /// The dictionary, followed by the history of the frame for linked blocks.
    window: Vec<u8>,
}

impl CompressionContext {
    #[throws]
    pub fn new() -> Self {
        Self::with_settings(CompressionSettings::default())?
    }

    /// Allocates the block buffers the settings call for.
    #[throws]
    pub fn with_settings(settings: CompressionSettings) -> Self {
        let capacity = settings.block_capacity();
        let in_buffer = reserve_buffer(capacity)?;
        let scratch = raw::scratch_size(capacity);
        let mut out_buffer = reserve_buffer(scratch)?;
        out_buffer.resize(scratch, 0);
        let window = reserve_buffer(WINDOW_SIZE)?;

        CompressionContext {
            settings,
            checksums: true,
            frame: None,
            in_buffer,
            out_buffer,
            window,
        }
    }

    pub fn settings(&self) -> &CompressionSettings {
        &self.settings
    }

    /// Turns off block and content checksums for every frame begun from now on.
    ///
    /// A frame that is already open keeps the checksums its header announced.
    pub fn disable_checksum(&mut self) {
        self.checksums = false;
    }

    pub fn checksums_enabled(&self) -> bool {
        self.checksums
    }

    pub fn is_frame_open(&self) -> bool {
        self.frame.is_some()
    }

    /// Releases the context. Equivalent to dropping it.
    pub fn close(self) {}

    /// Writes the frame header and opens a frame.
    ///
    /// If `content_size` is given it is recorded in the header and `end` checks that
    /// exactly this many bytes were fed.
    #[throws]
    pub fn begin<W: Write>(&mut self, mut writer: W, content_size: Option<u64>) {
        if self.frame.is_some() {
            throw!(Error::FrameAlreadyOpen);
        }

        let descriptor = self.settings.descriptor(self.checksums, content_size);
        writer.write_all(&descriptor.encode())?;
        debug!(
            block_size = descriptor.block_capacity(),
            block_checksums = descriptor.block_checksums,
            content_checksum = descriptor.content_checksum,
            "frame header written"
        );

        self.in_buffer.clear();
        self.window.clear();
        if let Some(dict) = &self.settings.dictionary {
            self.window.extend_from_slice(dict);
        }
        self.frame = Some(OpenFrame {
            descriptor,
            content_hasher: if descriptor.content_checksum { Some(XxHash32::with_seed(0)) } else { None },
            consumed: 0,
        });
    }

    /// Feeds content into the open frame, writing every block that fills up.
    #[throws]
    pub fn update<W: Write>(&mut self, mut writer: W, mut src: &[u8]) {
        let Self { frame, in_buffer, out_buffer, window, settings, .. } = self;
        let frame = frame.as_mut().ok_or(Error::FrameNotOpen)?;
        let dictionary = settings.dictionary.as_deref().unwrap_or(&[]);
        let capacity = frame.descriptor.block_capacity();

        while !src.is_empty() {
            if in_buffer.is_empty() && src.len() >= capacity {
                // whole blocks straight from the caller's buffer
                let (block, rest) = src.split_at(capacity);
                write_block(&mut writer, frame, window, dictionary, &mut out_buffer[..], block)?;
                src = rest;
                continue;
            }

            let take = cmp::min(capacity - in_buffer.len(), src.len());
            in_buffer.extend_from_slice(&src[..take]);
            src = &src[take..];
            if in_buffer.len() == capacity {
                write_block(&mut writer, frame, window, dictionary, &mut out_buffer[..], &in_buffer[..])?;
                in_buffer.clear();
            }
        }
    }

    /// Writes buffered content as a (short) block.
    #[throws]
    pub fn flush<W: Write>(&mut self, mut writer: W) {
        let Self { frame, in_buffer, out_buffer, window, settings, .. } = self;
        let frame = frame.as_mut().ok_or(Error::FrameNotOpen)?;
        if !in_buffer.is_empty() {
            let dictionary = settings.dictionary.as_deref().unwrap_or(&[]);
            write_block(&mut writer, frame, window, dictionary, &mut out_buffer[..], &in_buffer[..])?;
            in_buffer.clear();
        }
    }

    /// Flushes, writes the end mark and the content checksum, and closes the frame.
    #[throws]
    pub fn end<W: Write>(&mut self, mut writer: W) {
        self.flush(&mut writer)?;
        let frame = self.frame.take().ok_or(Error::FrameNotOpen)?;
        if let Some(declared) = frame.descriptor.content_size {
            if declared != frame.consumed {
                throw!(Error::ContentSizeMismatch { declared, actual: frame.consumed });
            }
        }

        writer.write_u32::<LE>(END_MARK)?;
        if let Some(hasher) = frame.content_hasher {
            writer.write_u32::<LE>(hasher.finish() as u32)?;
        }
        debug!(content_len = frame.consumed, "frame finished");
    }

    /// Compresses `src` into one complete, self-contained frame.
    ///
    /// The output is reserved up front from `frame_bound`; the returned vector holds exactly
    /// the bytes of the frame.
    #[throws]
    pub fn compress_frame(&mut self, src: &[u8]) -> Vec<u8> {
        let bound = self.settings.frame_bound(src.len());
        let mut output = reserve_buffer(bound)?;
        let content_size = if self.settings.content_size { Some(src.len() as u64) } else { None };

        self.begin(&mut output, content_size)?;
        self.update(&mut output, src)?;
        self.end(&mut output)?;

        debug_assert!(output.len() <= bound);
        output
    }
}

#[throws]
fn write_block<W: Write>(
    mut writer: W,
    frame: &mut OpenFrame,
    window: &mut Vec<u8>,
    dictionary: &[u8],
    scratch: &mut [u8],
    block: &[u8],
) {
    if let Some(hasher) = frame.content_hasher.as_mut() {
        hasher.write(block);
    }
    frame.consumed += block.len() as u64;

    let independent = frame.descriptor.block_independence;
    let dict: &[u8] = if independent { dictionary } else { window };
    let payload = match raw::compress_block(block, dict, scratch).map_err(Error::Compress)? {
        Some(written) => {
            writer.write_u32::<LE>(written as u32)?;
            &scratch[..written]
        }
        None => {
            // incompressible
            writer.write_u32::<LE>(block.len() as u32 | INCOMPRESSIBLE)?;
            block
        }
    };
    writer.write_all(payload)?;

    if frame.descriptor.block_checksums {
        let mut block_hasher = XxHash32::with_seed(0);
        block_hasher.write(payload);
        writer.write_u32::<LE>(block_hasher.finish() as u32)?;
    }
    trace!(len = block.len(), stored = payload.len(), "block written");

    if !independent {
        slide_window(window, block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ByteOrder, LE};

    fn noise(len: usize) -> Vec<u8> {
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 24) as u8
            })
            .collect()
    }

    /// Walks the block sequence of a frame and returns (size field, stored len) per block.
    fn blocks(frame: &[u8]) -> Vec<(u32, usize)> {
        let (descriptor, mut pos) = FrameDescriptor::decode(frame).unwrap();
        let mut blocks = Vec::new();
        loop {
            let field = LE::read_u32(&frame[pos..]);
            pos += 4;
            if field == 0 {
                break;
            }
            let len = (field & !INCOMPRESSIBLE) as usize;
            blocks.push((field, len));
            pos += len + if descriptor.block_checksums { 4 } else { 0 };
        }
        pos += if descriptor.content_checksum { 4 } else { 0 };
        assert_eq!(pos, frame.len());
        blocks
    }

    #[test]
    fn empty_frame() {
        let frame = CompressionContext::new().unwrap().compress_frame(b"").unwrap();
        // header, end mark, checksum of nothing
        assert_eq!(frame.len(), 7 + 4 + 4);
        assert_eq!(&frame[7..11], &[0, 0, 0, 0]);
        assert_eq!(LE::read_u32(&frame[11..]), 0x02CC5D05);
        assert!(blocks(&frame).is_empty());
    }

    #[test]
    fn incompressible_block_is_stored_raw() {
        let frame = CompressionContext::new().unwrap().compress_frame(b"hello world").unwrap();
        assert_eq!(blocks(&frame), vec![(11 | INCOMPRESSIBLE, 11)]);
        assert_eq!(&frame[11..22], b"hello world");
    }

    #[test]
    fn splits_into_blocks() {
        let data = vec![7u8; 3 * 64 * 1024 + 100];
        let frame = CompressionContext::new().unwrap().compress_frame(&data).unwrap();
        let blocks = blocks(&frame);
        assert_eq!(blocks.len(), 4);
        for (field, len) in blocks {
            assert_eq!(field & INCOMPRESSIBLE, 0);
            assert!(len <= 64 * 1024);
        }
    }

    #[test]
    fn disabled_checksums_apply_to_next_frame() {
        let mut ctx = CompressionContext::new().unwrap();
        let mut open = Vec::new();
        ctx.begin(&mut open, None).unwrap();
        ctx.disable_checksum();
        ctx.disable_checksum();
        ctx.update(&mut open, b"abc").unwrap();
        ctx.end(&mut open).unwrap();
        let (announced, _) = FrameDescriptor::decode(&open).unwrap();
        assert!(announced.block_checksums && announced.content_checksum);

        let frame = ctx.compress_frame(b"abc").unwrap();
        let (descriptor, _) = FrameDescriptor::decode(&frame).unwrap();
        assert!(!descriptor.block_checksums);
        assert!(!descriptor.content_checksum);
        assert_eq!(frame.len(), 7 + 4 + 3 + 4);
    }

    #[test]
    fn frame_state_is_enforced() {
        let mut ctx = CompressionContext::new().unwrap();
        let mut out = Vec::new();
        assert!(matches!(ctx.update(&mut out, b"x"), Err(FrameError::FrameNotOpen)));
        assert!(matches!(ctx.end(&mut out), Err(FrameError::FrameNotOpen)));
        ctx.begin(&mut out, None).unwrap();
        assert!(matches!(ctx.begin(&mut out, None), Err(FrameError::FrameAlreadyOpen)));
        assert!(matches!(ctx.compress_frame(b"x"), Err(FrameError::FrameAlreadyOpen)));
    }

    #[test]
    fn declared_content_size_is_checked() {
        let mut ctx = CompressionContext::new().unwrap();
        let mut out = Vec::new();
        ctx.begin(&mut out, Some(10)).unwrap();
        ctx.update(&mut out, b"short").unwrap();
        assert!(matches!(
            ctx.end(&mut out),
            Err(FrameError::ContentSizeMismatch { declared: 10, actual: 5 })
        ));
        assert!(!ctx.is_frame_open());
    }

    #[test]
    fn bound_covers_worst_case() {
        let mut settings = CompressionSettings::default();
        settings.content_size(true);
        let mut ctx = CompressionContext::with_settings(settings.clone()).unwrap();
        let noise = noise(200_000);
        for len in &[0, 1, 65535, 65536, 65537, 200_000] {
            let frame = ctx.compress_frame(&noise[..*len]).unwrap();
            assert!(frame.len() <= settings.frame_bound(*len));
        }
    }

    #[test]
    fn linked_blocks_use_history() {
        let mut settings = CompressionSettings::default();
        settings.independent_blocks(false);
        // repeats at a distance of 48 KiB, which straddles the block boundary
        let phrase = noise(48 * 1024);
        let data: Vec<u8> = phrase.iter().cycle().take(128 * 1024).copied().collect();

        let linked = CompressionContext::with_settings(settings).unwrap().compress_frame(&data).unwrap();
        let independent = CompressionContext::new().unwrap().compress_frame(&data).unwrap();
        // most of the second block repeats the first one, only linked blocks can see that
        assert!(linked.len() < independent.len());
    }
}
