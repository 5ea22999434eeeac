#![allow(non_upper_case_globals)]

use byteorder::{ByteOrder, LE};
use bitflags::bitflags;
use fehler::{throw, throws};
use std::hash::Hasher;
use twox_hash::XxHash32;

use super::error::{FrameError, HeaderFault};
use super::MAGIC;

type Error = FrameError;

/// Magic (4) + FLG (1) + BD (1) + header checksum (1).
pub const MIN_HEADER_LEN: usize = 7;
/// `MIN_HEADER_LEN` plus content size (8) and dictionary id (4).
pub const MAX_HEADER_LEN: usize = 19;
/// Skippable frames carry a 4-byte magic and a 4-byte length.
pub const SKIPPABLE_HEADER_LEN: usize = 8;

const SKIPPABLE_MAGIC: u32 = 0x184D2A50;
const SKIPPABLE_MAGIC_MASK: u32 = 0xFFFFFFF0;
const VERSION: u8 = 1;

bitflags! {
    /// The FLG byte, minus the version bits.
    pub struct Flags: u8 {
        const IndependentBlocks = 0b00100000;
        const BlockChecksums    = 0b00010000;
        const ContentSize       = 0b00001000;
        const ContentChecksum   = 0b00000100;
        const DictionaryId      = 0b00000001;
    }
}

impl Flags {
    #[throws]
    pub fn parse(i: u8) -> Self {
        let version = i >> 6;
        if version != VERSION {
            throw!(Error::CorruptHeader(HeaderFault::UnsupportedVersion(version)));
        }
        if (i & 0b10) != 0 {
            throw!(Error::CorruptHeader(HeaderFault::ReservedFlagBitsSet));
        }

        Flags::from_bits_truncate(i)
    }

    pub fn independent_blocks(&self) -> bool { self.contains(Flags::IndependentBlocks) }
    pub fn block_checksums(&self)    -> bool { self.contains(Flags::BlockChecksums) }
    pub fn content_size(&self)       -> bool { self.contains(Flags::ContentSize) }
    pub fn content_checksum(&self)   -> bool { self.contains(Flags::ContentChecksum) }
    pub fn dictionary_id(&self)      -> bool { self.contains(Flags::DictionaryId) }
}

/// One of the four block capacities the frame format knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BlockSizeId {
    Max64KiB = 4,
    Max256KiB = 5,
    Max1MiB = 6,
    Max4MiB = 7,
}

impl Default for BlockSizeId {
    fn default() -> Self {
        BlockSizeId::Max64KiB
    }
}

impl BlockSizeId {
    #[throws]
    pub fn from_id(id: u8) -> Self {
        match id {
            4 => BlockSizeId::Max64KiB,
            5 => BlockSizeId::Max256KiB,
            6 => BlockSizeId::Max1MiB,
            7 => BlockSizeId::Max4MiB,
            _ => throw!(Error::InvalidBlockSizeId(id)),
        }
    }

    /// Only valid values are 4MiB, 1MiB, 256KiB, 64KiB.
    #[throws]
    pub fn from_capacity(bytes: usize) -> Self {
        let id = (bytes.trailing_zeros().saturating_sub(8) / 2) as u8;
        match BlockSizeId::from_id(id) {
            Ok(size) if size.capacity() == bytes => size,
            _ => throw!(Error::InvalidBlockSize(bytes)),
        }
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn capacity(self) -> usize {
        1 << (8 + 2 * self.id() as usize)
    }
}

/// Maps a raw block size id to its capacity in bytes.
#[throws]
pub fn capacity_for(id: u8) -> usize {
    BlockSizeId::from_id(id)?.capacity()
}

struct BlockDescriptor(u8); // the "BD" byte
impl BlockDescriptor {
    fn new(size: BlockSizeId) -> Self {
        BlockDescriptor(size.id() << 4)
    }

    #[throws]
    fn parse(i: u8) -> Self {
        if (i & 0b10001111) != 0 {
            throw!(Error::CorruptHeader(HeaderFault::ReservedBdBitsSet));
        }
        BlockDescriptor(i)
    }

    #[throws]
    fn block_size(&self) -> BlockSizeId {
        let id = (self.0 >> 4) & 0b111;
        BlockSizeId::from_id(id).map_err(|_| Error::UnknownBlockSizeId(id))?
    }
}

/// Everything the frame header says about the frame that follows it.
///
/// The version is always `FrameDescriptor::VERSION` and the header checksum is derived from the
/// other fields (`header_checksum`), so neither is stored here. `decode` verifies both.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameDescriptor {
    /// Blocks never reference data of earlier blocks.
    pub block_independence: bool,
    /// Every block is followed by an XXH32 of its stored payload.
    pub block_checksums: bool,
    /// The end mark is followed by an XXH32 of the decompressed content.
    pub content_checksum: bool,
    pub block_size: BlockSizeId,
    pub content_size: Option<u64>,
    pub dictionary_id: Option<u32>,
}

impl FrameDescriptor {
    pub const VERSION: u8 = VERSION;

    pub fn flags(&self) -> Flags {
        let mut flags = Flags::empty();
        flags.set(Flags::IndependentBlocks, self.block_independence);
        flags.set(Flags::BlockChecksums, self.block_checksums);
        flags.set(Flags::ContentSize, self.content_size.is_some());
        flags.set(Flags::ContentChecksum, self.content_checksum);
        flags.set(Flags::DictionaryId, self.dictionary_id.is_some());
        flags
    }

    pub fn block_capacity(&self) -> usize {
        self.block_size.capacity()
    }

    /// Length of the encoded header, magic and checksum included.
    pub fn encoded_len(&self) -> usize {
        MIN_HEADER_LEN
            + if self.content_size.is_some() { 8 } else { 0 }
            + if self.dictionary_id.is_some() { 4 } else { 0 }
    }

    /// Serializes the full frame header.
    pub fn encode(&self) -> Vec<u8> {
        let mut header = [0u8; MAX_HEADER_LEN];
        LE::write_u32(&mut header, MAGIC);
        header[4] = (VERSION << 6) | self.flags().bits();
        header[5] = BlockDescriptor::new(self.block_size).0;
        let mut pos = 6;
        if let Some(content_size) = self.content_size {
            LE::write_u64(&mut header[pos..], content_size);
            pos += 8;
        }
        if let Some(id) = self.dictionary_id {
            LE::write_u32(&mut header[pos..], id);
            pos += 4;
        }
        header[pos] = descriptor_checksum(&header[4..pos]); // skip magic
        header[..=pos].to_vec()
    }

    /// The checksum byte `encode` appends.
    pub fn header_checksum(&self) -> u8 {
        let header = self.encode();
        header[header.len() - 1]
    }

    /// Parses a frame header from the start of `bytes`.
    ///
    /// Returns the descriptor and the number of bytes it occupied.
    /// `TruncatedInput` means the header is longer than `bytes`; nothing is lost,
    /// just call again with more data.
    #[throws]
    pub fn decode(bytes: &[u8]) -> (Self, usize) {
        if bytes.len() < 4 {
            throw!(Error::TruncatedInput { needed: MIN_HEADER_LEN - bytes.len() });
        }
        let magic = LE::read_u32(bytes);
        if magic != MAGIC {
            throw!(Error::WrongMagic(magic));
        }
        let len = match header_len(bytes)? {
            Some(len) => len,
            None => throw!(Error::TruncatedInput { needed: MIN_HEADER_LEN - bytes.len() }),
        };
        if bytes.len() < len {
            throw!(Error::TruncatedInput { needed: len - bytes.len() });
        }

        let flags = Flags::parse(bytes[4])?;
        let bd = BlockDescriptor::parse(bytes[5])?;

        let stored = bytes[len - 1];
        let computed = descriptor_checksum(&bytes[4..len - 1]);
        if stored != computed {
            throw!(Error::CorruptHeader(HeaderFault::ChecksumMismatch { stored, computed }));
        }

        let mut pos = 6;
        let content_size = if flags.content_size() {
            let i = LE::read_u64(&bytes[pos..]);
            pos += 8;
            Some(i)
        } else {
            None
        };
        let dictionary_id = if flags.dictionary_id() {
            Some(LE::read_u32(&bytes[pos..]))
        } else {
            None
        };

        let descriptor = FrameDescriptor {
            block_independence: flags.independent_blocks(),
            block_checksums: flags.block_checksums(),
            content_checksum: flags.content_checksum(),
            block_size: bd.block_size()?,
            content_size,
            dictionary_id,
        };
        (descriptor, len)
    }
}

/// Total header length, as far as it can be told from `prefix`.
///
/// `None` until the magic number and FLG byte are available.
/// Skippable frames report their 8-byte magic + length header.
#[throws]
pub fn header_len(prefix: &[u8]) -> Option<usize> {
    if prefix.len() < 4 {
        return None;
    }
    let magic = LE::read_u32(prefix);
    if is_skippable(magic) {
        return Some(SKIPPABLE_HEADER_LEN);
    }
    if magic != MAGIC {
        throw!(Error::WrongMagic(magic));
    }
    match prefix.get(4) {
        Some(&flg) => {
            let flags = Flags::parse(flg)?;
            Some(MIN_HEADER_LEN
                + if flags.content_size() { 8 } else { 0 }
                + if flags.dictionary_id() { 4 } else { 0 })
        }
        None => None,
    }
}

pub fn is_skippable(magic: u32) -> bool {
    magic & SKIPPABLE_MAGIC_MASK == SKIPPABLE_MAGIC
}

fn descriptor_checksum(descriptor: &[u8]) -> u8 {
    let mut hasher = XxHash32::with_seed(0);
    hasher.write(descriptor);
    (hasher.finish() >> 8) as u8
}
