use fehler::{throw, throws};
use std::io::{self, BufRead, Read, Write};

use super::compress::{CompressionContext, CompressionSettings};
use super::decompress::DecompressionContext;
use super::error::FrameError;
use super::header::FrameDescriptor;

const INPUT_CHUNK: usize = 64 * 1024;

/// Compresses everything written to it into a single frame.
///
/// Call `finish` to write the end of the frame; dropping the writer leaves the frame truncated.
pub struct FrameWriter<W: Write> {
    writer: W,
    context: CompressionContext,
}

impl<W: Write> FrameWriter<W> {
    #[throws(FrameError)]
    pub fn new(writer: W) -> Self {
        Self::with_settings(writer, CompressionSettings::default())?
    }

    /// Writes the frame header right away.
    #[throws(FrameError)]
    pub fn with_settings(mut writer: W, settings: CompressionSettings) -> Self {
        let mut context = CompressionContext::with_settings(settings)?;
        context.begin(&mut writer, None)?;
        FrameWriter { writer, context }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Ends the frame and hands back the inner writer.
    #[throws(FrameError)]
    pub fn finish(mut self) -> W {
        self.context.end(&mut self.writer)?;
        self.writer.flush()?;
        self.writer
    }
}

impl<W: Write> Write for FrameWriter<W> {
    #[throws(io::Error)]
    fn write(&mut self, buf: &[u8]) -> usize {
        self.context.update(&mut self.writer, buf)?;
        buf.len()
    }

    /// Emits buffered content as a short block, then flushes the inner writer.
    #[throws(io::Error)]
    fn flush(&mut self) {
        self.context.flush(&mut self.writer)?;
        self.writer.flush()?;
    }
}

/// Decompresses a stream of frames and implements `Read` and `BufRead`.
///
/// Concatenated and skippable frames are handled transparently. Reaching the end of the
/// underlying reader in the middle of a frame is reported as `UnexpectedEof`.
pub struct FrameReader<R: Read> {
    reader: R,
    context: DecompressionContext,
    input: Vec<u8>,
    input_pos: usize,
    buffer: Vec<u8>,
    bytes_taken: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_context(reader, DecompressionContext::new())
    }

    /// Uses a preconfigured context, e.g. one with a dictionary set.
    pub fn with_context(reader: R, context: DecompressionContext) -> Self {
        FrameReader {
            reader,
            context,
            input: Vec::with_capacity(INPUT_CHUNK),
            input_pos: 0,
            buffer: Vec::new(),
            bytes_taken: 0,
        }
    }

    /// The descriptor of the frame currently being read.
    pub fn frame_descriptor(&self) -> Option<FrameDescriptor> {
        self.context.frame_descriptor()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Returns false at the end of the input.
    #[throws(io::Error)]
    fn refill(&mut self) -> bool {
        self.input.resize(INPUT_CHUNK, 0);
        let n = loop {
            match self.reader.read(&mut self.input) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.input.clear();
                    throw!(e);
                }
            }
        };
        self.input.truncate(n);
        self.input_pos = 0;
        n > 0
    }
}

impl<R: Read> Read for FrameReader<R> {
    #[throws(io::Error)]
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let mybuf = self.fill_buf()?;
        let bytes_to_take = std::cmp::min(mybuf.len(), buf.len());
        buf[..bytes_to_take].copy_from_slice(&mybuf[..bytes_to_take]);
        self.consume(bytes_to_take);
        bytes_to_take
    }
}

impl<R: Read> BufRead for FrameReader<R> {
    #[throws(io::Error)]
    fn fill_buf(&mut self) -> &[u8] {
        while self.bytes_taken == self.buffer.len() {
            if self.input_pos == self.input.len() && !self.refill()? {
                self.context.finish()?;
                break;
            }
            let max_output = std::cmp::max(self.context.block_capacity(), INPUT_CHUNK);
            let decompressed = self.context.decompress(&self.input[self.input_pos..], max_output)?;
            self.input_pos += decompressed.consumed;
            self.buffer = decompressed.data;
            self.bytes_taken = 0;
        }
        &self.buffer[self.bytes_taken..]
    }

    fn consume(&mut self, amt: usize) {
        self.bytes_taken += amt;
        assert!(self.bytes_taken <= self.buffer.len(), "You consumed more bytes than I even gave you!");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framed::BlockSizeId;

    /// Hands out at most `step` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn text(len: usize) -> Vec<u8> {
        b"All the world's a stage, and all the men and women merely players. "
            .iter()
            .cycle()
            .take(len)
            .copied()
            .collect()
    }

    #[test]
    fn writer_then_reader() {
        let data = text(300_000);
        let mut writer = FrameWriter::new(Vec::new()).unwrap();
        for chunk in data.chunks(1000) {
            writer.write_all(chunk).unwrap();
        }
        let frame = writer.finish().unwrap();
        assert!(frame.len() < data.len() / 10);

        let mut plain = Vec::new();
        FrameReader::new(&frame[..]).read_to_end(&mut plain).unwrap();
        assert_eq!(plain, data);
    }

    #[test]
    fn reader_survives_trickling_input() {
        let data = text(100_000);
        let mut settings = CompressionSettings::default();
        settings.independent_blocks(false).block_size(BlockSizeId::Max256KiB);
        let mut writer = FrameWriter::with_settings(Vec::new(), settings).unwrap();
        writer.write_all(&data).unwrap();
        let frame = writer.finish().unwrap();

        let mut reader = FrameReader::new(Trickle { data: &frame, step: 3 });
        let mut plain = Vec::new();
        reader.read_to_end(&mut plain).unwrap();
        assert_eq!(plain, data);
        assert_eq!(reader.frame_descriptor().unwrap().block_size, BlockSizeId::Max256KiB);
    }

    #[test]
    fn flush_emits_a_block() {
        let mut writer = FrameWriter::new(Vec::new()).unwrap();
        writer.write_all(b"abc").unwrap();
        assert_eq!(writer.get_ref().len(), 7);
        writer.flush().unwrap();
        // size field, payload, block checksum
        assert_eq!(writer.get_ref().len(), 7 + 4 + 3 + 4);
    }

    #[test]
    fn truncated_stream_is_unexpected_eof() {
        let mut writer = FrameWriter::new(Vec::new()).unwrap();
        writer.write_all(&text(1000)).unwrap();
        let frame = writer.finish().unwrap();

        let mut plain = Vec::new();
        let err = FrameReader::new(&frame[..frame.len() - 1]).read_to_end(&mut plain).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn empty_input_reads_nothing() {
        let mut plain = Vec::new();
        assert_eq!(FrameReader::new(io::empty()).read_to_end(&mut plain).unwrap(), 0);
    }
}
