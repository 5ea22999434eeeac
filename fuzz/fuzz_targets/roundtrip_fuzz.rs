#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_framed::framed::{CompressionSettings, FrameReader, FrameWriter};
use std::io::{Read, Write};

fuzz_target!(|data: &[u8]| {
    let mut settings = CompressionSettings::default();
    settings.independent_blocks(data.len() % 2 == 0).block_checksums(data.len() % 3 == 0);

    let mut writer = FrameWriter::with_settings(Vec::new(), settings).expect("Could not start frame");
    writer.write_all(data).expect("Could not compress input data");
    let output = writer.finish().expect("Could not finish frame");

    let mut roundtripped = Vec::new();
    FrameReader::new(&output[..]).read_to_end(&mut roundtripped).expect("Could not read decompressed data");
    assert!(roundtripped.iter().eq(data));
});
