#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_framed::framed::FrameReader;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let mut output = Vec::new();
    // random bytes from the fuzzer are not valid LZ4 data, errors are expected
    let _ = FrameReader::new(data).read_to_end(&mut output);
});
