#![no_main]
use libfuzzer_sys::fuzz_target;
use lz4_framed::framed::{compress_frame, DecompressionContext};

// The first byte picks the chunk size, the rest is compressed and fed back in pieces.
fuzz_target!(|data: &[u8]| {
    let (step, data) = match data.split_first() {
        Some((&step, rest)) => (usize::from(step).max(1), rest),
        None => return,
    };
    let frame = compress_frame(data).expect("Could not compress input data");

    let mut ctx = DecompressionContext::new();
    let mut roundtripped = Vec::new();
    for mut chunk in frame.chunks(step) {
        loop {
            let d = ctx.decompress(chunk, 7).expect("Could not decode own frame");
            roundtripped.extend_from_slice(&d.data);
            chunk = &chunk[d.consumed..];
            if d.data.is_empty() && d.consumed == 0 {
                break;
            }
        }
        assert!(chunk.is_empty());
    }
    ctx.finish().expect("Frame not complete");
    assert!(roundtripped == data);
});
