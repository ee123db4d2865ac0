#![no_main]
use libfuzzer_sys::fuzz_target;
use zendib::{DecodeRequest, EncodeRequest, Limits};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 20),
        max_memory_bytes: Some(1 << 24),
        ..Limits::default()
    };

    // Anything we can decode must survive re-encoding and decode back
    // to the same pixels.
    let Ok((decoded, alpha)) = DecodeRequest::new(data)
        .with_limits(limits.clone())
        .decode_ex(&enough::Unstoppable)
    else {
        return;
    };

    let reencoded = EncodeRequest::new()
        .encode_ex(&decoded, alpha.as_ref(), &enough::Unstoppable)
        .expect("decoded raster failed to encode");

    let (decoded2, alpha2) = DecodeRequest::new(&reencoded)
        .with_limits(limits)
        .decode_ex(&enough::Unstoppable)
        .expect("re-encoded data failed to decode");

    assert_eq!(decoded.width(), decoded2.width());
    assert_eq!(decoded.height(), decoded2.height());
    for y in 0..decoded.height() {
        for x in 0..decoded.width() {
            assert_eq!(
                decoded.color_at(x, y),
                decoded2.color_at(x, y),
                "roundtrip pixel mismatch at {x},{y}"
            );
        }
    }
    assert_eq!(alpha, alpha2, "roundtrip alpha mismatch");
});
