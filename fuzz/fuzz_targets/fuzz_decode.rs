#![no_main]
use libfuzzer_sys::fuzz_target;
use zendib::{DecodeRequest, Limits};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_pixels: Some(1 << 22),
        max_memory_bytes: Some(1 << 26),
        ..Limits::default()
    };

    // All entry points must fail cleanly, never panic or overallocate.
    let req = DecodeRequest::new(data).with_limits(limits.clone());
    let _ = req.decode(&enough::Unstoppable);
    let _ = req.decode_with_alpha(&enough::Unstoppable);
    let _ = req.decode_ex(&enough::Unstoppable);

    let _ = DecodeRequest::new(data)
        .headerless()
        .with_limits(limits.clone())
        .decode(&enough::Unstoppable);
    let _ = DecodeRequest::new(data)
        .headerless()
        .with_mso_quirk()
        .with_limits(limits)
        .decode(&enough::Unstoppable);

    let _ = zendib::probe(data);
});
