//! Hostile-input behavior: damaged headers, truncated streams, and
//! resource limits must produce errors, never panics or huge
//! allocations.

use enough::Unstoppable;
use zendib::{DecodeRequest, DibError, EncodeRequest, Limits, Palette, PixelFormat, Raster};

fn info_header(w: i32, h: i32, bits: u16, comp: u32) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&40u32.to_le_bytes());
    v.extend_from_slice(&w.to_le_bytes());
    v.extend_from_slice(&h.to_le_bytes());
    v.extend_from_slice(&1u16.to_le_bytes());
    v.extend_from_slice(&bits.to_le_bytes());
    v.extend_from_slice(&comp.to_le_bytes());
    v.extend_from_slice(&[0u8; 24]);
    v
}

fn with_file_header(offset_after_fh: u32, body: &[u8]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(b"BM");
    v.extend_from_slice(&(14 + body.len() as u32).to_le_bytes());
    v.extend_from_slice(&[0u8; 4]);
    v.extend_from_slice(&(14 + offset_after_fh).to_le_bytes());
    v.extend_from_slice(body);
    v
}

fn sample_bgr24() -> Vec<u8> {
    let mut r = Raster::new(7, 5, PixelFormat::Bgr24, Palette::default()).unwrap();
    for y in 0..5 {
        for x in 0..7 {
            r.set_color(x, y, rgb::alt::BGR8 { b: x as u8, g: y as u8, r: 3 });
        }
    }
    EncodeRequest::new().encode(&r, &Unstoppable).unwrap()
}

fn sample_rle8() -> Vec<u8> {
    let mut r = Raster::new(9, 4, PixelFormat::Pal8, Palette::grayscale256()).unwrap();
    for y in 0..4 {
        for x in 0..9 {
            r.set_index(x, y, if x < 4 { 7 } else { x as u8 });
        }
    }
    EncodeRequest::new()
        .compressed()
        .encode(&r, &Unstoppable)
        .unwrap()
}

// ── truncation ───────────────────────────────────────────────────────

#[test]
fn every_prefix_of_uncompressed_file_errors() {
    let bytes = sample_bgr24();
    for len in 0..bytes.len() {
        assert!(
            DecodeRequest::new(&bytes[..len]).decode(&Unstoppable).is_err(),
            "prefix of {len} bytes decoded"
        );
    }
}

#[test]
fn every_prefix_of_rle_file_errors() {
    let bytes = sample_rle8();
    for len in 0..bytes.len() {
        assert!(
            DecodeRequest::new(&bytes[..len]).decode(&Unstoppable).is_err(),
            "prefix of {len} bytes decoded"
        );
    }
}

#[test]
fn empty_and_tiny_inputs() {
    assert!(matches!(
        DecodeRequest::new(&[]).decode(&Unstoppable),
        Err(DibError::UnexpectedEof)
    ));
    assert!(matches!(
        DecodeRequest::new(b"XX______").decode(&Unstoppable),
        Err(DibError::UnrecognizedFormat)
    ));
}

// ── header damage ────────────────────────────────────────────────────

#[test]
fn pixel_offset_past_end_is_rejected() {
    let body = info_header(1, 1, 24, 0);
    let mut bytes = with_file_header(40, &body);
    let far = (bytes.len() as u32 + 100).to_le_bytes();
    bytes[10..14].copy_from_slice(&far);
    assert!(matches!(
        DecodeRequest::new(&bytes).decode(&Unstoppable),
        Err(DibError::InvalidHeader(_))
    ));
}

#[test]
fn height_underflow_is_rejected() {
    let body = info_header(1, i32::MIN, 24, 0);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40, &body)).decode(&Unstoppable),
        Err(DibError::InvalidHeader(_))
    ));
}

#[test]
fn zero_dimensions_are_rejected() {
    let mut body = info_header(0, 4, 24, 0);
    body.extend_from_slice(&[0u8; 64]);
    assert!(
        DecodeRequest::new(&with_file_header(40, &body))
            .decode(&Unstoppable)
            .is_err()
    );
}

#[test]
fn bad_plane_count_is_rejected() {
    let mut body = info_header(1, 1, 24, 0);
    body[12] = 2; // planes
    body.extend_from_slice(&[0u8; 4]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40, &body)).decode(&Unstoppable),
        Err(DibError::InvalidHeader(_))
    ));
}

#[test]
fn odd_bit_depth_is_rejected() {
    let mut body = info_header(1, 1, 3, 0);
    body.extend_from_slice(&[0u8; 4]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40, &body)).decode(&Unstoppable),
        Err(DibError::UnsupportedVariant(_))
    ));
}

#[test]
fn embedded_jpeg_payload_is_rejected() {
    let mut body = info_header(1, 1, 0, 4);
    body.extend_from_slice(&[0u8; 16]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40, &body)).decode(&Unstoppable),
        Err(DibError::UnsupportedVariant(_))
    ));
}

// ── compression field damage ─────────────────────────────────────────

#[test]
fn unknown_compression_with_nonzero_low_nibble_fails() {
    let mut bytes = sample_bgr24();
    bytes[30..34].copy_from_slice(&0x21u32.to_le_bytes());
    assert!(matches!(
        DecodeRequest::new(&bytes).decode(&Unstoppable),
        Err(DibError::UnsupportedVariant(_))
    ));
}

#[test]
fn unknown_compression_with_zero_low_nibble_downgrades() {
    let baseline = sample_bgr24();
    let expected = DecodeRequest::new(&baseline).decode(&Unstoppable).unwrap();

    let mut bytes = baseline;
    bytes[30..34].copy_from_slice(&0x20u32.to_le_bytes());
    let out = DecodeRequest::new(&bytes).decode(&Unstoppable).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn rle8_with_wrong_bit_depth_is_rejected() {
    let mut body = info_header(2, 2, 24, 1);
    body.extend_from_slice(&[0u8; 16]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40, &body)).decode(&Unstoppable),
        Err(DibError::InvalidHeader(_))
    ));
}

#[test]
fn rle_stream_too_small_for_claimed_size_fails_early() {
    // Huge dimensions, one opcode of data: the 256x expansion bound
    // cannot cover the claimed width.
    let mut body = info_header(50_000, 50_000, 8, 1);
    body.extend_from_slice(&[0u8; 1024]); // implicit 256-entry color table
    body.extend_from_slice(&[0, 1]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40 + 1024, &body)).decode(&Unstoppable),
        Err(DibError::UnexpectedEof)
    ));
}

#[test]
fn huge_uncompressed_header_over_tiny_stream_fails_before_allocating() {
    // 100000x100000 at 24 bits would be a ~30 GB raster; the stream
    // holds 100 bytes.
    let mut body = info_header(100_000, 100_000, 24, 0);
    body.extend_from_slice(&[0u8; 100]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40, &body)).decode(&Unstoppable),
        Err(DibError::UnexpectedEof)
    ));
}

#[test]
fn truncated_rle_opcode_is_malformed() {
    let mut body = info_header(4, 4, 8, 1);
    body.extend_from_slice(&[0u8; 1024]); // implicit 256-entry color table
    let mut bytes = with_file_header(40 + 1024, &body);
    bytes.extend_from_slice(&[0, 5, 1]); // absolute run of 5, one byte present
    assert!(
        DecodeRequest::new(&bytes).decode(&Unstoppable).is_err()
    );
}

#[test]
fn non_contiguous_bitfields_mask_is_rejected() {
    let mut body = info_header(1, 1, 16, 3);
    body.extend_from_slice(&0x0005u32.to_le_bytes()); // red: bits 0 and 2
    body.extend_from_slice(&0x07E0u32.to_le_bytes());
    body.extend_from_slice(&0x001Fu32.to_le_bytes());
    body.extend_from_slice(&[0u8; 4]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40 + 12, &body)).decode(&Unstoppable),
        Err(DibError::InvalidHeader(_))
    ));
}

// ── zlib wrap damage ─────────────────────────────────────────────────

#[test]
fn garbage_zlib_body_fails_inflate() {
    let mut body = info_header(4, 4, 24, 0x0100_4453);
    body.extend_from_slice(&64u32.to_le_bytes()); // coded size
    body.extend_from_slice(&64u32.to_le_bytes()); // uncoded size
    body.extend_from_slice(&0u32.to_le_bytes()); // inner compression
    body.extend_from_slice(&[0x55u8; 64]);
    assert!(matches!(
        DecodeRequest::new(&with_file_header(40, &body)).decode(&Unstoppable),
        Err(DibError::InflateFailed)
    ));
}

// ── limits ───────────────────────────────────────────────────────────

#[test]
fn pixel_limit_stops_decode_before_allocation() {
    let bytes = sample_bgr24(); // 7x5
    let limits = Limits {
        max_pixels: Some(16),
        ..Limits::default()
    };
    assert!(matches!(
        DecodeRequest::new(&bytes)
            .with_limits(limits)
            .decode(&Unstoppable),
        Err(DibError::LimitExceeded(_))
    ));
}

#[test]
fn memory_limit_covers_the_raster() {
    let bytes = sample_bgr24();
    let limits = Limits {
        max_memory_bytes: Some(32),
        ..Limits::default()
    };
    assert!(matches!(
        DecodeRequest::new(&bytes)
            .with_limits(limits)
            .decode(&Unstoppable),
        Err(DibError::LimitExceeded(_))
    ));
}
