//! Zlib-wrapped pixel bodies ('SD' compression tag).
//!
//! The wrapped body starts with a 12-byte prefix: coded byte count,
//! uncoded byte count, and the compression code of the inflated body.

use alloc::vec::Vec;

use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;

use super::cursor::{Cursor, Writer};
use crate::error::DibError;
use crate::limits::Limits;

const DEFLATE_LEVEL: u8 = 3;

#[derive(Debug)]
pub(crate) struct Unwrapped {
    pub data: Vec<u8>,
    /// Compression code of the inflated body (usually none or RLE).
    pub inner_compression: u32,
}

/// Read the prefix and inflate the body. A coded size beyond the end of
/// the stream is clamped, but an inflate that yields fewer bytes than
/// the prefix promised is a hard failure.
pub(crate) fn read_wrapped(cur: &mut Cursor<'_>, limits: &Limits) -> Result<Unwrapped, DibError> {
    let coded_size = cur.read_u32_le()? as usize;
    let uncoded_size = cur.read_u32_le()? as usize;
    let inner_compression = cur.read_u32_le()?;

    limits.check_memory(uncoded_size as u64)?;

    let coded_size = coded_size.min(cur.remaining());
    let coded = cur.take_slice(coded_size)?;

    let data =
        decompress_to_vec_zlib_with_limit(coded, uncoded_size).map_err(|_| DibError::InflateFailed)?;
    if data.len() < uncoded_size {
        return Err(DibError::InflateFailed);
    }

    Ok(Unwrapped {
        data,
        inner_compression,
    })
}

/// Deflate `body` and write it with its prefix.
pub(crate) fn write_wrapped(w: &mut Writer, inner_compression: u32, body: &[u8]) {
    let coded = compress_to_vec_zlib(body, DEFLATE_LEVEL);
    w.write_u32_le(coded.len() as u32);
    w.write_u32_le(body.len() as u32);
    w.write_u32_le(inner_compression);
    w.write_bytes(&coded);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_round_trip() {
        let body: Vec<u8> = (0..200u8).cycle().take(4096).collect();
        let mut w = Writer::new();
        write_wrapped(&mut w, 0, &body);
        let wrapped = w.into_vec();

        let mut cur = Cursor::new(&wrapped);
        let out = read_wrapped(&mut cur, &Limits::default()).unwrap();
        assert_eq!(out.inner_compression, 0);
        assert_eq!(out.data, body);
        assert_eq!(cur.remaining(), 0);
    }

    #[test]
    fn short_inflate_is_rejected() {
        let body = [7u8; 64];
        let mut w = Writer::new();
        write_wrapped(&mut w, 0, &body);
        let mut wrapped = w.into_vec();
        // Claim more uncoded bytes than the stream inflates to.
        wrapped[4..8].copy_from_slice(&128u32.to_le_bytes());

        let mut cur = Cursor::new(&wrapped);
        let err = read_wrapped(&mut cur, &Limits::default()).unwrap_err();
        assert!(matches!(err, DibError::InflateFailed));
    }

    #[test]
    fn uncoded_size_honors_memory_limit() {
        let mut w = Writer::new();
        write_wrapped(&mut w, 0, &[0u8; 1024]);
        let wrapped = w.into_vec();

        let limits = Limits {
            max_memory_bytes: Some(512),
            ..Limits::default()
        };
        let mut cur = Cursor::new(&wrapped);
        let err = read_wrapped(&mut cur, &limits).unwrap_err();
        assert!(matches!(err, DibError::LimitExceeded(_)));
    }
}
