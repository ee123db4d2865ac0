//! Pixel body encoding.
//!
//! Output depths are discretized to 8-bit palette or 24-bit truecolor
//! (4-bit only as an RLE4 body); 32-bit rasters drop their alpha byte
//! here and carry it via the extended container framing instead.

use enough::Stop;

use super::cursor::Writer;
use super::header::{COMPRESS_RLE4, COMPRESS_RLE8};
use super::rle::encode_rle;
use crate::error::DibError;
use crate::raster::{PixelFormat, Raster, aligned_width_4};

/// Bit depth a raster is stored at on the wire.
pub(crate) fn wire_bit_count(raster: &Raster, compression: u32) -> u16 {
    match raster.format() {
        PixelFormat::Pal8 => {
            if compression == COMPRESS_RLE4 {
                4
            } else {
                8
            }
        }
        PixelFormat::Bgr24 | PixelFormat::Bgra32 => 24,
    }
}

/// Write the pixel body bottom-up. Returns the number of body bytes
/// written so the caller can backpatch the header's image-size field.
pub(crate) fn write_bits(
    w: &mut Writer,
    raster: &Raster,
    compression: u32,
    stop: &dyn Stop,
) -> Result<usize, DibError> {
    let start = w.position();

    if compression == COMPRESS_RLE4 || compression == COMPRESS_RLE8 {
        encode_rle(w, raster, compression == COMPRESS_RLE4, stop)?;
        return Ok(w.position() - start);
    }

    let width = raster.width() as usize;
    let height = raster.height();
    let bit_count = wire_bit_count(raster, compression);
    let aligned =
        aligned_width_4(u64::from(raster.width()) * u64::from(bit_count)) as usize;

    match raster.format() {
        // Raster rows are already bottom-up at the wire stride.
        PixelFormat::Pal8 | PixelFormat::Bgr24 => {
            stop.check()?;
            w.write_bytes(raster.as_bytes());
        }
        PixelFormat::Bgra32 => {
            let mut row = alloc::vec![0u8; aligned];
            for n in 0..height {
                if n % 16 == 0 {
                    stop.check()?;
                }
                let y = height - 1 - n;
                let src = raster.scanline(y);
                for (d, s) in row.chunks_exact_mut(3).zip(src.chunks_exact(4)).take(width) {
                    d[0] = s[0];
                    d[1] = s[1];
                    d[2] = s[2];
                }
                w.write_bytes(&row);
            }
        }
    }

    Ok(w.position() - start)
}
