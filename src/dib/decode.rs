//! Pixel body decoding: native bulk reads, sub-byte index unpacking,
//! masked truecolor conversion, and RLE dispatch.

use enough::Stop;

use super::cursor::Cursor;
use super::header::{COMPRESS_RLE4, COMPRESS_RLE8, DibHeader};
use super::mask::ColorMask;
use super::rle::decode_rle;
use crate::error::DibError;
use crate::raster::{AlphaChannel, PixelFormat, Raster};

/// Rows decoded between cancellation checks.
const STOP_ROWS: u32 = 16;

const DEFAULT_16_RED: u32 = 0x0000_7C00;
const DEFAULT_16_GREEN: u32 = 0x0000_03E0;
const DEFAULT_16_BLUE: u32 = 0x0000_001F;
const DEFAULT_32_RED: u32 = 0x00FF_0000;
const DEFAULT_32_GREEN: u32 = 0x0000_FF00;
const DEFAULT_32_BLUE: u32 = 0x0000_00FF;
const DEFAULT_32_ALPHA: u32 = 0xFF00_0000;

/// Read the pixel body described by `header` into `raster`.
///
/// `alpha`, when present, receives the 32-bit alpha channel in
/// transparency convention (0 = opaque). Returns whether any pixel
/// carried an alpha value other than fully opaque.
pub(crate) fn read_bits(
    cur: &mut Cursor<'_>,
    header: &mut DibHeader,
    raster: &mut Raster,
    mut alpha: Option<&mut AlphaChannel>,
    top_down: bool,
    aligned_width: usize,
    stop: &dyn Stop,
) -> Result<bool, DibError> {
    let width = raster.width() as usize;
    let height = raster.height();
    let rle = (header.compression == COMPRESS_RLE8 && header.bit_count == 8)
        || (header.compression == COMPRESS_RLE4 && header.bit_count == 4);
    let masked = alpha.is_none() && matches!(header.bit_count, 16 | 32);

    // Native layout: bottom-up rows already matching the raster's stride
    // can be read with one bulk copy. Palette rasters only qualify with
    // a full 256-entry color table, where no index needs clamping.
    let native = !top_down
        && !rle
        && !masked
        && raster.stride() == aligned_width
        && match raster.format() {
            PixelFormat::Bgr24 => header.bit_count == 24,
            PixelFormat::Pal8 => header.bit_count == 8 && raster.palette().len() == 256,
            PixelFormat::Bgra32 => false,
        };

    if native {
        if aligned_width
            .checked_mul(height as usize)
            .is_none_or(|total| total != raster.as_bytes().len())
        {
            return Err(DibError::UnexpectedEof);
        }
        cur.read_exact(raster.as_bytes_mut())?;
        return Ok(false);
    }

    if rle {
        if header.size_image == 0 {
            header.size_image = cur.remaining() as u32;
        }
        let size = header.size_image as usize;
        if size > cur.remaining() {
            return Err(DibError::UnexpectedEof);
        }
        let body = cur.take_slice(size)?;
        decode_rle(body, raster, header.compression == COMPRESS_RLE4, stop)?;
        return Ok(false);
    }

    if aligned_width > cur.remaining() {
        // Not even one row present; fail before touching pixels.
        return Err(DibError::UnexpectedEof);
    }

    let mask = if matches!(header.bit_count, 16 | 32) {
        let (red, green, blue) = if header.bit_count == 16 {
            (DEFAULT_16_RED, DEFAULT_16_GREEN, DEFAULT_16_BLUE)
        } else {
            (DEFAULT_32_RED, DEFAULT_32_GREEN, DEFAULT_32_BLUE)
        };
        let red = if header.mask_red > 0 { header.mask_red } else { red };
        let green = if header.mask_green > 0 {
            header.mask_green
        } else {
            green
        };
        let blue = if header.mask_blue > 0 {
            header.mask_blue
        } else {
            blue
        };
        let alpha_mask = if alpha.is_some() {
            Some(if header.mask_alpha > 0 {
                header.mask_alpha
            } else {
                DEFAULT_32_ALPHA
            })
        } else {
            None
        };
        Some(ColorMask::derive(red, green, blue, alpha_mask)?)
    } else {
        None
    };

    let pal_len = raster.palette().len();
    let sanitize = |index: u8| -> u8 {
        if pal_len > 0 && usize::from(index) >= pal_len {
            (usize::from(index) % pal_len) as u8
        } else {
            index
        }
    };

    let mut alpha_used = false;

    for n in 0..height {
        if n % STOP_ROWS == 0 {
            stop.check()?;
        }
        let y = if top_down { n } else { height - 1 - n };
        let row = cur.take_slice(aligned_width)?;

        match header.bit_count {
            1 => {
                let dst = raster.scanline_mut(y);
                let mut src = row.iter();
                let mut byte = 0u8;
                let mut shift = 0u32;
                for d in dst.iter_mut().take(width) {
                    if shift == 0 {
                        shift = 8;
                        byte = src.next().copied().unwrap_or(0);
                    }
                    shift -= 1;
                    *d = sanitize((byte >> shift) & 1);
                }
            }
            4 => {
                let dst = raster.scanline_mut(y);
                let mut src = row.iter();
                let mut byte = 0u8;
                let mut shift = 0u32;
                for d in dst.iter_mut().take(width) {
                    if shift == 0 {
                        shift = 2;
                        byte = src.next().copied().unwrap_or(0);
                    }
                    shift -= 1;
                    *d = sanitize((byte >> (shift << 2)) & 0x0F);
                }
            }
            8 => {
                let dst = raster.scanline_mut(y);
                for (d, &s) in dst.iter_mut().zip(row).take(width) {
                    *d = sanitize(s);
                }
            }
            16 => {
                let mask = mask.as_ref().ok_or(DibError::UnexpectedEof)?;
                let dst = raster.scanline_mut(y);
                for (d, s) in dst.chunks_exact_mut(3).zip(row.chunks_exact(2)).take(width) {
                    let c = mask.color_for_16bit([s[0], s[1]]);
                    d[0] = c.b;
                    d[1] = c.g;
                    d[2] = c.r;
                }
            }
            24 => {
                let dst = raster.scanline_mut(y);
                dst[..width * 3].copy_from_slice(&row[..width * 3]);
            }
            32 => {
                let mask = mask.as_ref().ok_or(DibError::UnexpectedEof)?;
                match alpha.as_deref_mut() {
                    Some(plane) => {
                        let alpha_row = plane.scanline_mut(y);
                        let dst = raster.scanline_mut(y);
                        for ((d, s), a) in dst
                            .chunks_exact_mut(3)
                            .zip(row.chunks_exact(4))
                            .zip(alpha_row.iter_mut())
                            .take(width)
                        {
                            let (c, av) = mask.color_and_alpha_for_32bit([s[0], s[1], s[2], s[3]]);
                            d[0] = c.b;
                            d[1] = c.g;
                            d[2] = c.r;
                            *a = 0xFF - av;
                            alpha_used |= av != 0xFF;
                        }
                    }
                    None => {
                        let dst = raster.scanline_mut(y);
                        for (d, s) in dst.chunks_exact_mut(3).zip(row.chunks_exact(4)).take(width) {
                            let c = mask.color_for_32bit([s[0], s[1], s[2], s[3]]);
                            d[0] = c.b;
                            d[1] = c.g;
                            d[2] = c.r;
                        }
                    }
                }
            }
            _ => return Err(DibError::UnsupportedVariant("bit depth".into())),
        }
    }

    Ok(alpha_used)
}
