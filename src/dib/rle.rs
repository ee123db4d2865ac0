//! RLE4/RLE8 pixel codec.
//!
//! Escape opcodes (count byte 0): 0 = end of line, 1 = end of bitmap,
//! 2 = position delta, >= 3 = absolute literal run padded to a 16-bit
//! boundary. Any other count byte is an encoded run.

use enough::Stop;

use super::cursor::Writer;
use crate::error::DibError;
use crate::raster::Raster;

/// Opcodes processed between cancellation checks.
const STOP_INTERVAL: u32 = 1024;

/// Decode an RLE-compressed pixel body into a `Pal8` raster.
///
/// Pixel writes outside the image and palette indices outside the color
/// table are clamped, never errors; a malformed stream only fails when
/// it runs out of bytes mid-opcode.
pub(crate) fn decode_rle(
    data: &[u8],
    raster: &mut Raster,
    rle4: bool,
    stop: &dyn Stop,
) -> Result<(), DibError> {
    let width = u64::from(raster.width());
    let pal_len = raster.palette().len();
    let sanitize = |index: u8| -> u8 {
        if pal_len > 0 && usize::from(index) >= pal_len {
            (usize::from(index) % pal_len) as u8
        } else {
            index
        }
    };

    let mut pos = 0usize;
    let mut next = |pos: &mut usize| -> Result<u8, DibError> {
        let b = *data
            .get(*pos)
            .ok_or(DibError::MalformedRle("opcode stream truncated"))?;
        *pos += 1;
        Ok(b)
    };

    let mut y = i64::from(raster.height()) - 1;
    let mut x = 0u64;
    let mut opcodes = 0u32;
    let mut done = false;

    while !done && y >= 0 {
        opcodes += 1;
        if opcodes == STOP_INTERVAL {
            stop.check()?;
            opcodes = 0;
        }

        let count = next(&mut pos)?;
        if count == 0 {
            let run = next(&mut pos)?;
            match run {
                0 => {
                    y -= 1;
                    x = 0;
                }
                1 => done = true,
                2 => {
                    x += u64::from(next(&mut pos)?);
                    y -= i64::from(next(&mut pos)?);
                }
                _ => {
                    // Absolute literal of `run` pixels.
                    if rle4 {
                        for _ in 0..run >> 1 {
                            let b = next(&mut pos)?;
                            if x < width {
                                raster.set_index(x as u32, y as u32, sanitize(b >> 4));
                                x += 1;
                            }
                            if x < width {
                                raster.set_index(x as u32, y as u32, sanitize(b & 0x0F));
                                x += 1;
                            }
                        }
                        if run & 1 != 0 {
                            let b = next(&mut pos)?;
                            if x < width {
                                raster.set_index(x as u32, y as u32, sanitize(b >> 4));
                                x += 1;
                            }
                        }
                        // Literal runs are padded to 16-bit boundaries.
                        if ((u16::from(run) + 1) >> 1) & 1 != 0 {
                            next(&mut pos)?;
                        }
                    } else {
                        for _ in 0..run {
                            let b = next(&mut pos)?;
                            if x < width {
                                raster.set_index(x as u32, y as u32, sanitize(b));
                                x += 1;
                            }
                        }
                        if run & 1 != 0 {
                            next(&mut pos)?;
                        }
                    }
                }
            }
        } else {
            let value = next(&mut pos)?;
            if rle4 {
                let hi = sanitize(value >> 4);
                let lo = sanitize(value & 0x0F);
                let mut i = 0;
                while i + 1 < count && x < width {
                    raster.set_index(x as u32, y as u32, hi);
                    x += 1;
                    if x < width {
                        raster.set_index(x as u32, y as u32, lo);
                        x += 1;
                    }
                    i += 2;
                }
                if count & 1 != 0 && x < width {
                    raster.set_index(x as u32, y as u32, hi);
                    x += 1;
                }
            } else {
                let index = sanitize(value);
                for _ in 0..count {
                    if x >= width {
                        break;
                    }
                    raster.set_index(x as u32, y as u32, index);
                    x += 1;
                }
            }
        }
    }

    Ok(())
}

/// Encode a `Pal8` raster as RLE4 or RLE8. Runs of 2 or more pixels
/// become encoded runs; literal stretches use absolute mode once longer
/// than 3 pixels, single pixels otherwise.
pub(crate) fn encode_rle(
    w: &mut Writer,
    raster: &Raster,
    rle4: bool,
    stop: &dyn Stop,
) -> Result<(), DibError> {
    let width = raster.width();
    let height = raster.height();

    // Wire rows are stored bottom-up.
    for n in 0..height {
        stop.check()?;
        let y = height - 1 - n;
        let mut x = 0u32;

        while x < width {
            let mut count = 1u32;
            let pix = raster.index_at(x, y);
            x += 1;

            while x < width && count < 255 && pix == raster.index_at(x, y) {
                x += 1;
                count += 1;
            }

            if count > 1 {
                w.write_u8(count as u8);
                w.write_u8(if rle4 { (pix << 4) | pix } else { pix });
                continue;
            }

            // Scan ahead for a literal stretch of distinct pixels.
            let save = x - 1;
            let mut last = pix;
            let mut found = false;
            while x < width && count < 256 {
                let p = raster.index_at(x, y);
                if p == last {
                    break;
                }
                x += 1;
                count += 1;
                last = p;
                found = true;
            }
            if found {
                // The last scanned pixel starts a run; leave it for the
                // next pass.
                x -= 1;
            }

            if count > 3 {
                count -= 1;
                w.write_u8(0);
                w.write_u8(count as u8);

                let bytes = if rle4 {
                    let mut i = 0;
                    while i < count {
                        let mut b = raster.index_at(save + i, y) << 4;
                        if i + 1 < count {
                            b |= raster.index_at(save + i + 1, y);
                        }
                        w.write_u8(b);
                        i += 2;
                    }
                    (count + 1) >> 1
                } else {
                    for i in 0..count {
                        w.write_u8(raster.index_at(save + i, y));
                    }
                    count
                };
                if bytes & 1 != 0 {
                    w.write_u8(0);
                }
            } else {
                let shift = if rle4 { 4 } else { 0 };
                w.write_u8(1);
                w.write_u8(raster.index_at(save, y) << shift);
                if count == 3 {
                    w.write_u8(1);
                    w.write_u8(raster.index_at(save + 1, y) << shift);
                }
            }
        }

        // Row terminator.
        w.write_u8(0);
        w.write_u8(0);
    }

    // Stream terminator.
    w.write_u8(0);
    w.write_u8(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{Palette, PixelFormat};
    use enough::Unstoppable;
    use rgb::alt::BGR8;

    fn pal8_raster(width: u32, height: u32) -> Raster {
        let entries = (0..16).map(|v| BGR8 { b: v, g: v, r: v }).collect();
        Raster::new(width, height, PixelFormat::Pal8, Palette::new(entries)).unwrap()
    }

    #[test]
    fn rle8_round_trip_recovers_indices() {
        let mut src = pal8_raster(7, 3);
        let pattern = [
            [1u8, 1, 1, 1, 2, 3, 4],
            [5, 5, 0, 0, 0, 0, 0],
            [9, 8, 7, 6, 5, 4, 3],
        ];
        for (y, row) in pattern.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                src.set_index(x as u32, y as u32, v);
            }
        }

        let mut w = Writer::new();
        encode_rle(&mut w, &src, false, &Unstoppable).unwrap();
        let encoded = w.into_vec();

        let mut dst = pal8_raster(7, 3);
        decode_rle(&encoded, &mut dst, false, &Unstoppable).unwrap();
        for (y, row) in pattern.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                assert_eq!(dst.index_at(x as u32, y as u32), v, "at {x},{y}");
            }
        }
    }

    #[test]
    fn rle4_round_trip_recovers_indices() {
        let mut src = pal8_raster(6, 2);
        let pattern = [[0u8, 1, 2, 3, 3, 3], [15, 15, 15, 15, 7, 8]];
        for (y, row) in pattern.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                src.set_index(x as u32, y as u32, v);
            }
        }

        let mut w = Writer::new();
        encode_rle(&mut w, &src, true, &Unstoppable).unwrap();
        let encoded = w.into_vec();

        let mut dst = pal8_raster(6, 2);
        decode_rle(&encoded, &mut dst, true, &Unstoppable).unwrap();
        for (y, row) in pattern.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                assert_eq!(dst.index_at(x as u32, y as u32), v, "at {x},{y}");
            }
        }
    }

    #[test]
    fn truncated_opcode_fails_cleanly() {
        let mut dst = pal8_raster(4, 4);
        // Encoded run missing its value byte.
        let err = decode_rle(&[5], &mut dst, false, &Unstoppable).unwrap_err();
        assert!(matches!(err, DibError::MalformedRle(_)));
    }

    #[test]
    fn delta_and_out_of_range_indices_are_tolerated() {
        let mut dst = pal8_raster(4, 4);
        // Delta right 2 down 1, then a run of index 200 in a 16-entry
        // palette (wraps to 200 % 16 = 8), then end of bitmap.
        let stream = [0u8, 2, 2, 1, 3, 200, 0, 1];
        decode_rle(&stream, &mut dst, false, &Unstoppable).unwrap();
        assert_eq!(dst.index_at(2, 2), 8);
        assert_eq!(dst.index_at(3, 2), 8);
        assert_eq!(dst.index_at(0, 0), 0);
    }
}
