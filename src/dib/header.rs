//! Info-header parsing and writing for the three header generations
//! plus the legacy MS-Office hybrid layout.

use super::cursor::{Cursor, Writer};
use crate::error::DibError;

pub(crate) const CORE_HEADER_SIZE: u32 = 12;
pub(crate) const INFO_HEADER_SIZE: u32 = 40;
pub(crate) const V5_HEADER_SIZE: u32 = 124;

pub(crate) const COMPRESS_NONE: u32 = 0;
pub(crate) const COMPRESS_RLE8: u32 = 1;
pub(crate) const COMPRESS_RLE4: u32 = 2;
pub(crate) const COMPRESS_BITFIELDS: u32 = 3;
/// Private zlib-wrapped body: 'S','D' tag bytes plus version 1 in the
/// top byte. Not a Windows compression code.
pub(crate) const COMPRESS_ZLIB: u32 = 0x0100_4453;

/// Decode/encode-time header record covering every field up to V5.
/// Height is kept positive; orientation travels separately.
#[derive(Clone, Debug, Default)]
pub(crate) struct DibHeader {
    pub size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
    pub x_pels_per_meter: i32,
    pub y_pels_per_meter: i32,
    pub cols_used: u32,
    pub cols_important: u32,
    pub mask_red: u32,
    pub mask_green: u32,
    pub mask_blue: u32,
    pub mask_alpha: u32,
}

/// Field reader that stops consuming once the declared header size is
/// exhausted, so short and oversized headers both parse.
struct BoundedFields<'c, 'a> {
    cur: &'c mut Cursor<'a>,
    used: u32,
    size: u32,
}

impl BoundedFields<'_, '_> {
    fn u16(&mut self, v: &mut u16) -> Result<(), DibError> {
        if self.used < self.size {
            *v = self.cur.read_u16_le()?;
            self.used += 2;
        }
        Ok(())
    }

    fn u32(&mut self, v: &mut u32) -> Result<(), DibError> {
        if self.used < self.size {
            *v = self.cur.read_u32_le()?;
            self.used += 4;
        }
        Ok(())
    }

    fn i32(&mut self, v: &mut i32) -> Result<(), DibError> {
        if self.used < self.size {
            *v = self.cur.read_i32_le()?;
            self.used += 4;
        }
        Ok(())
    }

    fn skip_u32s(&mut self, count: usize) -> Result<(), DibError> {
        let mut scratch = 0u32;
        for _ in 0..count {
            self.u32(&mut scratch)?;
        }
        Ok(())
    }
}

/// Parse an info header of any supported shape. Returns the normalized
/// header and whether the image is stored top-down.
pub(crate) fn read_header(
    cur: &mut Cursor<'_>,
    mso_quirk: bool,
) -> Result<(DibHeader, bool), DibError> {
    if cur.remaining() <= 4 {
        return Err(DibError::UnexpectedEof);
    }
    let start_pos = cur.position();
    let mut h = DibHeader {
        size: cur.read_u32_le()?,
        ..DibHeader::default()
    };

    if h.size == CORE_HEADER_SIZE {
        // BITMAPCOREHEADER: 16-bit geometry, no compression fields.
        h.width = i32::from(cur.read_i16_le()?);
        h.height = i32::from(cur.read_i16_le()?);
        h.planes = cur.read_u16_le()?;
        h.bit_count = cur.read_u16_le()?;
    } else if mso_quirk && h.size == INFO_HEADER_SIZE {
        // Historically malformed 40-byte header some MS-Office
        // producers emit: 16-bit geometry, 8-bit planes/bitcount,
        // 16-bit size/compression.
        h.width = i32::from(cur.read_i16_le()?);
        h.height = i32::from(cur.read_i16_le()?);
        h.planes = u16::from(cur.read_u8()?);
        h.bit_count = u16::from(cur.read_u8()?);
        h.size_image = cur.read_i16_le()? as u32;
        h.compression = cur.read_i16_le()? as u32;
        if h.size_image == 0 {
            let row_bits = i64::from(h.width) * i64::from(h.bit_count);
            h.size_image = (((row_bits + 31) & !31) / 8 * i64::from(h.height)) as u32;
        }
        h.x_pels_per_meter = cur.read_i32_le()?;
        h.y_pels_per_meter = cur.read_i32_le()?;
        h.cols_used = cur.read_u32_le()?;
        h.cols_important = cur.read_u32_le()?;
    } else {
        // BITMAPINFOHEADER, BITMAPV5HEADER or unknown: read field by
        // field as far as the declared size allows, ignoring trailing
        // fields of headers newer than we know.
        let mut f = BoundedFields {
            cur,
            used: 4,
            size: h.size,
        };

        f.i32(&mut h.width)?;
        f.i32(&mut h.height)?;
        f.u16(&mut h.planes)?;
        f.u16(&mut h.bit_count)?;
        f.u32(&mut h.compression)?;
        f.u32(&mut h.size_image)?;
        f.i32(&mut h.x_pels_per_meter)?;
        f.i32(&mut h.y_pels_per_meter)?;
        f.u32(&mut h.cols_used)?;
        f.u32(&mut h.cols_important)?;

        // V4/V5 members: masks, colorspace, endpoints, gammas, intent,
        // ICC profile reference. Only the masks matter here.
        f.u32(&mut h.mask_red)?;
        f.u32(&mut h.mask_green)?;
        f.u32(&mut h.mask_blue)?;
        f.u32(&mut h.mask_alpha)?;
        f.skip_u32s(1)?; // colorspace type
        f.skip_u32s(9)?; // CIE endpoints
        f.skip_u32s(3)?; // gamma
        f.skip_u32s(4)?; // intent, profile data/size, reserved

        // WinBMPv3-NT: a 40-byte header with BITFIELDS compression is
        // followed by a raw 12-byte color-mask block.
        let mut color_mask = 0u32;
        if h.compression == COMPRESS_BITFIELDS && h.size == INFO_HEADER_SIZE {
            h.mask_red = cur.read_u32_le()?;
            h.mask_green = cur.read_u32_le()?;
            h.mask_blue = cur.read_u32_le()?;
            color_mask = 12;
        }

        let end = (start_pos as u64)
            .checked_add(u64::from(h.size) + u64::from(color_mask))
            .ok_or(DibError::UnexpectedEof)?;
        let end = usize::try_from(end).map_err(|_| DibError::UnexpectedEof)?;
        cur.set_position(end)?;
    }

    if h.height == i32::MIN {
        return Err(DibError::InvalidHeader("height underflows".into()));
    }
    let top_down = h.height < 0;
    if top_down {
        h.height = -h.height;
    }

    if h.width < 0 || h.x_pels_per_meter < 0 || h.y_pels_per_meter < 0 {
        return Err(DibError::InvalidHeader(
            "negative width or resolution".into(),
        ));
    }

    // Damaged files sometimes carry absurd image sizes; an image size
    // field implying more than 16 bytes per pixel cannot be real.
    if h.height != 0 && (h.size_image / 16 / h.height as u32) > h.width as u32 {
        h.size_image = 0;
    }

    if h.planes != 1 {
        return Err(DibError::InvalidHeader(alloc::format!(
            "plane count {} (must be 1)",
            h.planes
        )));
    }

    if !matches!(h.bit_count, 0 | 1 | 4 | 8 | 16 | 24 | 32) {
        return Err(DibError::UnsupportedVariant(alloc::format!(
            "bit depth {} unsupported",
            h.bit_count
        )));
    }

    Ok((h, top_down))
}

/// Write the 40-byte BITMAPINFOHEADER layout. Core and V5 shapes are
/// read-only legacy support and never produced. Returns the position of
/// the image-size field so the caller can backpatch it after the pixel
/// data is written.
pub(crate) fn write_info_header(w: &mut Writer, h: &DibHeader) -> usize {
    w.write_u32_le(INFO_HEADER_SIZE);
    w.write_i32_le(h.width);
    w.write_i32_le(h.height);
    w.write_u16_le(1); // planes
    w.write_u16_le(h.bit_count);
    w.write_u32_le(h.compression);
    let size_image_pos = w.reserve_u32();
    w.write_i32_le(h.x_pels_per_meter);
    w.write_i32_le(h.y_pels_per_meter);
    w.write_u32_le(h.cols_used);
    w.write_u32_le(h.cols_important);
    size_image_pos
}
