//! DIB/BMP container framing and the public decode/encode requests.
//!
//! A stream is: optional 14-byte file header, info header (one of three
//! generations), color table, optional gap, pixel body. The extended
//! clipboard form appends a magic-tagged trailer carrying an alpha
//! plane as a second complete BMP.

use alloc::vec::Vec;

use enough::Stop;
use rgb::alt::BGR8;

use crate::error::DibError;
use crate::limits::Limits;
use crate::raster::{AlphaChannel, Palette, PixelFormat, Raster, aligned_width_4};

mod cursor;
mod decode;
mod encode;
mod header;
mod mask;
mod palette;
mod rle;
mod zcompress;

use cursor::{Cursor, Writer};
use header::{
    COMPRESS_BITFIELDS, COMPRESS_NONE, COMPRESS_RLE4, COMPRESS_RLE8, COMPRESS_ZLIB,
    CORE_HEADER_SIZE, DibHeader, INFO_HEADER_SIZE, V5_HEADER_SIZE,
};

const FILE_HEADER_SIZE: u64 = 14;
const MAGIC_BM: u16 = 0x4D42;
const MAGIC_BA: u16 = 0x4142;

// Trailer markers after the magic pair.
const TRAILER_MAGIC_1: u32 = 0x2509_1962;
const TRAILER_MAGIC_2: u32 = 0xACB2_0201;
const TRAILER_NONE: u8 = 0;
const TRAILER_COLOR: u8 = 1;
const TRAILER_BITMAP: u8 = 2;

/// Parse the file header. Returns the pixel-data offset relative to the
/// position after the file header.
fn read_file_header(cur: &mut Cursor<'_>) -> Result<u64, DibError> {
    let magic = cur.read_u16_le()?;
    let offset = match magic {
        MAGIC_BM => {
            cur.skip(8)?;
            u64::from(cur.read_u32_le()?)
                .checked_sub(FILE_HEADER_SIZE)
                .ok_or(DibError::InvalidHeader("pixel offset inside file header".into()))?
        }
        MAGIC_BA => {
            // Bitmap array: step into the first embedded bitmap.
            cur.skip(12)?;
            if cur.read_u16_le()? != MAGIC_BM {
                return Err(DibError::UnrecognizedFormat);
            }
            cur.skip(8)?;
            u64::from(cur.read_u32_le()?)
                .checked_sub(28)
                .ok_or(DibError::InvalidHeader("pixel offset inside file header".into()))?
        }
        _ => return Err(DibError::UnrecognizedFormat),
    };

    if offset >= cur.len() as u64 {
        return Err(DibError::InvalidHeader("pixel offset past end of stream".into()));
    }
    Ok(offset)
}

/// Read one complete DIB (header, palette, pixels) from the cursor.
fn read_dib(
    cur: &mut Cursor<'_>,
    file_header: bool,
    want_alpha: bool,
    mso_quirk: bool,
    limits: &Limits,
    stop: &dyn Stop,
) -> Result<(Raster, Option<AlphaChannel>), DibError> {
    if file_header {
        let offset = read_file_header(cur)?;
        // Only a V5-sized header can legitimately carry an alpha mask.
        let want_alpha = want_alpha && offset >= u64::from(V5_HEADER_SIZE);
        read_body(cur, offset, want_alpha, mso_quirk, limits, stop)
    } else {
        read_body(cur, 0, false, mso_quirk, limits, stop)
    }
}

fn read_body(
    cur: &mut Cursor<'_>,
    offset: u64,
    want_alpha: bool,
    mso_quirk: bool,
    limits: &Limits,
    stop: &dyn Stop,
) -> Result<(Raster, Option<AlphaChannel>), DibError> {
    let body_start = cur.position();
    let (mut header, top_down) = header::read_header(cur, mso_quirk)?;

    if header.bit_count == 0 {
        // biBitCount 0 means an embedded JPEG/PNG payload.
        return Err(DibError::UnsupportedVariant("embedded JPEG/PNG payload".into()));
    }
    if header.width <= 0 || header.height <= 0 {
        return Err(DibError::InvalidHeader(alloc::format!(
            "dimensions {}x{}",
            header.width,
            header.height
        )));
    }
    if offset != 0 && u64::from(header.size) > offset {
        return Err(DibError::InvalidHeader(
            "header size extends into pixel data".into(),
        ));
    }

    let colors: usize = if header.bit_count <= 8 {
        // The used-colors field truncates to 16 bits on the wire; a
        // zero (stated or truncated) means a full-size table.
        match header.cols_used as u16 as usize {
            0 => 1usize << header.bit_count,
            c => c,
        }
    } else {
        0
    };

    if header.compression == COMPRESS_ZLIB {
        // Palette and pixels live inside the wrapped body; the outer
        // stream's pixel offset no longer applies.
        let unwrapped = zcompress::read_wrapped(cur, limits)?;
        header.compression = unwrapped.inner_compression;
        let mut inner = Cursor::new(&unwrapped.data);
        finish_body(&mut inner, header, top_down, colors, 0, 0, want_alpha, limits, stop)
    } else {
        finish_body(
            cur, header, top_down, colors, body_start, offset, want_alpha, limits, stop,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn finish_body(
    cur: &mut Cursor<'_>,
    mut header: DibHeader,
    top_down: bool,
    colors: usize,
    body_start: usize,
    offset: u64,
    want_alpha: bool,
    limits: &Limits,
    stop: &dyn Stop,
) -> Result<(Raster, Option<AlphaChannel>), DibError> {
    let pal = if colors > 0 {
        let entry_size = if header.size == CORE_HEADER_SIZE { 3 } else { 4 };
        palette::read_palette(cur, colors, entry_size)?
    } else {
        Palette::default()
    };

    if offset != 0 {
        // Seeking backwards would re-read header bytes as pixels; only
        // skip forward over a gap before the pixel data.
        let target = (body_start as u64)
            .checked_add(offset)
            .ok_or(DibError::UnexpectedEof)?;
        if target > cur.position() as u64 {
            let target = usize::try_from(target).map_err(|_| DibError::UnexpectedEof)?;
            cur.set_position(target)?;
        }
    }

    let width = header.width as u32;
    let height = header.height as u32;
    let bits_per_line = u64::from(width) * u64::from(header.bit_count);
    if bits_per_line > u64::from(u32::MAX) {
        return Err(DibError::DimensionsTooLarge { width, height });
    }
    let aligned = aligned_width_4(bits_per_line);

    // Cheap truncation checks before any allocation. The RLE ratios are
    // deliberately generous; they only catch absurd header/stream pairs.
    let remaining = cur.remaining() as u64;
    match header.compression {
        COMPRESS_RLE8 => {
            if header.bit_count != 8 {
                return Err(DibError::InvalidHeader("RLE8 requires 8 bits per pixel".into()));
            }
            if remaining.saturating_mul(256) / u64::from(height) < u64::from(width) {
                return Err(DibError::UnexpectedEof);
            }
        }
        COMPRESS_RLE4 => {
            if header.bit_count != 4 {
                return Err(DibError::InvalidHeader("RLE4 requires 4 bits per pixel".into()));
            }
            if remaining.saturating_mul(512) / u64::from(height) < u64::from(width) {
                return Err(DibError::UnexpectedEof);
            }
        }
        COMPRESS_NONE | COMPRESS_BITFIELDS | COMPRESS_ZLIB => {
            if remaining / u64::from(height) < aligned {
                return Err(DibError::UnexpectedEof);
            }
        }
        other => {
            if other & 0x000F != 0 {
                return Err(DibError::UnsupportedVariant(alloc::format!(
                    "compression scheme {other:#x}"
                )));
            }
            // A zero low nibble looks like a writer bug; treat the body
            // as uncompressed.
            header.compression = COMPRESS_NONE;
            if remaining / u64::from(height) < aligned {
                return Err(DibError::UnexpectedEof);
            }
        }
    }

    limits.check(width, height)?;
    limits.check_memory(aligned.saturating_mul(u64::from(height)))?;
    let aligned = usize::try_from(aligned)
        .map_err(|_| DibError::DimensionsTooLarge { width, height })?;

    let mut alpha_possible = want_alpha && header.bit_count == 32;
    if alpha_possible {
        // Clipboard producers set the RGB masks and zero the alpha mask
        // to say "no alpha", regardless of the compression field.
        let rgb_set = header.mask_red != 0 || header.mask_green != 0 || header.mask_blue != 0;
        if rgb_set && header.mask_alpha == 0 {
            alpha_possible = false;
        }
    }

    let format = if header.bit_count <= 8 {
        PixelFormat::Pal8
    } else {
        PixelFormat::Bgr24
    };
    let mut raster = Raster::new(width, height, format, pal)?;
    let mut alpha = if alpha_possible {
        Some(AlphaChannel::new(width, height)?)
    } else {
        None
    };

    let alpha_used = decode::read_bits(
        cur,
        &mut header,
        &mut raster,
        alpha.as_mut(),
        top_down,
        aligned,
        stop,
    )?;

    if header.x_pels_per_meter > 0 && header.y_pels_per_meter > 0 {
        raster.set_pixels_per_meter(Some((
            header.x_pels_per_meter as u32,
            header.y_pels_per_meter as u32,
        )));
    }

    if !alpha_used {
        alpha = None;
    }
    Ok((raster, alpha))
}

/// Alpha plane (opacity convention) recovered from the private trailer,
/// if one follows at the cursor.
fn read_trailer(
    cur: &mut Cursor<'_>,
    base: &Raster,
    limits: &Limits,
    stop: &dyn Stop,
) -> Result<Option<AlphaChannel>, DibError> {
    if cur.remaining() < 9 {
        return Ok(None);
    }
    if cur.read_u32_le()? != TRAILER_MAGIC_1 || cur.read_u32_le()? != TRAILER_MAGIC_2 {
        return Ok(None);
    }

    match cur.read_u8()? {
        TRAILER_BITMAP => {
            let (mask, _) = read_dib(cur, true, false, false, limits, stop)?;
            if mask.width() != base.width() || mask.height() != base.height() {
                return Ok(None);
            }
            let mut plane = AlphaChannel::new(base.width(), base.height())?;
            for y in 0..base.height() {
                let row = plane.scanline_mut(y);
                for (x, a) in row.iter_mut().enumerate() {
                    // The trailer stores transparency.
                    *a = 0xFF - mask.color_at(x as u32, y).b;
                }
            }
            Ok(Some(plane))
        }
        TRAILER_COLOR => {
            let v = cur.read_u32_le()?;
            let transparent = BGR8 {
                b: v as u8,
                g: (v >> 8) as u8,
                r: (v >> 16) as u8,
            };
            let mut plane = AlphaChannel::new(base.width(), base.height())?;
            for y in 0..base.height() {
                let row = plane.scanline_mut(y);
                for (x, a) in row.iter_mut().enumerate() {
                    *a = if base.color_at(x as u32, y) == transparent {
                        0
                    } else {
                        0xFF
                    };
                }
            }
            Ok(Some(plane))
        }
        _ => Ok(None),
    }
}

/// Configured decode of one BMP/DIB stream held in memory.
///
/// By default the stream is expected to start with the 14-byte file
/// header; [`DecodeRequest::headerless`] accepts a bare DIB as found in
/// clipboards and document records.
#[derive(Clone, Debug)]
pub struct DecodeRequest<'a> {
    data: &'a [u8],
    file_header: bool,
    mso_quirk: bool,
    limits: Limits,
}

impl<'a> DecodeRequest<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            file_header: true,
            mso_quirk: false,
            limits: Limits::default(),
        }
    }

    /// The stream is a bare DIB without the 14-byte file header.
    /// Headerless streams never produce an alpha plane.
    pub fn headerless(mut self) -> Self {
        self.file_header = false;
        self
    }

    /// Accept the malformed 40-byte header layout written by some old
    /// MS-Office exports.
    pub fn with_mso_quirk(mut self) -> Self {
        self.mso_quirk = true;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Decode the base raster, ignoring any alpha information.
    pub fn decode(&self, stop: &dyn Stop) -> Result<Raster, DibError> {
        let mut cur = Cursor::new(self.data);
        let (raster, _) = read_dib(&mut cur, self.file_header, false, self.mso_quirk, &self.limits, stop)?;
        Ok(raster)
    }

    /// Decode the raster plus the in-band 32-bit alpha channel, when the
    /// header generation allows one and any pixel actually uses it.
    pub fn decode_with_alpha(
        &self,
        stop: &dyn Stop,
    ) -> Result<(Raster, Option<AlphaChannel>), DibError> {
        let mut cur = Cursor::new(self.data);
        let (raster, mut alpha) =
            read_dib(&mut cur, self.file_header, true, self.mso_quirk, &self.limits, stop)?;
        if let Some(a) = alpha.as_mut() {
            // Decoding tracks transparency; the public plane is opacity.
            a.invert();
        }
        Ok((raster, alpha))
    }

    /// Decode the raster and look for the private alpha trailer behind
    /// it. A missing or damaged trailer is not an error; the base
    /// raster alone is returned.
    pub fn decode_ex(&self, stop: &dyn Stop) -> Result<(Raster, Option<AlphaChannel>), DibError> {
        let mut cur = Cursor::new(self.data);
        let (raster, _) =
            read_dib(&mut cur, self.file_header, false, self.mso_quirk, &self.limits, stop)?;
        let alpha = read_trailer(&mut cur, &raster, &self.limits, stop).unwrap_or(None);
        Ok((raster, alpha))
    }
}

/// Configured encode of a [`Raster`] into a BMP/DIB stream.
#[derive(Clone, Debug, Default)]
pub struct EncodeRequest {
    compressed: bool,
    zlib_wrapped: bool,
    headerless: bool,
}

impl EncodeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// RLE-compress palette rasters (RLE4 for color tables of at most
    /// 16 entries, RLE8 otherwise). Truecolor rasters are unaffected.
    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    /// Wrap palette and pixel data in a zlib stream ('SD' tag). Only
    /// readers aware of the private scheme can open the result.
    pub fn zlib_wrapped(mut self) -> Self {
        self.zlib_wrapped = true;
        self
    }

    /// Emit a bare DIB without the 14-byte file header.
    pub fn headerless(mut self) -> Self {
        self.headerless = true;
        self
    }

    pub fn encode(&self, raster: &Raster, stop: &dyn Stop) -> Result<Vec<u8>, DibError> {
        let mut w = Writer::new();
        write_dib(
            &mut w,
            raster,
            self.compressed,
            self.zlib_wrapped,
            !self.headerless,
            stop,
        )?;
        Ok(w.into_vec())
    }

    /// Encode the raster with the private alpha trailer: a full BMP
    /// (always with file header, RLE-compressed), the trailer magic,
    /// and the alpha plane as a second grayscale BMP.
    pub fn encode_ex(
        &self,
        raster: &Raster,
        alpha: Option<&AlphaChannel>,
        stop: &dyn Stop,
    ) -> Result<Vec<u8>, DibError> {
        let mut w = Writer::new();
        write_dib(&mut w, raster, true, self.zlib_wrapped, true, stop)?;
        w.write_u32_le(TRAILER_MAGIC_1);
        w.write_u32_le(TRAILER_MAGIC_2);

        match alpha {
            Some(plane) => {
                w.write_u8(TRAILER_BITMAP);
                // Store transparency, as the legacy readers expect.
                let mut mask = Raster::new(
                    raster.width(),
                    raster.height(),
                    PixelFormat::Pal8,
                    Palette::grayscale256(),
                )?;
                for y in 0..raster.height() {
                    let src = plane.scanline(y);
                    let dst = mask.scanline_mut(y);
                    for (d, &s) in dst.iter_mut().zip(src) {
                        *d = 0xFF - s;
                    }
                }
                write_dib(&mut w, &mask, true, false, true, stop)?;
            }
            None => w.write_u8(TRAILER_NONE),
        }
        Ok(w.into_vec())
    }
}

fn write_dib(
    w: &mut Writer,
    raster: &Raster,
    compressed: bool,
    zlib_wrapped: bool,
    file_header: bool,
    stop: &dyn Stop,
) -> Result<(), DibError> {
    if raster.format() == PixelFormat::Pal8 && raster.palette().is_empty() {
        return Err(DibError::InvalidHeader(
            "palette raster without a color table".into(),
        ));
    }
    let inner_compression = if compressed && raster.format() == PixelFormat::Pal8 {
        if raster.palette().len() <= 16 {
            COMPRESS_RLE4
        } else {
            COMPRESS_RLE8
        }
    } else {
        COMPRESS_NONE
    };
    let bit_count = encode::wire_bit_count(raster, inner_compression);
    let cols_used = if bit_count <= 8 {
        raster.palette().len() as u32
    } else {
        0
    };

    let mut file_size_pos = None;
    if file_header {
        // For a zlib-wrapped body the color table lives inside the
        // wrapped data; the offset points at the wrap prefix instead.
        let table_bytes = if zlib_wrapped { 0 } else { cols_used * 4 };
        w.write_u16_le(MAGIC_BM);
        file_size_pos = Some(w.reserve_u32());
        w.write_u16_le(0);
        w.write_u16_le(0);
        w.write_u32_le(FILE_HEADER_SIZE as u32 + INFO_HEADER_SIZE + table_bytes);
    }

    let (x_ppm, y_ppm) = raster.pixels_per_meter().unwrap_or((0, 0));
    let h = DibHeader {
        size: INFO_HEADER_SIZE,
        width: raster.width() as i32,
        height: raster.height() as i32,
        planes: 1,
        bit_count,
        compression: if zlib_wrapped {
            COMPRESS_ZLIB
        } else {
            inner_compression
        },
        x_pels_per_meter: x_ppm as i32,
        y_pels_per_meter: y_ppm as i32,
        cols_used,
        ..DibHeader::default()
    };
    let size_image_pos = header::write_info_header(w, &h);

    let size_image = if zlib_wrapped {
        let mut scratch = Writer::new();
        if cols_used > 0 {
            palette::write_palette(&mut scratch, raster.palette());
        }
        let bits = encode::write_bits(&mut scratch, raster, inner_compression, stop)?;
        zcompress::write_wrapped(w, inner_compression, &scratch.into_vec());
        bits
    } else {
        if cols_used > 0 {
            palette::write_palette(w, raster.palette());
        }
        encode::write_bits(w, raster, inner_compression, stop)?
    };
    w.patch_u32(size_image_pos, size_image as u32);

    if let Some(pos) = file_size_pos {
        w.patch_u32(pos, w.position() as u32);
    }
    Ok(())
}

/// Summary of a stream's headers without decoding pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DibInfo {
    pub width: u32,
    pub height: u32,
    pub bit_count: u16,
    pub compression: u32,
    pub top_down: bool,
    pub zlib_wrapped: bool,
    pub pixels_per_meter: Option<(u32, u32)>,
}

/// Inspect a stream's headers. Accepts both full files ('BM'/'BA'
/// magic) and bare DIBs.
pub fn probe(data: &[u8]) -> Result<DibInfo, DibError> {
    let mut cur = Cursor::new(data);
    if data.len() >= 2 && (data[0..2] == *b"BM" || data[0..2] == *b"BA") {
        read_file_header(&mut cur)?;
    }
    let (header, top_down) = header::read_header(&mut cur, false)?;
    if header.width <= 0 || header.height <= 0 {
        return Err(DibError::InvalidHeader(alloc::format!(
            "dimensions {}x{}",
            header.width,
            header.height
        )));
    }
    let ppm = if header.x_pels_per_meter > 0 && header.y_pels_per_meter > 0 {
        Some((header.x_pels_per_meter as u32, header.y_pels_per_meter as u32))
    } else {
        None
    };
    Ok(DibInfo {
        width: header.width as u32,
        height: header.height as u32,
        bit_count: header.bit_count,
        compression: header.compression,
        top_down,
        zlib_wrapped: header.compression == COMPRESS_ZLIB,
        pixels_per_meter: ppm,
    })
}
