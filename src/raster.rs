//! Normalized in-memory raster, palette, and alpha plane.
//!
//! Scanlines are stored bottom-up with 4-byte-aligned stride, matching
//! the layout uncompressed bottom-up BMP pixel data has on disk; that is
//! what lets the decoder's native path fill a raster with one bulk copy.
//! All public accessors take top-down `y`.

use alloc::vec;
use alloc::vec::Vec;

use rgb::FromSlice;
use rgb::alt::BGR8;

use crate::error::DibError;

/// Round a scanline of `bits` bits up to the next 4-byte boundary.
pub(crate) fn aligned_width_4(bits: u64) -> u64 {
    ((bits + 31) >> 5) << 2
}

/// Normalized pixel formats a [`Raster`] can hold.
///
/// Decoding produces `Pal8` or `Bgr24` only; `Bgra32` exists for rasters
/// built in memory (canvas/screenshot capture) and is down-converted to
/// 24-bit on encode.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit palette indices.
    Pal8,
    /// 3 channels, 8-bit, B,G,R byte order.
    Bgr24,
    /// 4 channels, 8-bit, B,G,R,A byte order.
    Bgra32,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Pal8 => 1,
            Self::Bgr24 => 3,
            Self::Bgra32 => 4,
        }
    }

    /// Bit count as stored in a DIB info header.
    pub fn bit_count(&self) -> u16 {
        (self.bytes_per_pixel() * 8) as u16
    }
}

/// Ordered color table of up to 256 B,G,R entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<BGR8>,
}

impl Palette {
    pub fn new(entries: Vec<BGR8>) -> Self {
        Self { entries }
    }

    /// Identity grayscale palette (index i maps to gray level i).
    pub fn grayscale256() -> Self {
        let entries = (0..=255u8).map(|v| BGR8 { b: v, g: v, r: v }).collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u8) -> BGR8 {
        self.entries
            .get(usize::from(index))
            .copied()
            .unwrap_or(BGR8 { b: 0, g: 0, r: 0 })
    }

    pub fn entries(&self) -> &[BGR8] {
        &self.entries
    }

    /// Clamp an untrusted pixel index into the palette by wrapping it.
    /// Diagnostic-only recovery; out-of-range indices are never an error.
    pub(crate) fn sanitize_index(&self, index: u8) -> u8 {
        let count = self.entries.len();
        if count > 0 && usize::from(index) >= count {
            (usize::from(index) % count) as u8
        } else {
            index
        }
    }
}

/// A width x height pixel grid at a fixed [`PixelFormat`], owning its
/// backing store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Raster {
    width: u32,
    height: u32,
    format: PixelFormat,
    palette: Palette,
    stride: usize,
    /// Bottom-up scanlines, `stride` bytes each.
    data: Vec<u8>,
    /// Horizontal/vertical resolution in pixels per meter, when known.
    pixels_per_meter: Option<(u32, u32)>,
}

impl Raster {
    /// Allocate a zeroed raster. The palette is only meaningful for
    /// `Pal8` and may be empty for truecolor formats.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        palette: Palette,
    ) -> Result<Self, DibError> {
        if width == 0 || height == 0 {
            return Err(DibError::InvalidHeader(alloc::format!(
                "raster dimensions {width}x{height} must be non-zero"
            )));
        }
        let stride_u64 = aligned_width_4(u64::from(width) * u64::from(format.bit_count()));
        let total = stride_u64.checked_mul(u64::from(height));
        let total = match total {
            Some(t) if usize::try_from(t).is_ok() => t as usize,
            _ => return Err(DibError::DimensionsTooLarge { width, height }),
        };
        Ok(Self {
            width,
            height,
            format,
            palette,
            stride: stride_u64 as usize,
            data: vec![0u8; total],
            pixels_per_meter: None,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Scanline stride in bytes (4-byte aligned).
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw bottom-up backing store, `stride()` bytes per row.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixels_per_meter(&self) -> Option<(u32, u32)> {
        self.pixels_per_meter
    }

    pub fn set_pixels_per_meter(&mut self, ppm: Option<(u32, u32)>) {
        self.pixels_per_meter = ppm;
    }

    /// Scanline at top-down row `y`.
    pub fn scanline(&self, y: u32) -> &[u8] {
        let row = (self.height - 1 - y) as usize;
        &self.data[row * self.stride..(row + 1) * self.stride]
    }

    pub(crate) fn scanline_mut(&mut self, y: u32) -> &mut [u8] {
        let row = (self.height - 1 - y) as usize;
        &mut self.data[row * self.stride..(row + 1) * self.stride]
    }

    /// Typed view of the pixels in row `y`. Panics if the format is not
    /// `Bgr24`; use [`Raster::color_at`] for format-independent access.
    pub fn row_bgr(&self, y: u32) -> &[BGR8] {
        assert_eq!(self.format, PixelFormat::Bgr24);
        self.scanline(y)[..self.width as usize * 3].as_bgr()
    }

    /// Palette index at (x, y). Meaningful for `Pal8` only.
    pub fn index_at(&self, x: u32, y: u32) -> u8 {
        debug_assert_eq!(self.format, PixelFormat::Pal8);
        self.scanline(y)[x as usize]
    }

    /// Store a palette index at (x, y). Meaningful for `Pal8` only.
    pub fn set_index(&mut self, x: u32, y: u32, index: u8) {
        debug_assert_eq!(self.format, PixelFormat::Pal8);
        self.scanline_mut(y)[x as usize] = index;
    }

    /// Resolved color at (x, y): palette lookup for `Pal8`, direct
    /// channel read otherwise.
    pub fn color_at(&self, x: u32, y: u32) -> BGR8 {
        let x = x as usize;
        match self.format {
            PixelFormat::Pal8 => self.palette.get(self.scanline(y)[x]),
            PixelFormat::Bgr24 => {
                let px = &self.scanline(y)[x * 3..x * 3 + 3];
                BGR8 {
                    b: px[0],
                    g: px[1],
                    r: px[2],
                }
            }
            PixelFormat::Bgra32 => {
                let px = &self.scanline(y)[x * 4..x * 4 + 4];
                BGR8 {
                    b: px[0],
                    g: px[1],
                    r: px[2],
                }
            }
        }
    }

    /// Store a color at (x, y). For `Pal8` the color's blue channel is
    /// taken as the palette index.
    pub fn set_color(&mut self, x: u32, y: u32, color: BGR8) {
        let x = x as usize;
        match self.format {
            PixelFormat::Pal8 => self.scanline_mut(y)[x] = color.b,
            PixelFormat::Bgr24 => {
                let px = &mut self.scanline_mut(y)[x * 3..x * 3 + 3];
                px[0] = color.b;
                px[1] = color.g;
                px[2] = color.r;
            }
            PixelFormat::Bgra32 => {
                let px = &mut self.scanline_mut(y)[x * 4..x * 4 + 4];
                px[0] = color.b;
                px[1] = color.g;
                px[2] = color.r;
            }
        }
    }

    /// Build a raster (and, for 32-bit input, an alpha plane) from a raw
    /// top-down pixel block that did not arrive via the BMP container
    /// (screenshot/canvas capture paths).
    ///
    /// `bits_per_pixel` must be 24 or 32. `reverse_channels` flags R,G,B
    /// channel order in the source (as opposed to native B,G,R);
    /// `reverse_alpha` flags sources whose alpha byte is transparency
    /// rather than opacity (32-bit only).
    pub fn from_raw_parts(
        bytes: &[u8],
        width: u32,
        height: u32,
        stride: usize,
        bits_per_pixel: u16,
        reverse_channels: bool,
        reverse_alpha: bool,
    ) -> Result<(Raster, Option<AlphaChannel>), DibError> {
        if bits_per_pixel != 24 && bits_per_pixel != 32 {
            return Err(DibError::UnsupportedVariant(alloc::format!(
                "raw buffer bit depth {bits_per_pixel} unsupported"
            )));
        }
        let src_bpp = usize::from(bits_per_pixel / 8);
        let row_bytes = (width as usize)
            .checked_mul(src_bpp)
            .ok_or(DibError::DimensionsTooLarge { width, height })?;
        if stride < row_bytes {
            return Err(DibError::InvalidHeader(alloc::format!(
                "stride {stride} shorter than row of {row_bytes} bytes"
            )));
        }
        let needed = stride
            .checked_mul(height as usize)
            .ok_or(DibError::DimensionsTooLarge { width, height })?;
        if bytes.len() < needed {
            return Err(DibError::BufferTooSmall {
                needed,
                actual: bytes.len(),
            });
        }

        let mut raster = Raster::new(width, height, PixelFormat::Bgr24, Palette::default())?;
        let mut alpha = if bits_per_pixel == 32 {
            Some(AlphaChannel::new(width, height)?)
        } else {
            None
        };

        for y in 0..height {
            let src = &bytes[y as usize * stride..y as usize * stride + row_bytes];
            let dst = raster.scanline_mut(y);
            if src_bpp == 3 {
                for (s, d) in src.chunks_exact(3).zip(dst.chunks_exact_mut(3)) {
                    if reverse_channels {
                        d[0] = s[2];
                        d[1] = s[1];
                        d[2] = s[0];
                    } else {
                        d.copy_from_slice(s);
                    }
                }
            } else {
                let mut alpha_row = alpha.as_mut().map(|a| a.scanline_mut(y));
                for (x, (s, d)) in src.chunks_exact(4).zip(dst.chunks_exact_mut(3)).enumerate() {
                    if reverse_channels {
                        d[0] = s[2];
                        d[1] = s[1];
                        d[2] = s[0];
                    } else {
                        d[0] = s[0];
                        d[1] = s[1];
                        d[2] = s[2];
                    }
                    if let Some(row) = alpha_row.as_deref_mut() {
                        row[x] = if reverse_alpha { 0xFF - s[3] } else { s[3] };
                    }
                }
            }
        }

        Ok((raster, alpha))
    }
}

/// Per-pixel 8-bit alpha plane paired with a [`Raster`] of identical
/// dimensions. Convention: 0 = fully transparent, 255 = opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaChannel {
    width: u32,
    height: u32,
    /// Bottom-up rows, `width` bytes each (no padding).
    data: Vec<u8>,
}

impl AlphaChannel {
    /// Allocate a fully transparent alpha plane.
    pub fn new(width: u32, height: u32) -> Result<Self, DibError> {
        let total = (width as usize)
            .checked_mul(height as usize)
            .ok_or(DibError::DimensionsTooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; total],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Alpha row at top-down `y`.
    pub fn scanline(&self, y: u32) -> &[u8] {
        let row = (self.height - 1 - y) as usize;
        let w = self.width as usize;
        &self.data[row * w..(row + 1) * w]
    }

    pub(crate) fn scanline_mut(&mut self, y: u32) -> &mut [u8] {
        let row = (self.height - 1 - y) as usize;
        let w = self.width as usize;
        &mut self.data[row * w..(row + 1) * w]
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.scanline(y)[x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        self.scanline_mut(y)[x as usize] = value;
    }

    /// Flip between opacity and transparency conventions in place.
    pub fn invert(&mut self) {
        for v in &mut self.data {
            *v = 0xFF - *v;
        }
    }
}
