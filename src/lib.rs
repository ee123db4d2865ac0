//! # zendib
//!
//! Decoder and encoder for the Windows DIB/BMP family, including the
//! historical variants that general-purpose BMP crates skip:
//!
//! - All three header generations (12-byte `BITMAPCOREHEADER`, 40-byte
//!   `BITMAPINFOHEADER`, 124-byte `BITMAPV5HEADER`), the WinBMPv3-NT
//!   external color-mask block, and the malformed 40-byte hybrid header
//!   some old MS-Office exports carry (opt-in via
//!   [`DecodeRequest::with_mso_quirk`]).
//! - 1/4/8/16/24/32 bits per pixel, RLE4/RLE8, and BITFIELDS with
//!   arbitrary contiguous masks.
//! - A zlib-wrapped DIB body (`'SD'` compression tag) used by office
//!   document persistence.
//! - A private trailer after the BMP body that round-trips a full 8-bit
//!   alpha channel through a plain-BMP-shaped stream; foreign readers
//!   see a valid opaque BMP and ignore the trailer.
//!
//! Decoding normalizes to one of two in-memory formats: 8-bit indexed
//! ([`PixelFormat::Pal8`], sub-byte depths expanded) or 24-bit BGR
//! ([`PixelFormat::Bgr24`], used for 16/24/32-bit sources). 32-bit
//! sources with an alpha mask can additionally produce a separate
//! [`AlphaChannel`] plane (0 = transparent, 255 = opaque).
//!
//! ## Non-Goals
//!
//! - Color management (masks are copied, not interpreted; V5 ICC data
//!   is skipped)
//! - Embedded JPEG/PNG payloads (`biBitCount == 0` is rejected)
//! - Multi-image containers ('BA' streams decode their first embedded
//!   bitmap only)
//!
//! ## Usage
//!
//! ```no_run
//! use zendib::{DecodeRequest, EncodeRequest, Unstoppable};
//!
//! let data: &[u8] = &[]; // your BMP bytes
//!
//! let raster = DecodeRequest::new(data).decode(&Unstoppable)?;
//! let bytes = EncodeRequest::new().encode(&raster, &Unstoppable)?;
//! # Ok::<(), zendib::DibError>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod error;
mod limits;
mod raster;

mod dib;

// Re-exports
pub use dib::{DecodeRequest, DibInfo, EncodeRequest, probe};
pub use enough::{Stop, Unstoppable};
pub use error::DibError;
pub use limits::Limits;
pub use raster::{AlphaChannel, Palette, PixelFormat, Raster};
