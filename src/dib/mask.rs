//! Color-mask descriptors for 16- and 32-bit BITFIELDS pixels.
//!
//! Shift and width are derived once per image, not per pixel. A mask
//! that is zero, non-contiguous, or wider than 8 bits fails derivation
//! instead of silently miscoloring pixels.

use rgb::alt::BGR8;

use crate::error::DibError;

/// One channel of a bitfield layout: raw mask plus the derived shift
/// that brings the channel's top bit to bit 7, and the replication mask
/// that spreads a narrow channel across the full 8-bit range.
#[derive(Clone, Copy, Debug)]
pub(crate) struct MaskChannel {
    mask: u32,
    shift: i32,
    or_mask: u8,
    or_shift: u32,
}

impl MaskChannel {
    pub(crate) fn derive(mask: u32) -> Result<Self, DibError> {
        if mask == 0 {
            return Err(DibError::InvalidHeader("color mask is zero".into()));
        }
        let normalized = mask >> mask.trailing_zeros();
        if normalized & normalized.wrapping_add(1) != 0 {
            return Err(DibError::InvalidHeader(alloc::format!(
                "color mask {mask:#010x} is not contiguous"
            )));
        }
        let width = mask.count_ones();
        if width > 8 {
            return Err(DibError::InvalidHeader(alloc::format!(
                "color mask {mask:#010x} wider than 8 bits"
            )));
        }
        let shift = 24 - mask.leading_zeros() as i32;
        let or_shift = 8 - width;
        let or_mask = ((0xFFu32 >> width) << or_shift) as u8;
        Ok(Self {
            mask,
            shift,
            or_mask,
            or_shift,
        })
    }

    /// Extract this channel from a pixel value, scaled to 0..=255 by
    /// replicating the channel's high bits into the low bits.
    pub(crate) fn extract(&self, value: u32) -> u8 {
        let c = if self.shift < 0 {
            ((value & self.mask) << -self.shift) as u8
        } else {
            ((value & self.mask) >> self.shift) as u8
        };
        c | ((c & self.or_mask) >> self.or_shift)
    }
}

/// Immutable per-image mask set for 16/32-bit decode.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ColorMask {
    red: MaskChannel,
    green: MaskChannel,
    blue: MaskChannel,
    alpha: Option<MaskChannel>,
}

impl ColorMask {
    pub(crate) fn derive(
        red: u32,
        green: u32,
        blue: u32,
        alpha: Option<u32>,
    ) -> Result<Self, DibError> {
        Ok(Self {
            red: MaskChannel::derive(red)?,
            green: MaskChannel::derive(green)?,
            blue: MaskChannel::derive(blue)?,
            alpha: match alpha {
                Some(m) => Some(MaskChannel::derive(m)?),
                None => None,
            },
        })
    }

    pub(crate) fn color_for_16bit(&self, px: [u8; 2]) -> BGR8 {
        self.color(u32::from(u16::from_le_bytes(px)))
    }

    pub(crate) fn color_for_32bit(&self, px: [u8; 4]) -> BGR8 {
        self.color(u32::from_le_bytes(px))
    }

    /// Color plus opacity for 32-bit pixels; 255 (opaque) when no alpha
    /// mask was derived.
    pub(crate) fn color_and_alpha_for_32bit(&self, px: [u8; 4]) -> (BGR8, u8) {
        let value = u32::from_le_bytes(px);
        let alpha = match self.alpha {
            Some(a) => a.extract(value),
            None => 0xFF,
        };
        (self.color(value), alpha)
    }

    fn color(&self, value: u32) -> BGR8 {
        BGR8 {
            b: self.blue.extract(value),
            g: self.green.extract(value),
            r: self.red.extract(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_555_scales_to_full_range() {
        let mask = ColorMask::derive(0x7C00, 0x03E0, 0x001F, None).unwrap();
        let white = mask.color_for_16bit(0x7FFFu16.to_le_bytes());
        assert_eq!((white.r, white.g, white.b), (255, 255, 255));
        let black = mask.color_for_16bit(0u16.to_le_bytes());
        assert_eq!((black.r, black.g, black.b), (0, 0, 0));
    }

    #[test]
    fn mask_565_green_channel() {
        let mask = ColorMask::derive(0xF800, 0x07E0, 0x001F, None).unwrap();
        let green = mask.color_for_16bit(0x07E0u16.to_le_bytes());
        assert_eq!((green.r, green.g, green.b), (0, 255, 0));
    }

    #[test]
    fn degenerate_masks_rejected() {
        assert!(MaskChannel::derive(0).is_err());
        assert!(MaskChannel::derive(0b101).is_err());
        assert!(MaskChannel::derive(0x1FF).is_err());
        assert!(MaskChannel::derive(0xFF00).is_ok());
    }

    #[test]
    fn default_32bit_masks_pass_through_bytes() {
        let mask = ColorMask::derive(0x00FF_0000, 0x0000_FF00, 0x0000_00FF, Some(0xFF00_0000))
            .unwrap();
        let (c, a) = mask.color_and_alpha_for_32bit([0x11, 0x22, 0x33, 0x44]);
        assert_eq!((c.b, c.g, c.r, a), (0x11, 0x22, 0x33, 0x44));
    }
}
