//! Color table reading and writing.
//!
//! Core headers store 3-byte BGR triples, everything newer stores
//! 4-byte BGRX quads.

use rgb::alt::BGR8;

use super::cursor::{Cursor, Writer};
use crate::error::DibError;
use crate::raster::Palette;

/// Read `count` palette entries of `entry_size` 3 or 4 bytes each.
pub(crate) fn read_palette(
    cur: &mut Cursor<'_>,
    count: usize,
    entry_size: usize,
) -> Result<Palette, DibError> {
    if cur.remaining() < count * entry_size {
        return Err(DibError::UnexpectedEof);
    }

    let mut entries = alloc::vec::Vec::with_capacity(count);
    for _ in 0..count {
        let b = cur.read_u8()?;
        let g = cur.read_u8()?;
        let r = cur.read_u8()?;
        if entry_size == 4 {
            cur.skip(1)?;
        }
        entries.push(BGR8 { b, g, r });
    }

    Ok(Palette::new(entries))
}

/// Write the color table as 4-byte quads with a zero pad byte.
pub(crate) fn write_palette(w: &mut Writer, palette: &Palette) {
    for entry in palette.entries() {
        w.write_u8(entry.b);
        w.write_u8(entry.g);
        w.write_u8(entry.r);
        w.write_u8(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_color_table_is_truncation() {
        let bytes = [10u8, 20, 30, 0, 40, 50, 60, 0];
        let mut cur = Cursor::new(&bytes);
        let err = read_palette(&mut cur, 4, 4).unwrap_err();
        assert!(matches!(err, DibError::UnexpectedEof));

        let mut cur = Cursor::new(&bytes);
        let pal = read_palette(&mut cur, 2, 4).unwrap();
        assert_eq!(pal.get(0), BGR8 { b: 10, g: 20, r: 30 });
        assert_eq!(pal.get(1), BGR8 { b: 40, g: 50, r: 60 });
    }

    #[test]
    fn triple_entries_consume_three_bytes() {
        let bytes = [1u8, 2, 3, 4, 5, 6];
        let mut cur = Cursor::new(&bytes);
        let pal = read_palette(&mut cur, 2, 3).unwrap();
        assert_eq!(pal.get(1), BGR8 { b: 4, g: 5, r: 6 });
        assert_eq!(cur.remaining(), 0);
    }
}
