//! Bounds-checked cursor over `&[u8]` and a growable little-endian
//! writer with backpatching, the two stream shapes the codec needs.

use alloc::vec::Vec;

use crate::error::DibError;

pub(crate) struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) fn set_position(&mut self, pos: usize) -> Result<(), DibError> {
        if pos > self.data.len() {
            return Err(DibError::UnexpectedEof);
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), DibError> {
        let new_pos = self.pos.checked_add(n).ok_or(DibError::UnexpectedEof)?;
        if new_pos > self.data.len() {
            return Err(DibError::UnexpectedEof);
        }
        self.pos = new_pos;
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, DibError> {
        if self.pos < self.data.len() {
            let b = self.data[self.pos];
            self.pos += 1;
            Ok(b)
        } else {
            Err(DibError::UnexpectedEof)
        }
    }

    pub(crate) fn read_u16_le(&mut self) -> Result<u16, DibError> {
        Ok(u16::from_le_bytes(self.read_fixed::<2>()?))
    }

    pub(crate) fn read_i16_le(&mut self) -> Result<i16, DibError> {
        Ok(i16::from_le_bytes(self.read_fixed::<2>()?))
    }

    pub(crate) fn read_u32_le(&mut self) -> Result<u32, DibError> {
        Ok(u32::from_le_bytes(self.read_fixed::<4>()?))
    }

    pub(crate) fn read_i32_le(&mut self) -> Result<i32, DibError> {
        Ok(i32::from_le_bytes(self.read_fixed::<4>()?))
    }

    pub(crate) fn read_fixed<const N: usize>(&mut self) -> Result<[u8; N], DibError> {
        if self.pos + N > self.data.len() {
            return Err(DibError::UnexpectedEof);
        }
        let mut buf = [0u8; N];
        buf.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Ok(buf)
    }

    pub(crate) fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), DibError> {
        let n = buf.len();
        if self.pos + n > self.data.len() {
            return Err(DibError::UnexpectedEof);
        }
        buf.copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(())
    }

    /// Borrow the next `n` bytes without copying.
    pub(crate) fn take_slice(&mut self, n: usize) -> Result<&'a [u8], DibError> {
        if self.pos + n > self.data.len() {
            return Err(DibError::UnexpectedEof);
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }
}

/// Append-only output buffer with u32 backpatching for the size fields
/// BMP wants written before their values are known.
pub(crate) struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub(crate) fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub(crate) fn position(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn write_u16_le(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_i32_le(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Reserve a u32 slot, returning its position for later patching.
    pub(crate) fn reserve_u32(&mut self) -> usize {
        let pos = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 4]);
        pos
    }

    pub(crate) fn patch_u32(&mut self, pos: usize, v: u32) {
        self.buf[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn into_vec(self) -> Vec<u8> {
        self.buf
    }
}
