//! Little-endian byte codec for saved machine state.

use crate::{ErrorKind, UcError, UcResult};

/// Append little-endian integers to a byte buffer.
pub trait ByteWriter {
    /// Append one byte.
    fn put_u8(&mut self, value: u8);
    /// Append a little-endian u16.
    fn put_u16(&mut self, value: u16);
    /// Append a little-endian u32.
    fn put_u32(&mut self, value: u32);
}

impl ByteWriter for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_le_bytes());
    }
}

/// Cursor over saved bytes; every read past the end is a `CorruptSave`.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Start reading at the beginning of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> UcResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                UcError::new(
                    ErrorKind::CorruptSave,
                    format!(
                        "need {} bytes at offset {}, only {} left",
                        len,
                        self.pos,
                        self.remaining()
                    ),
                )
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> UcResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16(&mut self) -> UcResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> UcResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
