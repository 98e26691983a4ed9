//! Sequential reader over one class's code.

use core_types::{ErrorKind, UcError, UcResult};

/// Cursor over a class code buffer.
///
/// Offsets are 16-bit, matching the instruction pointer stored in a
/// process. Reading past the end is an `UnexpectedEndOfCode` error.
#[derive(Debug, Clone)]
pub struct CodeReader<'a> {
    code: &'a [u8],
    pos: usize,
}

impl<'a> CodeReader<'a> {
    /// Start reading `code` at offset `pos`.
    pub fn new(code: &'a [u8], pos: u16) -> Self {
        Self {
            code,
            pos: usize::from(pos),
        }
    }

    /// Current offset.
    pub fn position(&self) -> u16 {
        self.pos as u16
    }

    /// Move to `pos`. Seeking past the end only fails on the next read.
    pub fn seek(&mut self, pos: u16) {
        self.pos = usize::from(pos);
    }

    /// Move by a signed displacement from the current offset, wrapping at
    /// 16 bits like the instruction pointer does.
    pub fn jump(&mut self, rel: i16) {
        let target = self.position().wrapping_add(rel as u16);
        self.seek(target);
    }

    /// Whether the cursor sits at or past the end of the code.
    pub fn at_end(&self) -> bool {
        self.pos >= self.code.len()
    }

    /// Length of the underlying code buffer.
    pub fn len(&self) -> usize {
        self.code.len()
    }

    /// True for an empty code buffer.
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Read `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> UcResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.code.len() {
            return Err(UcError::new(
                ErrorKind::UnexpectedEndOfCode,
                format!(
                    "need {len} bytes at offset {:04X}, code is {:04X} long",
                    self.pos,
                    self.code.len()
                ),
            ));
        }
        let bytes = &self.code[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Read one unsigned byte.
    pub fn read_u8(&mut self) -> UcResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Read one signed byte.
    pub fn read_i8(&mut self) -> UcResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Read a little-endian u16.
    pub fn read_u16(&mut self) -> UcResult<u16> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Read a little-endian i16.
    pub fn read_i16(&mut self) -> UcResult<i16> {
        Ok(self.read_u16()? as i16)
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> UcResult<u32> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}
