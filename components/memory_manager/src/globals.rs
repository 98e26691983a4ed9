//! Global variable storage.
//!
//! Ultima 8 packs its globals as individual bits; the Crusader games use
//! whole bytes. Both are addressed as `(pos, n)` runs of storage units and
//! sit behind the [`GlobalStorage`] trait so the machine can pick one at
//! construction time.

use core_types::{ByteReader, ByteWriter, ErrorKind, UcError, UcResult};
use std::fmt::Debug;

/// A bank of globals addressed in storage units (bits or bytes).
pub trait GlobalStorage: Debug + Send {
    /// Capacity in storage units.
    fn size(&self) -> u32;

    /// Reallocate to `size` units, all zero.
    fn set_size(&mut self, size: u32);

    /// Read `n` units starting at `pos` as an unsigned value.
    fn get_entries(&self, pos: u32, n: u32) -> UcResult<u32>;

    /// Write the low `n` units of `value` starting at `pos`.
    fn set_entries(&mut self, pos: u32, n: u32, value: u32) -> UcResult<()>;

    /// Bits per storage unit.
    fn unit_bits(&self) -> u32;

    /// Raw backing bytes.
    fn as_bytes(&self) -> &[u8];

    /// Replace the backing bytes, keeping the unit size.
    fn restore(&mut self, size: u32, data: &[u8]) -> UcResult<()>;

    /// Serialise as the unit count followed by the raw bytes.
    fn save(&self, out: &mut Vec<u8>) {
        out.put_u32(self.size());
        out.extend_from_slice(self.as_bytes());
    }

    /// Restore state written by [`GlobalStorage::save`].
    fn load(&mut self, reader: &mut ByteReader<'_>) -> UcResult<()> {
        let size = reader.read_u32()?;
        let len = storage_bytes(size, self.unit_bits());
        let data = reader.read_bytes(len)?;
        self.restore(size, data)
    }

    /// Whether `value` survives being stored in `n` units.
    fn fits(&self, n: u32, value: u32) -> bool {
        let bits = n.saturating_mul(self.unit_bits());
        bits >= 32 || value >> bits == 0
    }
}

fn storage_bytes(size: u32, unit_bits: u32) -> usize {
    ((u64::from(size) * u64::from(unit_bits)).div_ceil(8)) as usize
}

fn check_range(pos: u32, n: u32, size: u32, max_n: u32) -> UcResult<()> {
    if n == 0 || n > max_n {
        return Err(UcError::new(
            ErrorKind::InvalidOperand,
            format!("global access of {n} units (at most {max_n})"),
        ));
    }
    if u64::from(pos) + u64::from(n) > u64::from(size) {
        return Err(UcError::new(
            ErrorKind::GlobalOutOfBounds,
            format!("global {pos:#06x}+{n} past end of storage ({size:#06x})"),
        ));
    }
    Ok(())
}

/// Bit-granular globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitSet {
    size: u32,
    data: Vec<u8>,
}

impl BitSet {
    /// `size` bits, all clear.
    pub fn new(size: u32) -> Self {
        let mut set = Self {
            size: 0,
            data: Vec::new(),
        };
        set.set_size(size);
        set
    }

    fn bit(&self, index: u32) -> bool {
        self.data[(index / 8) as usize] & (1 << (index % 8)) != 0
    }

    fn set_bit(&mut self, index: u32, on: bool) {
        let byte = &mut self.data[(index / 8) as usize];
        if on {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }
}

impl GlobalStorage for BitSet {
    fn size(&self) -> u32 {
        self.size
    }

    fn set_size(&mut self, size: u32) {
        self.size = size;
        self.data = vec![0; storage_bytes(size, 1)];
    }

    fn get_entries(&self, pos: u32, n: u32) -> UcResult<u32> {
        check_range(pos, n, self.size, 32)?;
        Ok((0..n).fold(0, |acc, i| acc | (u32::from(self.bit(pos + i)) << i)))
    }

    fn set_entries(&mut self, pos: u32, n: u32, value: u32) -> UcResult<()> {
        check_range(pos, n, self.size, 32)?;
        for i in 0..n {
            self.set_bit(pos + i, (value >> i) & 1 != 0);
        }
        Ok(())
    }

    fn unit_bits(&self) -> u32 {
        1
    }

    fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn restore(&mut self, size: u32, data: &[u8]) -> UcResult<()> {
        if data.len() != storage_bytes(size, 1) {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!("{} bytes cannot hold exactly {size} bits", data.len()),
            ));
        }
        self.size = size;
        self.data = data.to_vec();
        Ok(())
    }
}

/// Byte-granular globals, multi-byte values stored little-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSet {
    data: Vec<u8>,
}

impl ByteSet {
    /// `size` bytes, all zero.
    pub fn new(size: u32) -> Self {
        Self {
            data: vec![0; size as usize],
        }
    }
}

impl GlobalStorage for ByteSet {
    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn set_size(&mut self, size: u32) {
        self.data = vec![0; size as usize];
    }

    fn get_entries(&self, pos: u32, n: u32) -> UcResult<u32> {
        check_range(pos, n, self.size(), 4)?;
        let start = pos as usize;
        Ok(self.data[start..start + n as usize]
            .iter()
            .rev()
            .fold(0, |acc, &b| (acc << 8) | u32::from(b)))
    }

    fn set_entries(&mut self, pos: u32, n: u32, value: u32) -> UcResult<()> {
        check_range(pos, n, self.size(), 4)?;
        let start = pos as usize;
        let bytes = value.to_le_bytes();
        self.data[start..start + n as usize].copy_from_slice(&bytes[..n as usize]);
        Ok(())
    }

    fn unit_bits(&self) -> u32 {
        8
    }

    fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn restore(&mut self, size: u32, data: &[u8]) -> UcResult<()> {
        if data.len() != size as usize {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!("{} bytes saved for a {size}-byte global store", data.len()),
            ));
        }
        self.data = data.to_vec();
        Ok(())
    }
}
