//! Per-process byte stack.
//!
//! The stack grows downwards: `sp` starts at the top of the buffer and
//! pushing moves it towards 0. Offsets handed to `access`/`assign` are
//! absolute positions in the buffer, which is what stack pointers and
//! base pointers store.

use core_types::{ErrorKind, UcError, UcResult};

/// A fixed-size, downward-growing byte stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UcStack {
    buf: Vec<u8>,
    sp: u32,
}

impl UcStack {
    /// An empty stack of `size` bytes.
    pub fn new(size: u32) -> Self {
        Self {
            buf: vec![0; size as usize],
            sp: size,
        }
    }

    /// Total capacity in bytes.
    pub fn size(&self) -> u32 {
        self.buf.len() as u32
    }

    /// Current stack pointer.
    pub fn sp(&self) -> u32 {
        self.sp
    }

    /// Bytes currently pushed.
    pub fn stack_size(&self) -> u32 {
        self.size() - self.sp
    }

    /// Move the stack pointer to `sp`.
    pub fn set_sp(&mut self, sp: u32) -> UcResult<()> {
        if sp > self.size() {
            return Err(UcError::new(
                ErrorKind::StackOutOfBounds,
                format!("stack pointer {sp:#x} past stack size {:#x}", self.size()),
            ));
        }
        self.sp = sp;
        Ok(())
    }

    /// Move the stack pointer by `delta` bytes (positive pops).
    pub fn add_sp(&mut self, delta: i32) -> UcResult<()> {
        let target = i64::from(self.sp) + i64::from(delta);
        if target < 0 {
            return Err(UcError::new(
                ErrorKind::StackOverflow,
                format!("reserving {} bytes overflows the stack", -delta),
            ));
        }
        if target > i64::from(self.size()) {
            return Err(UcError::new(
                ErrorKind::StackUnderflow,
                format!("releasing {delta} bytes underflows the stack"),
            ));
        }
        self.sp = target as u32;
        Ok(())
    }

    /// Push raw bytes; `data[0]` ends up at the new `sp`.
    pub fn push(&mut self, data: &[u8]) -> UcResult<()> {
        let len = data.len() as u32;
        if len > self.sp {
            return Err(UcError::new(
                ErrorKind::StackOverflow,
                format!("pushing {len} bytes with only {} free", self.sp),
            ));
        }
        self.sp -= len;
        let start = self.sp as usize;
        self.buf[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Push `len` zero bytes.
    pub fn push0(&mut self, len: u32) -> UcResult<()> {
        self.push(&vec![0; len as usize])
    }

    /// Push one byte.
    pub fn push1(&mut self, value: u8) -> UcResult<()> {
        self.push(&[value])
    }

    /// Push a little-endian word.
    pub fn push2(&mut self, value: u16) -> UcResult<()> {
        self.push(&value.to_le_bytes())
    }

    /// Push a little-endian dword.
    pub fn push4(&mut self, value: u32) -> UcResult<()> {
        self.push(&value.to_le_bytes())
    }

    /// Pop `len` bytes.
    pub fn pop(&mut self, len: u32) -> UcResult<Vec<u8>> {
        if len > self.stack_size() {
            return Err(UcError::new(
                ErrorKind::StackUnderflow,
                format!("popping {len} bytes with only {} pushed", self.stack_size()),
            ));
        }
        let start = self.sp as usize;
        let bytes = self.buf[start..start + len as usize].to_vec();
        self.sp += len;
        Ok(bytes)
    }

    /// Pop one byte.
    pub fn pop1(&mut self) -> UcResult<u8> {
        Ok(self.pop(1)?[0])
    }

    /// Pop a little-endian word.
    pub fn pop2(&mut self) -> UcResult<u16> {
        let b = self.pop(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Pop a little-endian dword.
    pub fn pop4(&mut self) -> UcResult<u32> {
        let b = self.pop(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn range(&self, offset: u32, len: u32) -> UcResult<std::ops::Range<usize>> {
        let end = u64::from(offset) + u64::from(len);
        if end > u64::from(self.size()) {
            return Err(UcError::new(
                ErrorKind::StackOutOfBounds,
                format!(
                    "stack access {offset:#x}+{len} past stack size {:#x}",
                    self.size()
                ),
            ));
        }
        Ok(offset as usize..end as usize)
    }

    /// Borrow `len` bytes at `offset`.
    pub fn access(&self, offset: u32, len: u32) -> UcResult<&[u8]> {
        let range = self.range(offset, len)?;
        Ok(&self.buf[range])
    }

    /// Byte at `offset`.
    pub fn access1(&self, offset: u32) -> UcResult<u8> {
        Ok(self.access(offset, 1)?[0])
    }

    /// Word at `offset`.
    pub fn access2(&self, offset: u32) -> UcResult<u16> {
        let b = self.access(offset, 2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    /// Dword at `offset`.
    pub fn access4(&self, offset: u32) -> UcResult<u32> {
        let b = self.access(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Overwrite bytes at `offset`.
    pub fn assign(&mut self, offset: u32, data: &[u8]) -> UcResult<()> {
        let range = self.range(offset, data.len() as u32)?;
        self.buf[range].copy_from_slice(data);
        Ok(())
    }

    /// Overwrite the byte at `offset`.
    pub fn assign1(&mut self, offset: u32, value: u8) -> UcResult<()> {
        self.assign(offset, &[value])
    }

    /// Overwrite the word at `offset`.
    pub fn assign2(&mut self, offset: u32, value: u16) -> UcResult<()> {
        self.assign(offset, &value.to_le_bytes())
    }

    /// Overwrite the dword at `offset`.
    pub fn assign4(&mut self, offset: u32, value: u32) -> UcResult<()> {
        self.assign(offset, &value.to_le_bytes())
    }
}
