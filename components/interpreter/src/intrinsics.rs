//! Native intrinsics
//!
//! Usecode calls into the engine through a table of native functions
//! indexed by a 16-bit number. An intrinsic reads its arguments from the
//! raw argument block left on the caller's stack and returns a 32-bit
//! value the interpreter stores in the temp register.

use crate::host::ProcessHost;
use crate::process::UcProcess;
use crate::vm::UcMachine;
use core_types::{ErrorKind, ObjId, ProcId, UcError, UcResult};
use rand::Rng;
use std::fmt;

/// Signature of a native intrinsic
pub type Intrinsic = fn(&mut IntrinsicContext<'_>, &mut ArgReader<'_>) -> UcResult<u32>;

/// What an intrinsic can reach while it runs
pub struct IntrinsicContext<'a> {
    /// The machine (heaps, globals, random numbers)
    pub machine: &'a mut UcMachine,
    /// The process owner
    pub host: &'a mut dyn ProcessHost,
    /// The calling process
    pub process: &'a UcProcess,
}

impl IntrinsicContext<'_> {
    /// Pid of the caller
    pub fn pid(&self) -> ProcId {
        self.process.pid
    }

    /// Item the caller runs for
    pub fn item(&self) -> ObjId {
        self.process.item_num
    }

    /// Object named by a pointer argument
    pub fn ptr_to_object(&self, raw: u32) -> ObjId {
        self.machine.ptr_to_object(raw, self.process, &*self.host)
    }
}

/// Sequential reader over an intrinsic's argument block.
///
/// The first argument is the one pushed last. Byte arguments occupy a
/// full word.
#[derive(Debug, Clone)]
pub struct ArgReader<'a> {
    args: &'a [u8],
    pos: usize,
}

impl<'a> ArgReader<'a> {
    /// Read arguments from `args`
    pub fn new(args: &'a [u8]) -> Self {
        Self { args, pos: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.args.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> UcResult<[u8; N]> {
        let end = self.pos + N;
        let bytes = self.args.get(self.pos..end).ok_or_else(|| {
            UcError::new(
                ErrorKind::InvalidOperand,
                format!(
                    "intrinsic reads {N} bytes at argument offset {} of {}",
                    self.pos,
                    self.args.len()
                ),
            )
        })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Byte argument (low half of a word)
    pub fn u8(&mut self) -> UcResult<u8> {
        Ok(self.take::<2>()?[0])
    }

    /// Unsigned word argument
    pub fn u16(&mut self) -> UcResult<u16> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    /// Signed word argument
    pub fn i16(&mut self) -> UcResult<i16> {
        Ok(i16::from_le_bytes(self.take()?))
    }

    /// Unsigned dword argument
    pub fn u32(&mut self) -> UcResult<u32> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// Signed dword argument
    pub fn i32(&mut self) -> UcResult<i32> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    /// Pointer argument
    pub fn ptr(&mut self) -> UcResult<u32> {
        self.u32()
    }
}

/// Table of intrinsics indexed by number
#[derive(Clone, Default)]
pub struct IntrinsicTable {
    entries: Vec<Option<Intrinsic>>,
}

impl fmt::Debug for IntrinsicTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrinsicTable")
            .field("slots", &self.entries.len())
            .field("bound", &self.entries.iter().flatten().count())
            .finish()
    }
}

impl IntrinsicTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with the generic built-ins at their [`builtin`] slots
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.bind(builtin::TRUE, builtin::i_true);
        table.bind(builtin::FALSE, builtin::i_false);
        table.bind(builtin::NUM_TO_STR, builtin::i_num_to_str);
        table.bind(builtin::URANDOM, builtin::i_urandom);
        table.bind(builtin::RND_RANGE, builtin::i_rnd_range);
        table
    }

    /// Install `func` at `index`, growing the table as needed
    pub fn bind(&mut self, index: u16, func: Intrinsic) {
        let slot = usize::from(index);
        if slot >= self.entries.len() {
            self.entries.resize(slot + 1, None);
        }
        self.entries[slot] = Some(func);
    }

    /// The intrinsic at `index`, if bound
    pub fn get(&self, index: u16) -> Option<Intrinsic> {
        self.entries.get(usize::from(index)).copied().flatten()
    }

    /// Table size, including unbound slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for a table without slots
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Game-independent intrinsics
pub mod builtin {
    use super::*;

    /// Slot of [`i_true`]
    pub const TRUE: u16 = 0;
    /// Slot of [`i_false`]
    pub const FALSE: u16 = 1;
    /// Slot of [`i_num_to_str`]
    pub const NUM_TO_STR: u16 = 2;
    /// Slot of [`i_urandom`]
    pub const URANDOM: u16 = 3;
    /// Slot of [`i_rnd_range`]
    pub const RND_RANGE: u16 = 4;

    /// Always 1
    pub fn i_true(_: &mut IntrinsicContext<'_>, _: &mut ArgReader<'_>) -> UcResult<u32> {
        Ok(1)
    }

    /// Always 0
    pub fn i_false(_: &mut IntrinsicContext<'_>, _: &mut ArgReader<'_>) -> UcResult<u32> {
        Ok(0)
    }

    /// `(int16 num)`: new string holding the decimal form of `num`
    pub fn i_num_to_str(ctx: &mut IntrinsicContext<'_>, args: &mut ArgReader<'_>) -> UcResult<u32> {
        let num = args.i16()?;
        Ok(u32::from(ctx.machine.heap_mut().assign_string(num.to_string())))
    }

    /// `(uint16 num)`: random number in `0..num`, 0 when `num <= 1`
    pub fn i_urandom(ctx: &mut IntrinsicContext<'_>, args: &mut ArgReader<'_>) -> UcResult<u32> {
        let num = args.u16()?;
        if num <= 1 {
            return Ok(0);
        }
        Ok(u32::from(ctx.machine.rng_mut().gen_range(0..num)))
    }

    /// `(int16 lo, int16 hi)`: random number in `lo..=hi`, `lo` when the
    /// range is empty
    pub fn i_rnd_range(ctx: &mut IntrinsicContext<'_>, args: &mut ArgReader<'_>) -> UcResult<u32> {
        let lo = args.i16()?;
        let hi = args.i16()?;
        let value = if hi <= lo {
            lo
        } else {
            ctx.machine.rng_mut().gen_range(lo..=hi)
        };
        Ok(i32::from(value) as u32)
    }
}
