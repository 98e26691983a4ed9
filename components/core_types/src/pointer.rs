//! Segmented 32-bit pointers.
//!
//! Usecode stores pointers as plain 32-bit values on process stacks. The
//! high half selects a segment and the low half is an offset or handle.
//! Stack segments are numbered by process id, so `0x0001..=0x7FFE` each
//! address a different process stack.

use crate::{ErrorKind, ObjId, ProcId, UcError};

/// Raw segment numbers as they appear in the high half of a pointer.
pub struct Segment;

impl Segment {
    /// First process-stack segment (pid 1)
    pub const STACK_FIRST: u16 = 0x0001;
    /// Last process-stack segment
    pub const STACK_LAST: u16 = 0x7FFE;
    /// String heap handles
    pub const STRING: u16 = 0x8000;
    /// List heap handles
    pub const LIST: u16 = 0x8001;
    /// World object ids
    pub const OBJECT: u16 = 0x8002;
    /// Global storage offsets
    pub const GLOBAL: u16 = 0x8003;
}

/// A decoded usecode pointer.
///
/// # Examples
///
/// ```
/// use core_types::UcPointer;
///
/// assert_eq!(UcPointer::String(7).to_raw(), 0x8000_0007);
/// assert_eq!(UcPointer::from_raw(0x8003_0040).unwrap(), UcPointer::Global(0x40));
/// assert!(UcPointer::from_raw(0x0000_0010).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UcPointer {
    /// Byte offset into the stack of process `pid`
    Stack {
        /// Owning process
        pid: ProcId,
        /// Offset into that process's stack buffer
        offset: u16,
    },
    /// String heap handle
    String(u16),
    /// List heap handle
    List(u16),
    /// World object reference (read-only)
    Object(ObjId),
    /// Offset into global storage
    Global(u16),
}

impl UcPointer {
    /// Decode a raw pointer, rejecting segments outside the known set.
    pub fn from_raw(raw: u32) -> Result<Self, UcError> {
        let segment = (raw >> 16) as u16;
        let offset = raw as u16;
        match segment {
            Segment::STACK_FIRST..=Segment::STACK_LAST => Ok(UcPointer::Stack {
                pid: segment,
                offset,
            }),
            Segment::STRING => Ok(UcPointer::String(offset)),
            Segment::LIST => Ok(UcPointer::List(offset)),
            Segment::OBJECT => Ok(UcPointer::Object(offset)),
            Segment::GLOBAL => Ok(UcPointer::Global(offset)),
            _ => Err(UcError::new(
                ErrorKind::InvalidSegment,
                format!("trying to access segment {segment:04X}"),
            )),
        }
    }

    /// Encode to the raw 32-bit form stored on process stacks.
    pub fn to_raw(self) -> u32 {
        let (segment, offset) = match self {
            UcPointer::Stack { pid, offset } => (pid, offset),
            UcPointer::String(id) => (Segment::STRING, id),
            UcPointer::List(id) => (Segment::LIST, id),
            UcPointer::Object(id) => (Segment::OBJECT, id),
            UcPointer::Global(offset) => (Segment::GLOBAL, offset),
        };
        (u32::from(segment) << 16) | u32::from(offset)
    }

    /// Pointer to `offset` in the stack of `pid`.
    pub fn stack(pid: ProcId, offset: u16) -> u32 {
        UcPointer::Stack { pid, offset }.to_raw()
    }

    /// Pointer to string handle `id`.
    pub fn string(id: u16) -> u32 {
        UcPointer::String(id).to_raw()
    }

    /// Pointer to list handle `id`.
    pub fn list(id: u16) -> u32 {
        UcPointer::List(id).to_raw()
    }

    /// Pointer to world object `id`.
    pub fn object(id: ObjId) -> u32 {
        UcPointer::Object(id).to_raw()
    }

    /// Pointer to global storage offset `offset`.
    pub fn global(offset: u16) -> u32 {
        UcPointer::Global(offset).to_raw()
    }
}
