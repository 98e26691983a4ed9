//! Usecode opcodes
//!
//! Every instruction is one opcode byte followed by fixed inline operands.
//! `Opcode` carries the decoded operands; [`Opcode::decode`] and
//! [`Opcode::encode`] convert to and from the byte stream. BP-relative
//! operands are signed bytes, jumps are signed 16-bit displacements from
//! the end of the instruction.

use crate::reader::CodeReader;
use core_types::{ErrorKind, UcError, UcResult};
use std::fmt;

/// Length of the class name carried by the symbol-info debug opcode.
pub const SYMBOL_NAME_LEN: usize = 9;

/// A decoded usecode instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opcode {
    // Pops into locals
    /// 00: pop word, store its low byte at BP+xx
    PopByte(i8),
    /// 01: pop word into BP+xx
    Pop(i8),
    /// 02: pop dword into BP+xx
    PopDword(i8),
    /// 03: pop `size` bytes into BP+xx
    PopHuge {
        /// BP offset
        var: i8,
        /// Byte count
        size: u8,
    },
    /// 08: pop dword into the process result register
    PopResult,
    /// 09: pop a value into element (index popped first) of the list at BP+xx
    AssignElement {
        /// BP offset of the list handle
        var: i8,
        /// Element size
        size: u8,
        /// Whether the list is a string list
        slist: bool,
    },

    // Pushes of constants
    /// 0A: push sign-extended byte as word
    PushByte(i8),
    /// 0B: push word
    Push(u16),
    /// 0C: push dword
    PushDword(u32),
    /// 0D: push a new string holding the literal
    PushString(String),
    /// 0E: pop `count` values of `size` bytes and push a new list of them
    CreateList {
        /// Element size
        size: u8,
        /// Element count
        count: u8,
    },

    // Calls
    /// 0F: call intrinsic `func` with `arg_bytes` bytes of arguments
    CallIntrinsic {
        /// Argument block size (arguments stay on the stack)
        arg_bytes: u8,
        /// Intrinsic number
        func: u16,
    },
    /// 11: call `class_id:offset` (an event number in Crusader)
    Call {
        /// Callee class
        class_id: u16,
        /// Callee offset or event
        offset: u16,
    },
    /// 12: pop word into temp
    PopTemp,
    /// 13: pop dword into temp
    PopTempDword,

    // Arithmetic and comparison
    /// 14: 16-bit add
    Add,
    /// 15: 32-bit add
    AddDword,
    /// 16: concatenate two strings
    Concat,
    /// 17: append two lists
    AppendList,
    /// 19: union of two string lists
    UnionStringList(u8),
    /// 1A: subtract string lists
    SubtractStringList(u8),
    /// 1B: subtract lists of the given element size
    SubtractList(u8),
    /// 1C: 16-bit subtract
    Sub,
    /// 1D: 32-bit subtract
    SubDword,
    /// 1E: 16-bit multiply
    Mul,
    /// 1F: 32-bit multiply
    MulDword,
    /// 20: 16-bit divide
    Div,
    /// 21: 32-bit divide
    DivDword,
    /// 22: 16-bit modulo
    Mod,
    /// 23: 32-bit modulo
    ModDword,
    /// 24: 16-bit equal
    Eq,
    /// 25: 32-bit equal
    EqDword,
    /// 26: string equal (frees both strings)
    StringEq,
    /// 28: 16-bit less than
    Lt,
    /// 29: 32-bit less than
    LtDword,
    /// 2A: 16-bit less or equal
    Le,
    /// 2B: 32-bit less or equal
    LeDword,
    /// 2C: 16-bit greater than
    Gt,
    /// 2D: 32-bit greater than
    GtDword,
    /// 2E: 16-bit greater or equal
    Ge,
    /// 2F: 32-bit greater or equal
    GeDword,
    /// 30: 16-bit logical not
    Not,
    /// 31: 32-bit logical not
    NotDword,
    /// 32: 16-bit logical and
    And,
    /// 33: 32-bit logical and
    AndDword,
    /// 34: 16-bit logical or
    Or,
    /// 35: 32-bit logical or
    OrDword,
    /// 36: 16-bit not equal
    Ne,
    /// 37: 32-bit not equal
    NeDword,
    /// 38: membership test; frees the list
    InList {
        /// Element size
        size: u8,
        /// Whether the list is a string list
        slist: bool,
    },
    /// 39: bitwise and
    BitAnd,
    /// 3A: bitwise or
    BitOr,
    /// 3B: bitwise not
    BitNot,
    /// 3C: left shift
    Shl,
    /// 3D: arithmetic right shift
    Sar,

    // Pushes of locals
    /// 3E: push sign-extended byte at BP+xx
    PushLocalByte(i8),
    /// 3F: push word at BP+xx
    PushLocal(i8),
    /// 40: push dword at BP+xx
    PushLocalDword(i8),
    /// 41: push a copy of the string at BP+xx
    PushStringLocal(i8),
    /// 42: push a copy of the list at BP+xx
    PushList {
        /// BP offset
        var: i8,
        /// Element size
        size: u8,
    },
    /// 43: push a deep copy of the string list at BP+xx
    PushStringList(i8),
    /// 44: push one element of a list (list and index popped)
    PushElement {
        /// Element size
        size: u8,
        /// Whether the list is a string list
        slist: bool,
    },
    /// 45: push `size` bytes from BP+xx
    PushHuge {
        /// BP offset
        var: i8,
        /// Byte count
        size: u8,
    },
    /// 4B: push a stack pointer to BP+xx
    PushAddress(i8),
    /// 4C: pop a pointer and push `n` bytes read through it
    PushIndirect(u8),
    /// 4D: pop a pointer and store `n` bytes through it
    PopIndirect(u8),
    /// 4E: push global
    PushGlobal {
        /// Global position
        pos: u16,
        /// Width in storage units
        size: u8,
    },
    /// 4F: pop into global
    PopGlobal {
        /// Global position
        pos: u16,
        /// Width in storage units
        size: u8,
    },

    // Control flow
    /// 50: return
    Ret,
    /// 51: relative jump when the popped word is zero
    JumpIfFalse(i16),
    /// 52: relative jump
    Jump(i16),
    /// 53: suspend the process
    Suspend,
    /// 54: make one process wait for another
    Implies,
    /// 57: spawn a process
    Spawn {
        /// Argument bytes below the this pointer
        arg_bytes: u8,
        /// Size of the object the this pointer refers to
        this_size: u8,
        /// Class of the new process
        class_id: u16,
        /// Offset (or event number in Crusader)
        offset: u16,
    },
    /// 58: spawn a process running code inline in the current class
    SpawnInline {
        /// Class of the new process
        class_id: u16,
        /// Function offset
        offset: u16,
        /// Added to `offset` to give the entry point
        delta: u16,
        /// Size of the this object
        this_size: u8,
        /// Unused trailing operand
        unknown: u8,
    },
    /// 59: push the current pid
    PushPid,
    /// 5A: reserve and zero local variable space
    InitLocals(u8),
    /// 5B: debug line number
    LineNumber(u16),
    /// 5C: debug line number with class name
    SymbolInfo {
        /// Source line
        line: u16,
        /// Raw class name bytes
        name: [u8; SYMBOL_NAME_LEN],
    },
    /// 5D: push low byte of temp
    PushTempByte,
    /// 5E: push low word of temp
    PushTemp,
    /// 5F: push temp
    PushTempDword,
    /// 60: sign-extend word to dword
    WordToDword,
    /// 61: truncate dword to word
    DwordToWord,

    // Explicit frees
    /// 62: free string at BP+xx
    FreeStringLocal(i8),
    /// 63: free string list at BP+xx
    FreeStringListLocal(i8),
    /// 64: free list at BP+xx
    FreeListLocal(i8),
    /// 65: free string at SP+xx
    FreeStringAtSp(i8),
    /// 66: free list at SP+xx
    FreeListAtSp(i8),
    /// 67: free string list at SP+xx
    FreeStringListAtSp(i8),
    /// 69: push pointer to the string at BP+xx
    StringLocalToPtr(i8),
    /// 6B: pop string, push pointer to it
    StringToPtr,
    /// 6C: take ownership of a string/slist/list parameter
    ParamPidChange {
        /// BP offset
        var: i8,
        /// 1 string, 2 string list, 3 list
        kind: u8,
    },
    /// 6D: push the process result
    PushResult,
    /// 6E: adjust SP by minus xx
    MoveSp(i8),
    /// 6F: push a stack pointer to SP-xx
    PushSpAddress(i8),

    // Loops
    /// 70: start an item search loop
    LoopSearch {
        /// BP offset of the loop variable
        var: i8,
        /// Loop script length
        script_size: u8,
        /// Search type (2..=6)
        search_type: u8,
    },
    /// 73: advance the item search loop
    LoopNext,
    /// 74: push one byte of loop script
    LoopScript(u8),
    /// 75: foreach over a list
    ForEachList {
        /// BP offset of the loop variable
        var: i8,
        /// Element size
        size: u8,
        /// Jump taken when the loop is done
        jump: i16,
    },
    /// 76: foreach over a string list
    ForEachStringList {
        /// BP offset of the loop variable
        var: i8,
        /// Element size
        size: u8,
        /// Jump taken when the loop is done
        jump: i16,
    },

    // Process info
    /// 77: set item number and process type
    SetInfo,
    /// 78: terminate unless this is the only process for (item, type)
    ProcessExclude,
    /// 79: push pointer to a global
    PushGlobalAddress(u16),
    /// 7A: end-of-function marker
    EndOfFunction,
}

fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

fn latin1_encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

impl Opcode {
    /// Decode the instruction at the reader's position.
    ///
    /// All operands are consumed even when their values are unusable, so
    /// the reader ends up at the next instruction.
    pub fn decode(r: &mut CodeReader<'_>) -> UcResult<Self> {
        let byte = r.read_u8()?;
        let op = match byte {
            0x00 => Opcode::PopByte(r.read_i8()?),
            0x01 => Opcode::Pop(r.read_i8()?),
            0x02 => Opcode::PopDword(r.read_i8()?),
            0x03 => Opcode::PopHuge {
                var: r.read_i8()?,
                size: r.read_u8()?,
            },
            0x08 => Opcode::PopResult,
            0x09 => Opcode::AssignElement {
                var: r.read_i8()?,
                size: r.read_u8()?,
                slist: r.read_u8()? != 0,
            },
            0x0A => Opcode::PushByte(r.read_i8()?),
            0x0B => Opcode::Push(r.read_u16()?),
            0x0C => Opcode::PushDword(r.read_u32()?),
            0x0D => {
                let len = r.read_u16()?;
                let text = latin1_decode(r.read_bytes(usize::from(len))?);
                let terminator = r.read_u8()?;
                if terminator != 0 {
                    return Err(UcError::new(
                        ErrorKind::InvalidOperand,
                        "zero terminator missing in push string",
                    ));
                }
                Opcode::PushString(text)
            }
            0x0E => Opcode::CreateList {
                size: r.read_u8()?,
                count: r.read_u8()?,
            },
            0x0F => Opcode::CallIntrinsic {
                arg_bytes: r.read_u8()?,
                func: r.read_u16()?,
            },
            0x11 => Opcode::Call {
                class_id: r.read_u16()?,
                offset: r.read_u16()?,
            },
            0x12 => Opcode::PopTemp,
            0x13 => Opcode::PopTempDword,
            0x14 => Opcode::Add,
            0x15 => Opcode::AddDword,
            0x16 => Opcode::Concat,
            0x17 => Opcode::AppendList,
            0x19 => Opcode::UnionStringList(r.read_u8()?),
            0x1A => Opcode::SubtractStringList(r.read_u8()?),
            0x1B => Opcode::SubtractList(r.read_u8()?),
            0x1C => Opcode::Sub,
            0x1D => Opcode::SubDword,
            0x1E => Opcode::Mul,
            0x1F => Opcode::MulDword,
            0x20 => Opcode::Div,
            0x21 => Opcode::DivDword,
            0x22 => Opcode::Mod,
            0x23 => Opcode::ModDword,
            0x24 => Opcode::Eq,
            0x25 => Opcode::EqDword,
            0x26 => Opcode::StringEq,
            0x28 => Opcode::Lt,
            0x29 => Opcode::LtDword,
            0x2A => Opcode::Le,
            0x2B => Opcode::LeDword,
            0x2C => Opcode::Gt,
            0x2D => Opcode::GtDword,
            0x2E => Opcode::Ge,
            0x2F => Opcode::GeDword,
            0x30 => Opcode::Not,
            0x31 => Opcode::NotDword,
            0x32 => Opcode::And,
            0x33 => Opcode::AndDword,
            0x34 => Opcode::Or,
            0x35 => Opcode::OrDword,
            0x36 => Opcode::Ne,
            0x37 => Opcode::NeDword,
            0x38 => Opcode::InList {
                size: r.read_u8()?,
                slist: r.read_u8()? != 0,
            },
            0x39 => Opcode::BitAnd,
            0x3A => Opcode::BitOr,
            0x3B => Opcode::BitNot,
            0x3C => Opcode::Shl,
            0x3D => Opcode::Sar,
            0x3E => Opcode::PushLocalByte(r.read_i8()?),
            0x3F => Opcode::PushLocal(r.read_i8()?),
            0x40 => Opcode::PushLocalDword(r.read_i8()?),
            0x41 => Opcode::PushStringLocal(r.read_i8()?),
            0x42 => Opcode::PushList {
                var: r.read_i8()?,
                size: r.read_u8()?,
            },
            0x43 => Opcode::PushStringList(r.read_i8()?),
            0x44 => Opcode::PushElement {
                size: r.read_u8()?,
                slist: r.read_u8()? != 0,
            },
            0x45 => Opcode::PushHuge {
                var: r.read_i8()?,
                size: r.read_u8()?,
            },
            0x4B => Opcode::PushAddress(r.read_i8()?),
            0x4C => Opcode::PushIndirect(r.read_u8()?),
            0x4D => Opcode::PopIndirect(r.read_u8()?),
            0x4E => Opcode::PushGlobal {
                pos: r.read_u16()?,
                size: r.read_u8()?,
            },
            0x4F => Opcode::PopGlobal {
                pos: r.read_u16()?,
                size: r.read_u8()?,
            },
            0x50 => Opcode::Ret,
            0x51 => Opcode::JumpIfFalse(r.read_i16()?),
            0x52 => Opcode::Jump(r.read_i16()?),
            0x53 => Opcode::Suspend,
            0x54 => {
                // always "01 01" in shipped usecode
                r.read_u16()?;
                Opcode::Implies
            }
            0x57 => Opcode::Spawn {
                arg_bytes: r.read_u8()?,
                this_size: r.read_u8()?,
                class_id: r.read_u16()?,
                offset: r.read_u16()?,
            },
            0x58 => Opcode::SpawnInline {
                class_id: r.read_u16()?,
                offset: r.read_u16()?,
                delta: r.read_u16()?,
                this_size: r.read_u8()?,
                unknown: r.read_u8()?,
            },
            0x59 => Opcode::PushPid,
            0x5A => Opcode::InitLocals(r.read_u8()?),
            0x5B => Opcode::LineNumber(r.read_u16()?),
            0x5C => {
                let line = r.read_u16()?;
                let mut name = [0u8; SYMBOL_NAME_LEN];
                name.copy_from_slice(r.read_bytes(SYMBOL_NAME_LEN)?);
                Opcode::SymbolInfo { line, name }
            }
            0x5D => Opcode::PushTempByte,
            0x5E => Opcode::PushTemp,
            0x5F => Opcode::PushTempDword,
            0x60 => Opcode::WordToDword,
            0x61 => Opcode::DwordToWord,
            0x62 => Opcode::FreeStringLocal(r.read_i8()?),
            0x63 => Opcode::FreeStringListLocal(r.read_i8()?),
            0x64 => Opcode::FreeListLocal(r.read_i8()?),
            0x65 => Opcode::FreeStringAtSp(r.read_i8()?),
            0x66 => Opcode::FreeListAtSp(r.read_i8()?),
            0x67 => Opcode::FreeStringListAtSp(r.read_i8()?),
            0x69 => Opcode::StringLocalToPtr(r.read_i8()?),
            0x6B => Opcode::StringToPtr,
            0x6C => Opcode::ParamPidChange {
                var: r.read_i8()?,
                kind: r.read_u8()?,
            },
            0x6D => Opcode::PushResult,
            0x6E => Opcode::MoveSp(r.read_i8()?),
            0x6F => Opcode::PushSpAddress(r.read_i8()?),
            0x70 => Opcode::LoopSearch {
                var: r.read_i8()?,
                script_size: r.read_u8()?,
                search_type: r.read_u8()?,
            },
            0x73 => Opcode::LoopNext,
            0x74 => Opcode::LoopScript(r.read_u8()?),
            0x75 => Opcode::ForEachList {
                var: r.read_i8()?,
                size: r.read_u8()?,
                jump: r.read_i16()?,
            },
            0x76 => Opcode::ForEachStringList {
                var: r.read_i8()?,
                size: r.read_u8()?,
                jump: r.read_i16()?,
            },
            0x77 => Opcode::SetInfo,
            0x78 => Opcode::ProcessExclude,
            0x79 => Opcode::PushGlobalAddress(r.read_u16()?),
            0x7A => Opcode::EndOfFunction,
            other => {
                return Err(UcError::new(
                    ErrorKind::InvalidOpcode,
                    format!("unhandled opcode {other:02X}"),
                ))
            }
        };
        Ok(op)
    }

    /// The opcode byte.
    pub fn byte(&self) -> u8 {
        match self {
            Opcode::PopByte(_) => 0x00,
            Opcode::Pop(_) => 0x01,
            Opcode::PopDword(_) => 0x02,
            Opcode::PopHuge { .. } => 0x03,
            Opcode::PopResult => 0x08,
            Opcode::AssignElement { .. } => 0x09,
            Opcode::PushByte(_) => 0x0A,
            Opcode::Push(_) => 0x0B,
            Opcode::PushDword(_) => 0x0C,
            Opcode::PushString(_) => 0x0D,
            Opcode::CreateList { .. } => 0x0E,
            Opcode::CallIntrinsic { .. } => 0x0F,
            Opcode::Call { .. } => 0x11,
            Opcode::PopTemp => 0x12,
            Opcode::PopTempDword => 0x13,
            Opcode::Add => 0x14,
            Opcode::AddDword => 0x15,
            Opcode::Concat => 0x16,
            Opcode::AppendList => 0x17,
            Opcode::UnionStringList(_) => 0x19,
            Opcode::SubtractStringList(_) => 0x1A,
            Opcode::SubtractList(_) => 0x1B,
            Opcode::Sub => 0x1C,
            Opcode::SubDword => 0x1D,
            Opcode::Mul => 0x1E,
            Opcode::MulDword => 0x1F,
            Opcode::Div => 0x20,
            Opcode::DivDword => 0x21,
            Opcode::Mod => 0x22,
            Opcode::ModDword => 0x23,
            Opcode::Eq => 0x24,
            Opcode::EqDword => 0x25,
            Opcode::StringEq => 0x26,
            Opcode::Lt => 0x28,
            Opcode::LtDword => 0x29,
            Opcode::Le => 0x2A,
            Opcode::LeDword => 0x2B,
            Opcode::Gt => 0x2C,
            Opcode::GtDword => 0x2D,
            Opcode::Ge => 0x2E,
            Opcode::GeDword => 0x2F,
            Opcode::Not => 0x30,
            Opcode::NotDword => 0x31,
            Opcode::And => 0x32,
            Opcode::AndDword => 0x33,
            Opcode::Or => 0x34,
            Opcode::OrDword => 0x35,
            Opcode::Ne => 0x36,
            Opcode::NeDword => 0x37,
            Opcode::InList { .. } => 0x38,
            Opcode::BitAnd => 0x39,
            Opcode::BitOr => 0x3A,
            Opcode::BitNot => 0x3B,
            Opcode::Shl => 0x3C,
            Opcode::Sar => 0x3D,
            Opcode::PushLocalByte(_) => 0x3E,
            Opcode::PushLocal(_) => 0x3F,
            Opcode::PushLocalDword(_) => 0x40,
            Opcode::PushStringLocal(_) => 0x41,
            Opcode::PushList { .. } => 0x42,
            Opcode::PushStringList(_) => 0x43,
            Opcode::PushElement { .. } => 0x44,
            Opcode::PushHuge { .. } => 0x45,
            Opcode::PushAddress(_) => 0x4B,
            Opcode::PushIndirect(_) => 0x4C,
            Opcode::PopIndirect(_) => 0x4D,
            Opcode::PushGlobal { .. } => 0x4E,
            Opcode::PopGlobal { .. } => 0x4F,
            Opcode::Ret => 0x50,
            Opcode::JumpIfFalse(_) => 0x51,
            Opcode::Jump(_) => 0x52,
            Opcode::Suspend => 0x53,
            Opcode::Implies => 0x54,
            Opcode::Spawn { .. } => 0x57,
            Opcode::SpawnInline { .. } => 0x58,
            Opcode::PushPid => 0x59,
            Opcode::InitLocals(_) => 0x5A,
            Opcode::LineNumber(_) => 0x5B,
            Opcode::SymbolInfo { .. } => 0x5C,
            Opcode::PushTempByte => 0x5D,
            Opcode::PushTemp => 0x5E,
            Opcode::PushTempDword => 0x5F,
            Opcode::WordToDword => 0x60,
            Opcode::DwordToWord => 0x61,
            Opcode::FreeStringLocal(_) => 0x62,
            Opcode::FreeStringListLocal(_) => 0x63,
            Opcode::FreeListLocal(_) => 0x64,
            Opcode::FreeStringAtSp(_) => 0x65,
            Opcode::FreeListAtSp(_) => 0x66,
            Opcode::FreeStringListAtSp(_) => 0x67,
            Opcode::StringLocalToPtr(_) => 0x69,
            Opcode::StringToPtr => 0x6B,
            Opcode::ParamPidChange { .. } => 0x6C,
            Opcode::PushResult => 0x6D,
            Opcode::MoveSp(_) => 0x6E,
            Opcode::PushSpAddress(_) => 0x6F,
            Opcode::LoopSearch { .. } => 0x70,
            Opcode::LoopNext => 0x73,
            Opcode::LoopScript(_) => 0x74,
            Opcode::ForEachList { .. } => 0x75,
            Opcode::ForEachStringList { .. } => 0x76,
            Opcode::SetInfo => 0x77,
            Opcode::ProcessExclude => 0x78,
            Opcode::PushGlobalAddress(_) => 0x79,
            Opcode::EndOfFunction => 0x7A,
        }
    }

    /// Append the encoded instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.byte());
        match self {
            Opcode::PopByte(v)
            | Opcode::Pop(v)
            | Opcode::PopDword(v)
            | Opcode::PushByte(v)
            | Opcode::PushLocalByte(v)
            | Opcode::PushLocal(v)
            | Opcode::PushLocalDword(v)
            | Opcode::PushStringLocal(v)
            | Opcode::PushStringList(v)
            | Opcode::PushAddress(v)
            | Opcode::FreeStringLocal(v)
            | Opcode::FreeStringListLocal(v)
            | Opcode::FreeListLocal(v)
            | Opcode::FreeStringAtSp(v)
            | Opcode::FreeListAtSp(v)
            | Opcode::FreeStringListAtSp(v)
            | Opcode::StringLocalToPtr(v)
            | Opcode::MoveSp(v)
            | Opcode::PushSpAddress(v) => out.push(*v as u8),
            Opcode::UnionStringList(n)
            | Opcode::SubtractStringList(n)
            | Opcode::SubtractList(n)
            | Opcode::PushIndirect(n)
            | Opcode::PopIndirect(n)
            | Opcode::InitLocals(n)
            | Opcode::LoopScript(n) => out.push(*n),
            Opcode::PopHuge { var, size }
            | Opcode::PushList { var, size }
            | Opcode::PushHuge { var, size } => {
                out.push(*var as u8);
                out.push(*size);
            }
            Opcode::AssignElement { var, size, slist } => {
                out.extend_from_slice(&[*var as u8, *size, u8::from(*slist)]);
            }
            Opcode::Push(v) | Opcode::LineNumber(v) | Opcode::PushGlobalAddress(v) => {
                out.extend_from_slice(&v.to_le_bytes())
            }
            Opcode::PushDword(v) => out.extend_from_slice(&v.to_le_bytes()),
            Opcode::PushString(text) => {
                let bytes = latin1_encode(text);
                out.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                out.extend_from_slice(&bytes);
                out.push(0);
            }
            Opcode::CreateList { size, count } => out.extend_from_slice(&[*size, *count]),
            Opcode::CallIntrinsic { arg_bytes, func } => {
                out.push(*arg_bytes);
                out.extend_from_slice(&func.to_le_bytes());
            }
            Opcode::Call { class_id, offset } => {
                out.extend_from_slice(&class_id.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
            }
            Opcode::InList { size, slist } | Opcode::PushElement { size, slist } => {
                out.extend_from_slice(&[*size, u8::from(*slist)]);
            }
            Opcode::PushGlobal { pos, size } | Opcode::PopGlobal { pos, size } => {
                out.extend_from_slice(&pos.to_le_bytes());
                out.push(*size);
            }
            Opcode::JumpIfFalse(rel) | Opcode::Jump(rel) => {
                out.extend_from_slice(&rel.to_le_bytes())
            }
            Opcode::Implies => out.extend_from_slice(&[1, 1]),
            Opcode::Spawn {
                arg_bytes,
                this_size,
                class_id,
                offset,
            } => {
                out.extend_from_slice(&[*arg_bytes, *this_size]);
                out.extend_from_slice(&class_id.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
            }
            Opcode::SpawnInline {
                class_id,
                offset,
                delta,
                this_size,
                unknown,
            } => {
                out.extend_from_slice(&class_id.to_le_bytes());
                out.extend_from_slice(&offset.to_le_bytes());
                out.extend_from_slice(&delta.to_le_bytes());
                out.extend_from_slice(&[*this_size, *unknown]);
            }
            Opcode::SymbolInfo { line, name } => {
                out.extend_from_slice(&line.to_le_bytes());
                out.extend_from_slice(name);
            }
            Opcode::ParamPidChange { var, kind } => out.extend_from_slice(&[*var as u8, *kind]),
            Opcode::LoopSearch {
                var,
                script_size,
                search_type,
            } => out.extend_from_slice(&[*var as u8, *script_size, *search_type]),
            Opcode::ForEachList { var, size, jump }
            | Opcode::ForEachStringList { var, size, jump } => {
                out.extend_from_slice(&[*var as u8, *size]);
                out.extend_from_slice(&jump.to_le_bytes());
            }
            Opcode::PopResult
            | Opcode::PopTemp
            | Opcode::PopTempDword
            | Opcode::Add
            | Opcode::AddDword
            | Opcode::Concat
            | Opcode::AppendList
            | Opcode::Sub
            | Opcode::SubDword
            | Opcode::Mul
            | Opcode::MulDword
            | Opcode::Div
            | Opcode::DivDword
            | Opcode::Mod
            | Opcode::ModDword
            | Opcode::Eq
            | Opcode::EqDword
            | Opcode::StringEq
            | Opcode::Lt
            | Opcode::LtDword
            | Opcode::Le
            | Opcode::LeDword
            | Opcode::Gt
            | Opcode::GtDword
            | Opcode::Ge
            | Opcode::GeDword
            | Opcode::Not
            | Opcode::NotDword
            | Opcode::And
            | Opcode::AndDword
            | Opcode::Or
            | Opcode::OrDword
            | Opcode::Ne
            | Opcode::NeDword
            | Opcode::BitAnd
            | Opcode::BitOr
            | Opcode::BitNot
            | Opcode::Shl
            | Opcode::Sar
            | Opcode::Ret
            | Opcode::Suspend
            | Opcode::PushPid
            | Opcode::PushTempByte
            | Opcode::PushTemp
            | Opcode::PushTempDword
            | Opcode::WordToDword
            | Opcode::DwordToWord
            | Opcode::StringToPtr
            | Opcode::PushResult
            | Opcode::LoopNext
            | Opcode::SetInfo
            | Opcode::ProcessExclude
            | Opcode::EndOfFunction => {}
        }
    }

    /// Encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        let mut out = Vec::new();
        self.encode(&mut out);
        out.len()
    }

    /// Whether the last two operand bytes are a relative jump.
    pub fn has_jump(&self) -> bool {
        matches!(
            self,
            Opcode::JumpIfFalse(_)
                | Opcode::Jump(_)
                | Opcode::ForEachList { .. }
                | Opcode::ForEachStringList { .. }
        )
    }
}

fn bp(offset: i8) -> String {
    let sign = if offset < 0 { '-' } else { '+' };
    format!("[BP{}{:02X}h]", sign, offset.unsigned_abs())
}

fn sp(offset: i8) -> String {
    let sign = if offset < 0 { '-' } else { '+' };
    format!("[SP{}{:02X}h]", sign, offset.unsigned_abs())
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::PopByte(v) => write!(f, "pop byte\t{}", bp(*v)),
            Opcode::Pop(v) => write!(f, "pop\t\t{}", bp(*v)),
            Opcode::PopDword(v) => write!(f, "pop dword\t{}", bp(*v)),
            Opcode::PopHuge { var, size } => write!(f, "pop huge\t{} {}", bp(*var), size),
            Opcode::PopResult => f.write_str("pop dword\tprocess result"),
            Opcode::AssignElement { var, size, slist } => write!(
                f,
                "assign element\t{} ({:02X}) (slist=={:02X})",
                bp(*var),
                size,
                u8::from(*slist)
            ),
            Opcode::PushByte(v) => write!(f, "push byte\t{:04X}h", *v as i16 as u16),
            Opcode::Push(v) => write!(f, "push\t\t{v:04X}h"),
            Opcode::PushDword(v) => write!(f, "push dword\t{v:08X}h"),
            Opcode::PushString(s) => write!(f, "push string\t{s:?}"),
            Opcode::CreateList { size, count } => {
                write!(f, "create list\t{count:02X} ({size:02X})")
            }
            Opcode::CallIntrinsic { arg_bytes, func } => {
                write!(f, "calli\t\t{func:04X}h ({arg_bytes:02X}h arg bytes)")
            }
            Opcode::Call { class_id, offset } => write!(f, "call\t\t{class_id:04X}:{offset:04X}"),
            Opcode::PopTemp => f.write_str("pop\t\ttemp"),
            Opcode::PopTempDword => f.write_str("pop long\ttemp"),
            Opcode::Add => f.write_str("add"),
            Opcode::AddDword => f.write_str("add long"),
            Opcode::Concat => f.write_str("concat"),
            Opcode::AppendList => f.write_str("append"),
            Opcode::UnionStringList(n) => write!(f, "union slist\t({n:02X})"),
            Opcode::SubtractStringList(n) => write!(f, "remove slist\t({n:02X})"),
            Opcode::SubtractList(n) => write!(f, "remove list\t({n:02X})"),
            Opcode::Sub => f.write_str("sub"),
            Opcode::SubDword => f.write_str("sub long"),
            Opcode::Mul => f.write_str("mul"),
            Opcode::MulDword => f.write_str("mul long"),
            Opcode::Div => f.write_str("div"),
            Opcode::DivDword => f.write_str("div long"),
            Opcode::Mod => f.write_str("mod"),
            Opcode::ModDword => f.write_str("mod long"),
            Opcode::Eq => f.write_str("cmp"),
            Opcode::EqDword => f.write_str("cmp long"),
            Opcode::StringEq => f.write_str("strcmp"),
            Opcode::Lt => f.write_str("lt"),
            Opcode::LtDword => f.write_str("lt long"),
            Opcode::Le => f.write_str("le"),
            Opcode::LeDword => f.write_str("le long"),
            Opcode::Gt => f.write_str("gt"),
            Opcode::GtDword => f.write_str("gt long"),
            Opcode::Ge => f.write_str("ge"),
            Opcode::GeDword => f.write_str("ge long"),
            Opcode::Not => f.write_str("not"),
            Opcode::NotDword => f.write_str("not long"),
            Opcode::And => f.write_str("and"),
            Opcode::AndDword => f.write_str("and long"),
            Opcode::Or => f.write_str("or"),
            Opcode::OrDword => f.write_str("or long"),
            Opcode::Ne => f.write_str("ne"),
            Opcode::NeDword => f.write_str("ne long"),
            Opcode::InList { size, slist } => {
                write!(f, "in list\t\t{size:02X} slist=={:02X}", u8::from(*slist))
            }
            Opcode::BitAnd => f.write_str("bit_and"),
            Opcode::BitOr => f.write_str("bit_or"),
            Opcode::BitNot => f.write_str("bit_not"),
            Opcode::Shl => f.write_str("lsh"),
            Opcode::Sar => f.write_str("rsh"),
            Opcode::PushLocalByte(v) => write!(f, "push byte\t{}", bp(*v)),
            Opcode::PushLocal(v) => write!(f, "push\t\t{}", bp(*v)),
            Opcode::PushLocalDword(v) => write!(f, "push dword\t{}", bp(*v)),
            Opcode::PushStringLocal(v) => write!(f, "push string\t{}", bp(*v)),
            Opcode::PushList { var, size } => write!(f, "push list\t{} ({size:02X})", bp(*var)),
            Opcode::PushStringList(v) => write!(f, "push slist\t{}", bp(*v)),
            Opcode::PushElement { size, slist } => {
                write!(f, "push element\t{size:02X} slist=={:02X}", u8::from(*slist))
            }
            Opcode::PushHuge { var, size } => write!(f, "push huge\t{} {size:02X}", bp(*var)),
            Opcode::PushAddress(v) => write!(f, "push addr\t{}", bp(*v)),
            Opcode::PushIndirect(n) => write!(f, "push indirect\t{n:02X}h bytes"),
            Opcode::PopIndirect(n) => write!(f, "pop indirect\t{n:02X}h bytes"),
            Opcode::PushGlobal { pos, size } => write!(f, "push\t\tglobal [{pos:04X} {size:02X}]"),
            Opcode::PopGlobal { pos, size } => write!(f, "pop\t\tglobal [{pos:04X} {size:02X}]"),
            Opcode::Ret => f.write_str("ret"),
            Opcode::JumpIfFalse(rel) => write!(f, "jne\t\t{:04X}h", *rel as u16),
            Opcode::Jump(rel) => write!(f, "jmp\t\t{:04X}h", *rel as u16),
            Opcode::Suspend => f.write_str("suspend"),
            Opcode::Implies => f.write_str("implies"),
            Opcode::Spawn {
                arg_bytes,
                this_size,
                class_id,
                offset,
            } => write!(
                f,
                "spawn\t\t{arg_bytes:02X} {this_size:02X} {class_id:04X}:{offset:04X}"
            ),
            Opcode::SpawnInline {
                class_id,
                offset,
                delta,
                this_size,
                unknown,
            } => write!(
                f,
                "spawn inline\t{class_id:04X}:{offset:04X}+{delta:04X} {this_size:02X} {unknown:02X}"
            ),
            Opcode::PushPid => f.write_str("push\t\tpid"),
            Opcode::InitLocals(n) => write!(f, "init\t\t{n:02X}"),
            Opcode::LineNumber(line) => write!(f, "line number {line}"),
            Opcode::SymbolInfo { line, name } => {
                let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
                write!(f, "line number {} {line}", latin1_decode(&name[..end]))
            }
            Opcode::PushTempByte => f.write_str("push byte\tretval"),
            Opcode::PushTemp => f.write_str("push\t\tretval"),
            Opcode::PushTempDword => f.write_str("push long\tretval"),
            Opcode::WordToDword => f.write_str("int to long"),
            Opcode::DwordToWord => f.write_str("long to int"),
            Opcode::FreeStringLocal(v) => write!(f, "free string\t{}", bp(*v)),
            Opcode::FreeStringListLocal(v) => write!(f, "free slist\t{}", bp(*v)),
            Opcode::FreeListLocal(v) => write!(f, "free list\t{}", bp(*v)),
            Opcode::FreeStringAtSp(v) => write!(f, "free string\t{}", sp(*v)),
            Opcode::FreeListAtSp(v) => write!(f, "free list\t{}", sp(*v)),
            Opcode::FreeStringListAtSp(v) => write!(f, "free slist\t{}", sp(*v)),
            Opcode::StringLocalToPtr(v) => write!(f, "str to ptr\t{}", bp(*v)),
            Opcode::StringToPtr => f.write_str("str to ptr"),
            Opcode::ParamPidChange { var, kind } => {
                write!(f, "param pid chg\t{}, type={kind}", bp(*var))
            }
            Opcode::PushResult => f.write_str("push dword\tprocess result"),
            Opcode::MoveSp(v) => write!(f, "move sp\t\t{:+}", -i16::from(*v)),
            Opcode::PushSpAddress(v) => write!(f, "push addr\t{}", sp(v.wrapping_neg())),
            Opcode::LoopSearch {
                var,
                script_size,
                search_type,
            } => write!(f, "loop\t\t{} {script_size:02X} {search_type:02X}", bp(*var)),
            Opcode::LoopNext => f.write_str("loopnext"),
            Opcode::LoopScript(b) => write!(f, "loopscr\t\t{b:02X}"),
            Opcode::ForEachList { var, size, jump } => {
                write!(f, "for each\t{} ({size:02X}) {:04X}", bp(*var), *jump as u16)
            }
            Opcode::ForEachStringList { var, size, jump } => {
                write!(f, "for each str\t{} ({size:02X}) {:04X}", bp(*var), *jump as u16)
            }
            Opcode::SetInfo => f.write_str("set info"),
            Opcode::ProcessExclude => f.write_str("process exclude"),
            Opcode::PushGlobalAddress(pos) => write!(f, "push global\t{pos:04X}"),
            Opcode::EndOfFunction => f.write_str("end"),
        }
    }
}
