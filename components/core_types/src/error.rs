//! Usecode machine error types.
//!
//! Every fallible operation in the machine returns a [`UcError`]. The
//! interpreter never lets one escape a single process run: it is logged,
//! the offending process is terminated and other processes keep going.

use crate::CodeLocation;
use std::fmt;
use thiserror::Error;

/// The kind of machine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Opcode byte with no meaning in the instruction set
    InvalidOpcode,
    /// Code stream ended in the middle of an instruction
    UnexpectedEndOfCode,
    /// A string or list handle that had to exist did not
    InvalidHandle,
    /// Two lists combined by an instruction disagree on element width
    ElementSizeMismatch,
    /// An inline operand carried a value the instruction cannot handle
    InvalidOperand,
    /// A process referenced by id no longer exists
    MissingProcess,
    /// A pointer named a segment that cannot be accessed this way
    InvalidSegment,
    /// Write through a pointer into a read-only segment
    ReadOnlySegment,
    /// Push past the bottom of a process stack
    StackOverflow,
    /// Pop past the top of a process stack
    StackUnderflow,
    /// Stack access outside the stack buffer
    StackOutOfBounds,
    /// Global storage access crossing the end of the store
    GlobalOutOfBounds,
    /// The end-of-function marker was executed
    EndOfFunction,
    /// A class id with no code in the loaded usecode
    MissingClass,
    /// A saved state or image could not be decoded
    CorruptSave,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidOpcode => "invalid opcode",
            ErrorKind::UnexpectedEndOfCode => "unexpected end of code",
            ErrorKind::InvalidHandle => "invalid handle",
            ErrorKind::ElementSizeMismatch => "element size mismatch",
            ErrorKind::InvalidOperand => "invalid operand",
            ErrorKind::MissingProcess => "missing process",
            ErrorKind::InvalidSegment => "invalid segment",
            ErrorKind::ReadOnlySegment => "read-only segment",
            ErrorKind::StackOverflow => "stack overflow",
            ErrorKind::StackUnderflow => "stack underflow",
            ErrorKind::StackOutOfBounds => "stack access out of bounds",
            ErrorKind::GlobalOutOfBounds => "global access out of bounds",
            ErrorKind::EndOfFunction => "end of function reached",
            ErrorKind::MissingClass => "missing class",
            ErrorKind::CorruptSave => "corrupt saved data",
        };
        f.write_str(name)
    }
}

/// A machine error with message and, once known, the failing location.
///
/// # Examples
///
/// ```
/// use core_types::{CodeLocation, ErrorKind, UcError};
///
/// let error = UcError::new(ErrorKind::InvalidOpcode, "opcode 0xFE")
///     .at(CodeLocation::new(0x12, 0x40));
///
/// assert_eq!(error.to_string(), "invalid opcode: opcode 0xFE (at 0012:0040)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}{}", location_suffix(.location))]
pub struct UcError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Instruction that raised the error, filled in by the interpreter
    pub location: Option<CodeLocation>,
}

impl UcError {
    /// Create an error without a location.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            location: None,
        }
    }

    /// Attach the failing location, keeping an earlier one if present.
    pub fn at(mut self, location: CodeLocation) -> Self {
        self.location.get_or_insert(location);
        self
    }
}

fn location_suffix(location: &Option<CodeLocation>) -> String {
    match location {
        Some(loc) => format!(" (at {loc})"),
        None => String::new(),
    }
}

/// Result alias used across the machine.
pub type UcResult<T> = Result<T, UcError>;
