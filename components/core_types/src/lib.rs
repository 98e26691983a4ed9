//! Core usecode types and error handling.
//!
//! This crate provides the foundational types shared by every layer of the
//! usecode virtual machine: identifiers, the segmented pointer, code
//! locations, the game variant switch and the error type.
//!
//! # Overview
//!
//! - [`UcPointer`] - Tagged 32-bit pointer over the machine's address spaces
//! - [`UcError`] - Machine errors with the offending code location
//! - [`ErrorKind`] - Classification of machine errors
//! - [`CodeLocation`] - A `class:offset` position in usecode
//! - [`GameVariant`] - Which game's conventions the machine follows
//! - [`ByteReader`] / [`ByteWriter`] - Little-endian codec for saves and images
//!
//! # Examples
//!
//! ```
//! use core_types::{ErrorKind, UcError, UcPointer};
//!
//! let ptr = UcPointer::Stack { pid: 3, offset: 0x0ff0 };
//! assert_eq!(ptr.to_raw(), 0x0003_0ff0);
//! assert_eq!(UcPointer::from_raw(0x0003_0ff0).unwrap(), ptr);
//!
//! let error = UcError::new(ErrorKind::InvalidHandle, "list 12 does not exist");
//! assert_eq!(error.kind, ErrorKind::InvalidHandle);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod codec;
mod error;
mod location;
mod pointer;
mod variant;

pub use codec::{ByteReader, ByteWriter};
pub use error::{ErrorKind, UcError, UcResult};
pub use location::CodeLocation;
pub use pointer::{Segment, UcPointer};
pub use variant::GameVariant;

/// Identifier of a schedulable process. 0 is never a live process.
pub type ProcId = u16;

/// Identifier of a world object (item, actor, container).
pub type ObjId = u16;

/// Class/offset pair marking "no caller", used for the outermost frame.
pub const NO_CLASS: u16 = 0xFFFF;
