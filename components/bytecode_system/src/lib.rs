//! Bytecode system for the usecode machine
//!
//! This crate provides the usecode instruction set, the class code
//! container scripts are assembled into, and the image format classes are
//! shipped in.
//!
//! # Features
//!
//! - Complete usecode opcode set with byte-exact decode and encode
//! - Mnemonic disassembly through `Display`
//! - Class builder with jump patching and event tables
//! - Binary image format and the `UsecodeSource` lookup trait
//!
//! # Example
//!
//! ```
//! use bytecode_system::{Opcode, UsecodeClass, UsecodeImage, UsecodeSource};
//!
//! let mut class = UsecodeClass::new();
//! class.emit(Opcode::Push(42));
//! class.emit(Opcode::PopResult);
//! class.emit(Opcode::Ret);
//!
//! let mut image = UsecodeImage::new();
//! image.insert(0x100, class);
//!
//! let restored = UsecodeImage::from_bytes(&image.to_bytes()).unwrap();
//! assert_eq!(restored.class_code(0x100).map(|c| c.len()), Some(5));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod image;
pub mod opcode;
pub mod reader;

// Re-export main types at crate root
pub use chunk::UsecodeClass;
pub use image::{UsecodeImage, UsecodeSource};
pub use opcode::{Opcode, SYMBOL_NAME_LEN};
pub use reader::CodeReader;
