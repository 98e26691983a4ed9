//! Bytecode interpreter for usecode
//!
//! This crate provides the usecode virtual machine:
//! - A per-process byte stack with call frames
//! - Dispatch of every usecode opcode
//! - Segmented pointers into stacks, globals and the string/list heaps
//! - A table of native intrinsics
//! - The [`ProcessHost`] contract through which a scheduler supplies
//!   other processes and the game world
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use bytecode_system::{Opcode, UsecodeClass, UsecodeImage};
//! use interpreter::{ExecOutcome, MachineConfig, SpawnRequest, UcMachine};
//!
//! let mut class = UsecodeClass::new();
//! class.emit(Opcode::PushDword(7));
//! class.emit(Opcode::PopResult);
//! class.emit(Opcode::Ret);
//! let mut image = UsecodeImage::new();
//! image.insert(0x10, class);
//!
//! let mut machine = UcMachine::new(MachineConfig::default(), Arc::new(image));
//! let mut proc = machine.new_process(1);
//! proc.load(&SpawnRequest { class_id: 0x10, ..Default::default() }).unwrap();
//! let mut host = interpreter::NullHost::default();
//! assert_eq!(machine.execute(&mut proc, &mut host), ExecOutcome::Terminated(7));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call_frame;
pub mod config;
pub mod dispatch;
pub mod host;
pub mod intrinsics;
pub mod pointer;
pub mod process;
pub mod vm;

// Re-export main types at crate root
pub use call_frame::CallFrame;
pub use config::{MachineConfig, PoolConfig};
pub use host::{matches_info, ItemSearch, NullHost, ProcessHost, SpawnRequest};
pub use intrinsics::{builtin, ArgReader, Intrinsic, IntrinsicContext, IntrinsicTable};
pub use process::{HandleKind, ResourceScope, UcProcess};
pub use vm::{ExecOutcome, UcMachine};
