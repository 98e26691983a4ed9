//! Cooperative scheduler for usecode processes.
//!
//! This crate provides the process owner the interpreter runs against:
//! - [`Kernel`] - pid allocation, the run list, spawn-and-run, wait-for
//!   wakeups and exclusivity counts
//! - [`ItemWorld`] - the items search loops look through, with
//!   [`StaticWorld`] as an in-memory implementation
//! - [`loop_script`] - evaluation of the filter scripts search loops carry
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use bytecode_system::{Opcode, UsecodeClass, UsecodeImage};
//! use interpreter::{ExecOutcome, MachineConfig, SpawnRequest, UcMachine};
//! use scheduler::Kernel;
//!
//! let mut class = UsecodeClass::new();
//! class.emit(Opcode::PushDword(42));
//! class.emit(Opcode::PopResult);
//! class.emit(Opcode::Ret);
//! let mut image = UsecodeImage::new();
//! image.insert(7, class);
//!
//! let mut machine = UcMachine::new(MachineConfig::default(), Arc::new(image));
//! let mut kernel = Kernel::new();
//! let pid = kernel.add_process(&machine, SpawnRequest { class_id: 7, ..Default::default() });
//! kernel.run_until_idle(&mut machine, 100);
//! assert_eq!(kernel.outcome(pid), Some(&ExecOutcome::Terminated(42)));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod kernel;
pub mod loop_script;
pub mod world;

// Re-export main types at crate root
pub use kernel::{Kernel, FIRST_PID, MAX_PID};
pub use world::{ItemWorld, StaticWorld, WorldItem};
