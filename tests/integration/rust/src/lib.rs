//! Integration test suite for the usecode machine
//!
//! This crate provides integration tests that verify components work
//! together correctly across component boundaries.

use bytecode_system::{Opcode, UsecodeClass, UsecodeImage};
use core_types::GameVariant;
use interpreter::{MachineConfig, UcMachine};
use std::sync::Arc;

/// Re-export components for test convenience
pub mod components {
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
    pub use scheduler;
    pub use uc_cli;
}

/// Assemble `ops` into a class
pub fn assemble(ops: Vec<Opcode>) -> UsecodeClass {
    let mut class = UsecodeClass::new();
    for op in ops {
        class.emit(op);
    }
    class
}

/// An image holding `classes`
pub fn image_of(classes: Vec<(u16, UsecodeClass)>) -> UsecodeImage {
    let mut image = UsecodeImage::new();
    for (id, class) in classes {
        image.insert(id, class);
    }
    image
}

/// A machine of `variant` running `image`
pub fn machine_for(variant: GameVariant, image: UsecodeImage) -> UcMachine {
    UcMachine::new(MachineConfig::default().with_variant(variant), Arc::new(image))
}
