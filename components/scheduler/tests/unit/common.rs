//! Program builders shared by the kernel tests

use std::sync::Arc;

use bytecode_system::{Opcode, UsecodeClass, UsecodeImage};
use core_types::GameVariant;
use interpreter::{MachineConfig, SpawnRequest, UcMachine};

pub const MAIN: u16 = 0x10;
pub const CHILD: u16 = 0x20;
pub const OTHER: u16 = 0x30;

pub fn class(ops: Vec<Opcode>) -> UsecodeClass {
    let mut class = UsecodeClass::new();
    for op in ops {
        class.emit(op);
    }
    class
}

pub fn machine(classes: Vec<(u16, UsecodeClass)>) -> UcMachine {
    let mut image = UsecodeImage::new();
    for (id, class) in classes {
        image.insert(id, class);
    }
    UcMachine::new(
        MachineConfig::default().with_variant(GameVariant::Ultima8),
        Arc::new(image),
    )
}

pub fn entry(class_id: u16) -> SpawnRequest {
    SpawnRequest {
        class_id,
        ..Default::default()
    }
}

/// Spawn `class_id` at offset 0 with `arg_bytes` already pushed
pub fn spawn(class_id: u16, arg_bytes: u8) -> [Opcode; 2] {
    [
        Opcode::PushDword(0),
        Opcode::Spawn {
            arg_bytes,
            this_size: 0,
            class_id,
            offset: 0,
        },
    ]
}
