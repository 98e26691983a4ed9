//! UsecodeClass assembly

use bytecode_system::{Opcode, UsecodeClass};

#[test]
fn test_if_else_assembly() {
    let mut class = UsecodeClass::new();
    class.emit(Opcode::PushByte(1));
    let branch = class.emit(Opcode::JumpIfFalse(0));
    class.emit(Opcode::Push(1));
    let skip = class.emit(Opcode::Jump(0));
    let otherwise = class.emit(Opcode::Push(2));
    let end = class.emit(Opcode::Ret);
    class.patch_jump(branch, otherwise).unwrap();
    class.patch_jump(skip, end).unwrap();

    let listing = class.disassemble();
    assert_eq!(listing.len(), 6);
    assert_eq!(listing[1], "0002: jne\t\t0006h");
    assert_eq!(listing[3], "0008: jmp\t\t0003h");
}

#[test]
fn test_events() {
    let mut class = UsecodeClass::new();
    let use_event = class.emit(Opcode::Ret);
    class.set_event(1, use_event);
    class.set_event(0x0A, 0x40);
    assert_eq!(class.event(1), Some(0));
    assert_eq!(class.events().collect::<Vec<_>>(), [(1, 0), (0x0A, 0x40)]);
    assert_eq!(class.event(2), None);
}
