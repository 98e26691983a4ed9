//! What a machine promises any [`ProcessHost`] implementation

use std::sync::Arc;

use bytecode_system::{Opcode, UsecodeClass, UsecodeImage};
use core_types::{ErrorKind, GameVariant};
use interpreter::{
    CallFrame, ExecOutcome, MachineConfig, NullHost, ProcessHost, SpawnRequest, UcMachine,
};

fn machine(ops: Vec<Opcode>) -> UcMachine {
    let mut class = UsecodeClass::new();
    for op in ops {
        class.emit(op);
    }
    let mut image = UsecodeImage::new();
    image.insert(1, class);
    UcMachine::new(MachineConfig::default(), Arc::new(image))
}

fn load(machine: &UcMachine) -> interpreter::UcProcess {
    let mut proc = machine.new_process(3);
    proc.load(&SpawnRequest {
        class_id: 1,
        ..Default::default()
    })
    .unwrap();
    proc
}

#[test]
fn test_machine_never_terminates_the_process_itself() {
    let mut m = machine(vec![Opcode::Ret]);
    let mut proc = load(&m);
    assert_eq!(m.execute(&mut proc, &mut NullHost::default()), ExecOutcome::Terminated(0));
    assert!(proc.terminate_deferred);
    assert!(!proc.terminated);
    m.terminate_process(&mut proc);
    assert!(proc.terminated);
    assert!(!proc.terminate_deferred);
}

#[test]
fn test_failed_spawn_yields_pid_zero() {
    let mut m = machine(vec![
        Opcode::PushDword(0),
        Opcode::Spawn {
            arg_bytes: 0,
            this_size: 0,
            class_id: 1,
            offset: 0,
        },
        Opcode::PushTempDword,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut proc = load(&m);
    assert_eq!(m.execute(&mut proc, &mut NullHost::default()), ExecOutcome::Terminated(0));
}

#[test]
fn test_own_pid_resolves_without_host() {
    let mut m = machine(vec![
        Opcode::PushPid,
        Opcode::PushPid,
        Opcode::Implies,
        Opcode::Suspend,
    ]);
    let mut proc = load(&m);
    assert_eq!(m.execute(&mut proc, &mut NullHost::default()), ExecOutcome::Yielded);
    assert!(proc.suspended);
}

#[test]
fn test_foreign_stack_requires_host() {
    let mut m = machine(vec![
        Opcode::PushDword(core_types::UcPointer::stack(9, 0x10)),
        Opcode::PushIndirect(2),
        Opcode::Ret,
    ]);
    let mut proc = load(&m);
    let outcome = m.execute(&mut proc, &mut NullHost::default());
    match outcome {
        ExecOutcome::Faulted(err) => assert_eq!(err.kind, ErrorKind::MissingProcess),
        other => panic!("expected a fault, got {other:?}"),
    }
}

#[test]
fn test_null_host_is_empty() {
    let host = NullHost::default();
    assert!(!host.process_exists(1));
    assert_eq!(host.count_processes(0, 6), 0);
    assert!(!host.item_exists(1));
}

#[test]
fn test_outermost_frame_layout() {
    let m = machine(vec![Opcode::Ret]);
    let proc = load(&m);
    let frame = proc.stack.access(proc.stack.sp(), CallFrame::SIZE).unwrap();
    assert_eq!(frame, &[0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(m.variant(), GameVariant::Ultima8);
}
