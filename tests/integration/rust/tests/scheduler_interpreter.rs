//! Scheduler and Interpreter Integration Tests
//!
//! Several processes sharing one machine through the kernel.

use bytecode_system::Opcode;
use core_types::{ErrorKind, GameVariant};
use integration_tests::{assemble, image_of, machine_for};
use interpreter::{ExecOutcome, SpawnRequest};
use scheduler::{Kernel, StaticWorld, WorldItem};

fn entry(class_id: u16) -> SpawnRequest {
    SpawnRequest {
        class_id,
        ..Default::default()
    }
}

/// Test: a spawned child finishes its first turn before the parent's
/// next instruction, and each child sees the previous one's work
#[test]
fn test_spawn_order_is_depth_first() {
    // child: global[0] = global[0] * 10 + arg
    let child = assemble(vec![
        Opcode::PushGlobal { pos: 0, size: 16 },
        Opcode::Push(10),
        Opcode::Mul,
        Opcode::PushLocal(0x0A),
        Opcode::Add,
        Opcode::PopGlobal { pos: 0, size: 16 },
        Opcode::Ret,
    ]);
    let mut parent = Vec::new();
    for digit in [1, 2, 3] {
        parent.extend([
            Opcode::Push(digit),
            Opcode::PushDword(0),
            Opcode::Spawn {
                arg_bytes: 2,
                this_size: 0,
                class_id: 2,
                offset: 0,
            },
            Opcode::MoveSp(-2),
        ]);
    }
    parent.extend([
        Opcode::PushGlobal { pos: 0, size: 16 },
        Opcode::WordToDword,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let image = image_of(vec![(1, assemble(parent)), (2, child)]);
    let mut machine = machine_for(GameVariant::Ultima8, image);
    let mut kernel = Kernel::new();
    let pid = kernel.add_process(&machine, entry(1));

    kernel.run_tick(&mut machine);
    assert_eq!(kernel.outcome(pid), Some(&ExecOutcome::Terminated(123)));
    assert_eq!(kernel.process_count(), 0);
}

/// Test: an unknown opcode kills only the process that hit it
#[test]
fn test_unknown_opcode_is_isolated() {
    let mut broken = assemble(vec![Opcode::PushString("leaked?".into())]);
    broken.emit_raw(&[0xFF]);
    let healthy = assemble(vec![
        Opcode::Suspend,
        Opcode::Push(6),
        Opcode::Push(7),
        Opcode::Mul,
        Opcode::WordToDword,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let image = image_of(vec![(1, broken), (2, healthy)]);
    let mut machine = machine_for(GameVariant::Ultima8, image);
    let mut kernel = Kernel::new();
    let bad = kernel.add_process(&machine, entry(1));
    let good = kernel.add_process(&machine, entry(2));

    kernel.run_until_idle(&mut machine, 10);
    match kernel.outcome(bad) {
        Some(ExecOutcome::Faulted(err)) => {
            assert_eq!(err.kind, ErrorKind::InvalidOpcode);
            assert_eq!(err.location.map(|l| l.offset), Some(0x0B));
        }
        other => panic!("expected a fault, got {other:?}"),
    }
    assert_eq!(kernel.outcome(good), Some(&ExecOutcome::Terminated(42)));
}

/// Test: a search loop walks the kernel's world and frees its list
#[test]
fn test_container_search_counts_contents() {
    let world = StaticWorld::new()
        .with_item(50, WorldItem::at(0, 0, 0))
        .with_item(51, WorldItem::default().inside(50))
        .with_item(52, WorldItem::default().inside(50))
        .with_item(53, WorldItem::default().inside(51));

    let mut main = bytecode_system::UsecodeClass::new();
    main.emit(Opcode::InitLocals(4));
    main.emit(Opcode::LoopScript(b'$'));
    main.emit(Opcode::LoopScript(0x01));
    main.emit(Opcode::Push(50));
    main.emit(Opcode::Push(0xFFFF));
    main.emit(Opcode::LoopSearch {
        var: -2,
        script_size: 2,
        search_type: 5,
    });
    let head = main.emit(Opcode::JumpIfFalse(0));
    main.emit(Opcode::PushLocal(-4));
    main.emit(Opcode::Push(1));
    main.emit(Opcode::Add);
    main.emit(Opcode::Pop(-4));
    main.emit(Opcode::LoopNext);
    let back = main.emit(Opcode::Jump(0));
    let done = main.emit(Opcode::PushLocal(-4));
    main.emit(Opcode::WordToDword);
    main.emit(Opcode::PopResult);
    main.emit(Opcode::Ret);
    main.patch_jump(head, done).unwrap();
    main.patch_jump(back, head).unwrap();

    let mut machine = machine_for(GameVariant::Ultima8, image_of(vec![(1, main)]));
    let mut kernel = Kernel::with_world(Box::new(world));
    let pid = kernel.add_process(&machine, entry(1));
    kernel.run_until_idle(&mut machine, 4);

    assert_eq!(kernel.outcome(pid), Some(&ExecOutcome::Terminated(3)));
    assert_eq!(machine.usecode_stats().lists, 0);
}
