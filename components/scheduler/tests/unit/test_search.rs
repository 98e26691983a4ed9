//! Search loops running against a static world

use crate::common::*;
use bytecode_system::{Opcode, UsecodeClass};
use interpreter::ExecOutcome;
use scheduler::{loop_script, Kernel, StaticWorld, WorldItem};

/// Sums the numbers of every item an area search around item 1 yields
fn area_sum(range: u16, script: &[u8]) -> UsecodeClass {
    let mut main = UsecodeClass::new();
    main.emit(Opcode::InitLocals(4));
    for &byte in script.iter().rev() {
        main.emit(Opcode::LoopScript(byte));
    }
    main.emit(Opcode::Push(range));
    main.emit(Opcode::Push(1));
    main.emit(Opcode::LoopSearch {
        var: -2,
        script_size: script.len() as u8,
        search_type: 2,
    });
    let head = main.emit(Opcode::JumpIfFalse(0));
    main.emit(Opcode::PushLocal(-4));
    main.emit(Opcode::PushLocal(-2));
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
    main
}

fn world() -> StaticWorld {
    StaticWorld::new()
        .with_item(1, WorldItem::at(0, 0, 0))
        .with_item(3, WorldItem::at(5, 5, 0))
        .with_item(4, WorldItem::at(100, 0, 0))
        .with_item(5, WorldItem::at(-16, 16, 0).with_shape(9))
}

fn run_search(class: UsecodeClass) -> Option<ExecOutcome> {
    let mut m = machine(vec![(MAIN, class)]);
    let mut kernel = Kernel::with_world(Box::new(world()));
    let pid = kernel.add_process(&m, entry(MAIN));
    kernel.run_until_idle(&mut m, 4);
    assert_eq!(m.usecode_stats().lists, 0);
    kernel.outcome(pid).cloned()
}

#[test]
fn test_area_search_visits_items_in_range() {
    let outcome = run_search(area_sum(0x10, &[loop_script::TRUE, loop_script::END]));
    assert_eq!(outcome, Some(ExecOutcome::Terminated(8)));
}

#[test]
fn test_area_search_applies_script() {
    let script = [b'A', 9, 0, loop_script::END];
    let outcome = run_search(area_sum(0x10, &script));
    assert_eq!(outcome, Some(ExecOutcome::Terminated(5)));
}

#[test]
fn test_area_search_around_missing_item_is_empty() {
    let mut m = machine(vec![(MAIN, area_sum(0x10, &[loop_script::END]))]);
    let mut kernel = Kernel::new();
    let pid = kernel.add_process(&m, entry(MAIN));
    kernel.run_until_idle(&mut m, 4);
    assert_eq!(kernel.outcome(pid), Some(&ExecOutcome::Terminated(0)));
}
