//! Scheduling, spawning and waiting

use crate::common::*;
use bytecode_system::Opcode;
use interpreter::{ExecOutcome, ProcessHost};
use scheduler::Kernel;

#[test]
fn test_spawned_child_runs_before_parent_continues() {
    let child = class(vec![
        Opcode::Push(0x11),
        Opcode::PopGlobal { pos: 0, size: 8 },
        Opcode::Ret,
    ]);
    let mut main = vec![];
    main.extend(spawn(CHILD, 0));
    main.extend([
        Opcode::PushGlobal { pos: 0, size: 8 },
        Opcode::WordToDword,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut m = machine(vec![(MAIN, class(main)), (CHILD, child)]);
    let mut kernel = Kernel::new();
    let parent = kernel.add_process(&m, entry(MAIN));

    kernel.run_tick(&mut m);
    assert_eq!(kernel.outcome(parent), Some(&ExecOutcome::Terminated(0x11)));
    assert_eq!(kernel.outcome(parent + 1), Some(&ExecOutcome::Terminated(0)));
    assert!(kernel.is_idle());
}

#[test]
fn test_waiter_receives_result() {
    let child = class(vec![
        Opcode::PushDword(0x22),
        Opcode::Suspend,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut main = vec![];
    main.extend(spawn(CHILD, 0));
    main.extend([
        Opcode::PushPid,
        Opcode::PushTemp,
        Opcode::Implies,
        Opcode::Suspend,
        Opcode::PushResult,
        Opcode::PushDword(1),
        Opcode::AddDword,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut m = machine(vec![(MAIN, class(main)), (CHILD, child)]);
    let mut kernel = Kernel::new();
    let parent = kernel.add_process(&m, entry(MAIN));

    kernel.run_tick(&mut m);
    assert!(kernel.process(parent).unwrap().suspended);
    assert_eq!(kernel.pids(), &[parent, parent + 1]);

    assert_eq!(kernel.run_until_idle(&mut m, 10), 2);
    assert_eq!(kernel.outcome(parent + 1), Some(&ExecOutcome::Terminated(0x22)));
    assert_eq!(kernel.outcome(parent), Some(&ExecOutcome::Terminated(0x23)));
}

#[test]
fn test_waiting_on_child_that_already_returned() {
    let child = class(vec![Opcode::PushDword(0x31), Opcode::PopResult, Opcode::Ret]);
    let mut main = vec![];
    main.extend(spawn(CHILD, 0));
    main.extend([
        Opcode::PushPid,
        Opcode::PushTemp,
        Opcode::Implies,
        Opcode::Suspend,
        Opcode::PushResult,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut m = machine(vec![(MAIN, class(main)), (CHILD, child)]);
    let mut kernel = Kernel::new();
    let parent = kernel.add_process(&m, entry(MAIN));
    let child_pid = parent + 1;

    kernel.run_tick(&mut m);
    assert_eq!(kernel.outcome(child_pid), Some(&ExecOutcome::Terminated(0x31)));
    let waiting = kernel.process(parent).unwrap();
    assert!(!waiting.suspended);
    assert_eq!(waiting.result, 0x31);
    assert!(!kernel.process_exists(child_pid));

    kernel.run_until_idle(&mut m, 10);
    assert_eq!(kernel.outcome(parent), Some(&ExecOutcome::Terminated(0x31)));
}

#[test]
fn test_suspending_a_running_parent_waits_for_check_in() {
    // the child makes its parent wait for it while the parent is running
    let child = class(vec![
        Opcode::PushLocal(0x0A),
        Opcode::PushPid,
        Opcode::Implies,
        Opcode::Suspend,
        Opcode::PushDword(0x66),
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut main = vec![Opcode::PushPid];
    main.extend(spawn(CHILD, 2));
    main.extend([Opcode::Suspend, Opcode::Ret]);
    let mut m = machine(vec![(MAIN, class(main)), (CHILD, child)]);
    let mut kernel = Kernel::new();
    let parent = kernel.add_process(&m, entry(MAIN));

    kernel.run_tick(&mut m);
    assert!(kernel.process(parent).unwrap().suspended);

    kernel.run_until_idle(&mut m, 10);
    assert_eq!(kernel.outcome(parent), Some(&ExecOutcome::Terminated(0x66)));
}

#[test]
fn test_exclusive_process_yields_to_running_one() {
    let holder = class(vec![
        Opcode::Push(2),
        Opcode::Push(40),
        Opcode::SetInfo,
        Opcode::Suspend,
        Opcode::Ret,
    ]);
    let latecomer = class(vec![
        Opcode::Push(2),
        Opcode::Push(40),
        Opcode::SetInfo,
        Opcode::ProcessExclude,
        Opcode::PushDword(9),
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut m = machine(vec![(MAIN, holder), (OTHER, latecomer)]);
    let mut kernel = Kernel::new();
    let first = kernel.add_process(&m, entry(MAIN));
    let second = kernel.add_process(&m, entry(OTHER));

    kernel.run_tick(&mut m);
    assert_eq!(kernel.outcome(second), Some(&ExecOutcome::Terminated(0)));
    assert_eq!(kernel.count_processes(40, 2), 1);
    assert_eq!(kernel.count_processes(0, 6), 1);

    kernel.run_until_idle(&mut m, 10);
    assert!(kernel.outcome(first).is_some());
    assert_eq!(kernel.count_processes(0, 6), 0);
}

#[test]
fn test_fault_only_kills_offender() {
    let mut bad = class(vec![Opcode::Push(1)]);
    bad.emit_raw(&[0xFE]);
    let good = class(vec![
        Opcode::Suspend,
        Opcode::PushDword(7),
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let mut m = machine(vec![(MAIN, bad), (OTHER, good)]);
    let mut kernel = Kernel::new();
    let bad_pid = kernel.add_process(&m, entry(MAIN));
    let good_pid = kernel.add_process(&m, entry(OTHER));

    kernel.run_until_idle(&mut m, 10);
    assert!(matches!(kernel.outcome(bad_pid), Some(ExecOutcome::Faulted(_))));
    assert_eq!(kernel.outcome(good_pid), Some(&ExecOutcome::Terminated(7)));
}

#[test]
fn test_terminate_wakes_waiters() {
    let sleeper = class(vec![Opcode::Suspend, Opcode::Jump(-4)]);
    let mut m = machine(vec![(MAIN, sleeper)]);
    let mut kernel = Kernel::new();
    let target = kernel.add_process(&m, entry(MAIN));
    let waiter = kernel.add_process(&m, entry(MAIN));
    assert!(kernel.register_waiter(target, waiter));
    assert!(kernel.suspend(waiter));
    kernel.process_mut(target).unwrap().result = 0x99;

    assert!(kernel.terminate(&mut m, target));
    let woken = kernel.process(waiter).unwrap();
    assert!(!woken.suspended);
    assert_eq!(woken.result, 0x99);
}

#[test]
fn test_tick_limit_stops_endless_loops() {
    let spinner = class(vec![Opcode::Suspend, Opcode::Jump(-4)]);
    let mut m = machine(vec![(MAIN, spinner)]);
    let mut kernel = Kernel::new();
    kernel.add_process(&m, entry(MAIN));
    assert_eq!(kernel.run_until_idle(&mut m, 5), 5);
    assert!(!kernel.is_idle());
    assert_eq!(kernel.current_tick(), 5);
}

#[test]
fn test_reset_releases_pids_and_heap() {
    let owner = class(vec![
        Opcode::PushString("kept".into()),
        Opcode::ParamPidChange { var: -2, kind: 1 },
        Opcode::Suspend,
        Opcode::Ret,
    ]);
    let mut m = machine(vec![(MAIN, owner)]);
    let mut kernel = Kernel::new();
    kernel.add_process(&m, entry(MAIN));
    kernel.run_tick(&mut m);
    assert_eq!(m.usecode_stats().strings, 2);

    kernel.reset(&mut m);
    assert_eq!(kernel.process_count(), 0);
    assert_eq!(m.usecode_stats().strings, 1);
    assert_eq!(kernel.add_process(&m, entry(MAIN)), 1);
}
