//! Jumps, calls, suspension, faults and intrinsics

use crate::common::*;
use bytecode_system::{Opcode, UsecodeClass};
use core_types::{CodeLocation, ErrorKind, GameVariant, UcPointer, UcResult};
use interpreter::{builtin, ArgReader, ExecOutcome, IntrinsicContext};

fn tail(class: &mut UsecodeClass, value: u16) -> u16 {
    let at = class.emit(Opcode::Push(value));
    for op in returning_word(Vec::new()) {
        class.emit(op);
    }
    at
}

#[test]
fn test_conditional_jump() {
    for (cond, expected) in [(0, 2), (1, 1)] {
        let mut main = UsecodeClass::new();
        main.emit(Opcode::Push(cond));
        let jump = main.emit(Opcode::JumpIfFalse(0));
        tail(&mut main, 1);
        let target = tail(&mut main, 2);
        main.patch_jump(jump, target).unwrap();

        let mut machine = machine_with(GameVariant::Ultima8, vec![(MAIN, main)]);
        let mut proc = start(&machine, MAIN);
        let outcome = machine.execute(&mut proc, &mut TestHost::default());
        assert_eq!(result_of(&outcome), expected);
    }
}

#[test]
fn test_backward_jump_loop() {
    // sum = 0; n = 4; while n { sum += n; n -= 1 }
    let mut main = UsecodeClass::new();
    main.emit(Opcode::InitLocals(4));
    main.emit(Opcode::Push(4));
    main.emit(Opcode::Pop(-2));
    let head = main.emit(Opcode::PushLocal(-2));
    let exit = main.emit(Opcode::JumpIfFalse(0));
    for op in [
        Opcode::PushLocal(-4),
        Opcode::PushLocal(-2),
        Opcode::Add,
        Opcode::Pop(-4),
        Opcode::PushLocal(-2),
        Opcode::Push(1),
        Opcode::Sub,
        Opcode::Pop(-2),
    ] {
        main.emit(op);
    }
    let back = main.emit(Opcode::Jump(0));
    let done = main.emit(Opcode::PushLocal(-4));
    for op in returning_word(Vec::new()) {
        main.emit(op);
    }
    main.patch_jump(exit, done).unwrap();
    main.patch_jump(back, head).unwrap();

    let mut machine = machine_with(GameVariant::Ultima8, vec![(MAIN, main)]);
    let mut proc = start(&machine, MAIN);
    let outcome = machine.execute(&mut proc, &mut TestHost::default());
    assert_eq!(result_of(&outcome), 10);
}

#[test]
fn test_call_returns_through_temp() {
    let callee = class(vec![Opcode::Push(42), Opcode::PopTemp, Opcode::Ret]);
    let main = class(returning_word(vec![
        Opcode::Call {
            class_id: CHILD,
            offset: 0,
        },
        Opcode::PushTemp,
    ]));
    let mut machine = machine_with(GameVariant::Ultima8, vec![(MAIN, main), (CHILD, callee)]);
    let mut proc = start(&machine, MAIN);
    let sp = proc.stack.sp();
    let outcome = machine.execute(&mut proc, &mut TestHost::default());
    assert_eq!(result_of(&outcome), 42);
    // the outermost return restores the stack to its loaded state
    assert_eq!(proc.stack.sp(), sp + 6);
}

#[test]
fn test_crusader_call_goes_through_event_table() {
    let mut callee = UsecodeClass::new();
    callee.emit(Opcode::EndOfFunction);
    let entry = callee.emit(Opcode::Push(7));
    callee.emit(Opcode::PopTemp);
    callee.emit(Opcode::Ret);
    callee.set_event(3, entry);

    let main = class(returning_word(vec![
        Opcode::Call {
            class_id: CHILD,
            offset: 3,
        },
        Opcode::PushTemp,
    ]));
    let mut machine = machine_with(GameVariant::Remorse, vec![(MAIN, main), (CHILD, callee)]);
    let mut proc = start(&machine, MAIN);
    let outcome = machine.execute(&mut proc, &mut TestHost::default());
    assert_eq!(result_of(&outcome), 7);
}

#[test]
fn test_crusader_call_to_unbound_event_faults() {
    let main = class(vec![Opcode::Call {
        class_id: CHILD,
        offset: 9,
    }]);
    let mut machine = machine_with(
        GameVariant::Regret,
        vec![(MAIN, main), (CHILD, UsecodeClass::new())],
    );
    let mut proc = start(&machine, MAIN);
    let outcome = machine.execute(&mut proc, &mut TestHost::default());
    assert_eq!(fault_of(outcome).kind, ErrorKind::MissingClass);
}

#[test]
fn test_suspend_resumes_after_the_opcode() {
    let ops = returning_word(vec![Opcode::Suspend, Opcode::Push(5)]);
    let mut machine = machine_with(GameVariant::Ultima8, vec![(MAIN, class(ops))]);
    let mut proc = start(&machine, MAIN);
    let mut host = TestHost::default();
    assert_eq!(machine.execute(&mut proc, &mut host), ExecOutcome::Yielded);
    assert_eq!(proc.ip, 1);
    assert_eq!(machine.execute(&mut proc, &mut host), ExecOutcome::Terminated(5));
}

#[test]
fn test_fault_keeps_ip_on_bad_opcode() {
    let mut main = UsecodeClass::new();
    main.emit(Opcode::Push(1));
    main.emit_raw(&[0x04]);
    let mut machine = machine_with(GameVariant::Ultima8, vec![(MAIN, main)]);
    let mut proc = start(&machine, MAIN);
    let err = fault_of(machine.execute(&mut proc, &mut TestHost::default()));
    assert_eq!(err.kind, ErrorKind::InvalidOpcode);
    assert_eq!(err.location, Some(CodeLocation::new(MAIN, 3)));
    assert_eq!(proc.ip, 3);
    assert!(proc.terminate_deferred);
    assert!(proc.is_terminated());
}

#[test]
fn test_end_of_function_is_an_error() {
    let (_, _, outcome) = run(vec![Opcode::EndOfFunction]);
    assert_eq!(fault_of(outcome).kind, ErrorKind::EndOfFunction);
}

#[test]
fn test_running_off_the_code_faults() {
    let (_, _, outcome) = run(vec![Opcode::Push(1)]);
    assert_eq!(fault_of(outcome).kind, ErrorKind::UnexpectedEndOfCode);
}

#[test]
fn test_missing_class_faults() {
    let mut machine = machine_with(GameVariant::Ultima8, Vec::new());
    let mut proc = start(&machine, 0x99);
    let outcome = machine.execute(&mut proc, &mut TestHost::default());
    assert_eq!(fault_of(outcome).kind, ErrorKind::MissingClass);
}

#[test]
fn test_terminated_process_does_not_run() {
    let (mut machine, mut proc, outcome) = run(vec![Opcode::PushDword(3), Opcode::PopResult, Opcode::Ret]);
    assert_eq!(outcome, ExecOutcome::Terminated(3));
    assert_eq!(
        machine.execute(&mut proc, &mut TestHost::default()),
        ExecOutcome::Terminated(3)
    );
}

fn sum_words(_: &mut IntrinsicContext<'_>, args: &mut ArgReader<'_>) -> UcResult<u32> {
    let first = args.u16()?;
    let second = args.u16()?;
    Ok(u32::from(first) + u32::from(second))
}

#[test]
fn test_bound_intrinsic_sets_temp() {
    let ops = vec![
        Opcode::Push(2),
        Opcode::Push(3),
        Opcode::CallIntrinsic {
            arg_bytes: 4,
            func: 0x50,
        },
        Opcode::PushTempDword,
        Opcode::PopResult,
        Opcode::Ret,
    ];
    let mut machine = machine_with(GameVariant::Ultima8, vec![(MAIN, class(ops))]);
    machine.intrinsics_mut().bind(0x50, sum_words);
    let mut proc = start(&machine, MAIN);
    let outcome = machine.execute(&mut proc, &mut TestHost::default());
    assert_eq!(result_of(&outcome), 5);
}

#[test]
fn test_intrinsic_arguments_stay_on_the_stack() {
    let ops = returning_word(vec![
        Opcode::Push(8),
        Opcode::CallIntrinsic {
            arg_bytes: 2,
            func: builtin::TRUE,
        },
    ]);
    assert_eq!(result_of(&run(ops).2), 8);
}

#[test]
fn test_unbound_intrinsic_clears_temp() {
    let ops = vec![
        Opcode::PushDword(9),
        Opcode::PopTempDword,
        Opcode::PushDword(UcPointer::object(7)),
        Opcode::CallIntrinsic {
            arg_bytes: 4,
            func: 0x999,
        },
        Opcode::PushTempDword,
        Opcode::PopResult,
        Opcode::Ret,
    ];
    assert_eq!(result_of(&run(ops).2), 0);
}

#[test]
fn test_num_to_str_builtin() {
    let (machine, _, outcome) = run(returning_word(vec![
        Opcode::Push(-5i16 as u16),
        Opcode::CallIntrinsic {
            arg_bytes: 2,
            func: builtin::NUM_TO_STR,
        },
        Opcode::PushTemp,
    ]));
    assert_eq!(machine.heap().string(result_of(&outcome) as u16), Some("-5"));
}

#[test]
fn test_debug_opcodes_are_ignored() {
    let mut name = [0u8; bytecode_system::SYMBOL_NAME_LEN];
    name[..4].copy_from_slice(b"TEST");
    let ops = returning_word(vec![
        Opcode::LineNumber(12),
        Opcode::SymbolInfo { line: 13, name },
        Opcode::Push(4),
    ]);
    assert_eq!(result_of(&run(ops).2), 4);
}
