//! End-to-End CLI Integration Tests
//!
//! Tests the complete runner through the uc_cli Runtime API: an image
//! file on disk in, the entry process's result out.

use bytecode_system::Opcode;
use core_types::GameVariant;
use integration_tests::{assemble, image_of};
use interpreter::builtin;
use tempfile::TempDir;
use uc_cli::Runtime;

/// Test: the built-in num_to_str intrinsic creates a string the process
/// then frees
#[test]
fn test_e2e_intrinsic_and_free() {
    let main = assemble(vec![
        Opcode::Push(0xFFF9),
        Opcode::CallIntrinsic {
            arg_bytes: 2,
            func: builtin::NUM_TO_STR,
        },
        Opcode::MoveSp(-2),
        Opcode::PushTemp,
        Opcode::PushString("-7".into()),
        Opcode::StringEq,
        Opcode::WordToDword,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("e2e.img");
    std::fs::write(&path, image_of(vec![(9, main)]).to_bytes()).unwrap();

    let report = Runtime::new().run_file(&path, 9, 0).unwrap();
    assert_eq!(report.result(), Some(1));
    assert_eq!(report.stats.strings, 0);
}

/// Test: variant selection reaches the machine
#[test]
fn test_e2e_variant_override() {
    let main = assemble(vec![
        Opcode::PushGlobal { pos: 0x1E, size: 2 },
        Opcode::WordToDword,
        Opcode::PopResult,
        Opcode::Ret,
    ]);
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("regret.img");
    std::fs::write(&path, image_of(vec![(1, main)]).to_bytes()).unwrap();

    let plain = Runtime::new().run_file(&path, 1, 0).unwrap();
    assert_eq!(plain.result(), Some(0));
    let regret = Runtime::new()
        .with_variant(GameVariant::Regret)
        .run_file(&path, 1, 0)
        .unwrap();
    assert_eq!(regret.result(), Some(1));
}
