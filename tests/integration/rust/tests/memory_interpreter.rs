//! Memory Manager and Interpreter Integration Tests
//!
//! Tests the integration between memory_manager and interpreter components.
//! Verifies heap handles, globals and save/load as the machine sees them.

use bytecode_system::{Opcode, UsecodeImage};
use core_types::{ByteReader, GameVariant};
use integration_tests::{assemble, image_of, machine_for};
use interpreter::{ExecOutcome, MachineConfig, NullHost, PoolConfig, SpawnRequest, UcMachine};
use memory_manager::UcList;
use std::sync::Arc;

fn start(machine: &UcMachine, class_id: u16) -> interpreter::UcProcess {
    let mut proc = machine.new_process(1);
    proc.load(&SpawnRequest {
        class_id,
        ..Default::default()
    })
    .unwrap();
    proc
}

/// Test: concatenation keeps the lower handle and releases the top one
#[test]
fn test_concat_releases_top_handle() {
    let image = image_of(vec![(
        1,
        assemble(vec![
            Opcode::PushString("bar".into()),
            Opcode::PushString("foo".into()),
            Opcode::Concat,
            Opcode::PopTemp,
            Opcode::Suspend,
            Opcode::Ret,
        ]),
    )]);
    let mut machine = machine_for(GameVariant::Ultima8, image);
    let mut proc = start(&machine, 1);
    assert_eq!(machine.execute(&mut proc, &mut NullHost::default()), ExecOutcome::Yielded);

    let id = proc.temp32 as u16;
    assert_eq!(machine.heap().string(id), Some("barfoo"));
    assert_eq!(machine.usecode_stats().strings, 1);
    assert!(!machine.heap().strings().ids().is_used(id + 1));
}

/// Test: a duplicate outlives its original
#[test]
fn test_duplicate_survives_free() {
    let mut machine = machine_for(GameVariant::Ultima8, UsecodeImage::new());
    let heap = machine.heap_mut();
    let original = heap.assign_string("copy me");
    let copy = heap.duplicate_string(original);
    heap.free_string(original);
    assert_eq!(heap.string(copy), Some("copy me"));
    assert_eq!(heap.string(original), None);
}

/// Test: freeing a string list gives back the list id and its strings' ids
#[test]
fn test_free_string_list_releases_every_id() {
    let tight = PoolConfig {
        begin: 1,
        max_end: 2,
        start_count: 2,
    };
    let config = MachineConfig::default()
        .with_string_pool(tight)
        .with_list_pool(PoolConfig {
            begin: 1,
            max_end: 1,
            start_count: 1,
        });
    let mut machine = UcMachine::new(config, Arc::new(UsecodeImage::new()));
    let heap = machine.heap_mut();

    let a = heap.assign_string("a");
    let b = heap.assign_string("b");
    let mut list = UcList::new(2);
    list.append_u16(a);
    list.append_u16(b);
    let slist = heap.assign_list(list);
    assert_ne!(slist, 0);
    assert_eq!(heap.assign_string("full"), 0);

    heap.free_string_list(slist);
    assert_ne!(heap.assign_string("c"), 0);
    assert_ne!(heap.assign_string("d"), 0);
    assert_ne!(heap.assign_list(UcList::new(2)), 0);
}

/// Test: saved state loads into a fresh machine unchanged
#[test]
fn test_save_load_round_trip() {
    let mut saved = machine_for(GameVariant::Ultima8, UsecodeImage::new());
    saved.globals_mut().set_entries(0x20, 16, 0x1234).unwrap();
    saved.globals_mut().set_entries(0x40, 8, 0xFF).unwrap();
    let heap = saved.heap_mut();
    let names: Vec<u16> = ["one", "two", "three"]
        .into_iter()
        .map(|s| heap.assign_string(s))
        .collect();
    let mut slist = UcList::new(2);
    slist.append_u16(heap.assign_string("four"));
    slist.append_u16(heap.assign_string("five"));
    let slist_id = heap.assign_list(slist);
    let mut words = UcList::new(4);
    words.append(&0xDEADBEEFu32.to_le_bytes());
    let words_id = heap.assign_list(words);
    heap.free_string(names[1]);

    let mut bytes = Vec::new();
    saved.save(&mut bytes);

    let mut loaded = machine_for(GameVariant::Ultima8, UsecodeImage::new());
    loaded.load(&mut ByteReader::new(&bytes)).unwrap();

    assert_eq!(loaded.globals().get_entries(0x20, 16).unwrap(), 0x1234);
    assert_eq!(loaded.globals().get_entries(0x40, 8).unwrap(), 0xFF);
    assert_eq!(loaded.usecode_stats(), saved.usecode_stats());
    assert_eq!(loaded.heap().strings().ids(), saved.heap().strings().ids());
    assert_eq!(loaded.heap().lists().ids(), saved.heap().lists().ids());
    for (id, text) in saved.heap().strings().iter() {
        assert_eq!(loaded.heap().string(id), Some(text.as_str()));
    }
    assert_eq!(loaded.heap().list(slist_id), saved.heap().list(slist_id));
    assert_eq!(loaded.heap().list(words_id).map(UcList::element_size), Some(4));
    assert_eq!(loaded.heap().string(names[1]), None);

    // handles handed out next match as well
    let next_saved = saved.heap_mut().assign_string("six");
    let next_loaded = loaded.heap_mut().assign_string("six");
    assert_eq!(next_saved, next_loaded);
}

/// Test: a loaded machine runs code against the restored globals
#[test]
fn test_loaded_globals_visible_to_code() {
    let mut saved = machine_for(GameVariant::Remorse, UsecodeImage::new());
    saved.globals_mut().set_entries(0x10, 2, 0x0BAD).unwrap();
    let mut bytes = Vec::new();
    saved.save(&mut bytes);

    let image = image_of(vec![(
        1,
        assemble(vec![
            Opcode::PushGlobal { pos: 0x10, size: 2 },
            Opcode::WordToDword,
            Opcode::PopResult,
            Opcode::Ret,
        ]),
    )]);
    let mut machine = machine_for(GameVariant::Remorse, image);
    machine.load(&mut ByteReader::new(&bytes)).unwrap();
    let mut proc = start(&machine, 1);
    assert_eq!(
        machine.execute(&mut proc, &mut NullHost::default()),
        ExecOutcome::Terminated(0x0BAD)
    );
}
