//! Shared fixtures: a recording host and program builders

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bytecode_system::{Opcode, UsecodeClass, UsecodeImage};
use core_types::{GameVariant, ObjId, ProcId};
use interpreter::{
    matches_info, ExecOutcome, ItemSearch, MachineConfig, ProcessHost, SpawnRequest, UcMachine,
    UcProcess,
};

pub const MAIN: u16 = 0x10;
pub const CHILD: u16 = 0x20;
pub const FIRST_CHILD_PID: ProcId = 100;

/// Host that keeps other processes in a map and records every request
#[derive(Debug, Default)]
pub struct TestHost {
    pub processes: BTreeMap<ProcId, UcProcess>,
    pub outcomes: BTreeMap<ProcId, ExecOutcome>,
    pub waiters: Vec<(ProcId, ProcId)>,
    pub suspended: Vec<ProcId>,
    pub items: BTreeSet<ObjId>,
    pub search_result: Option<Vec<ObjId>>,
    pub searches: Vec<(ItemSearch, Vec<u8>)>,
    pub next_pid: ProcId,
}

impl TestHost {
    pub fn with_process(mut self, pid: ProcId) -> Self {
        self.processes.insert(pid, UcProcess::new(pid, 0x100));
        self
    }
}

impl ProcessHost for TestHost {
    fn tick(&self) -> u32 {
        0
    }

    fn process_exists(&self, pid: ProcId) -> bool {
        self.processes.contains_key(&pid)
    }

    fn usecode_process(&self, pid: ProcId) -> Option<&UcProcess> {
        self.processes.get(&pid)
    }

    fn usecode_process_mut(&mut self, pid: ProcId) -> Option<&mut UcProcess> {
        self.processes.get_mut(&pid)
    }

    fn spawn_exec(&mut self, machine: &mut UcMachine, request: SpawnRequest) -> ProcId {
        let pid = self.next_pid.max(FIRST_CHILD_PID);
        self.next_pid = pid + 1;
        let mut child = machine.new_process(pid);
        if child.load(&request).is_err() {
            return 0;
        }
        let outcome = machine.execute(&mut child, self);
        self.outcomes.insert(pid, outcome);
        self.processes.insert(pid, child);
        pid
    }

    fn register_waiter(&mut self, target: ProcId, waiter: ProcId) -> bool {
        self.waiters.push((target, waiter));
        self.processes.contains_key(&target)
    }

    fn suspend(&mut self, pid: ProcId) -> bool {
        self.suspended.push(pid);
        match self.processes.get_mut(&pid) {
            Some(proc) => {
                proc.suspended = true;
                true
            }
            None => false,
        }
    }

    fn count_processes(&self, item: ObjId, ty: u16) -> u32 {
        self.processes
            .values()
            .filter(|p| !p.is_terminated() && matches_info(item, ty, p))
            .count() as u32
    }

    fn search_items(&mut self, search: &ItemSearch, script: &[u8]) -> Option<Vec<ObjId>> {
        self.searches.push((*search, script.to_vec()));
        self.search_result.clone()
    }

    fn item_exists(&self, item: ObjId) -> bool {
        self.items.contains(&item)
    }
}

pub fn class(ops: Vec<Opcode>) -> UsecodeClass {
    let mut class = UsecodeClass::new();
    for op in ops {
        class.emit(op);
    }
    class
}

pub fn machine_with(variant: GameVariant, classes: Vec<(u16, UsecodeClass)>) -> UcMachine {
    let mut image = UsecodeImage::new();
    for (id, class) in classes {
        image.insert(id, class);
    }
    UcMachine::new(
        MachineConfig::default().with_variant(variant),
        Arc::new(image),
    )
}

/// Process 1 entering `class_id` at offset 0
pub fn start(machine: &UcMachine, class_id: u16) -> UcProcess {
    let mut proc = machine.new_process(1);
    proc.load(&SpawnRequest {
        class_id,
        ..Default::default()
    })
    .unwrap();
    proc
}

/// Run `ops` as the main class of a fresh machine
pub fn run_in(
    variant: GameVariant,
    ops: Vec<Opcode>,
    host: &mut TestHost,
) -> (UcMachine, UcProcess, ExecOutcome) {
    let mut machine = machine_with(variant, vec![(MAIN, class(ops))]);
    let mut proc = start(&machine, MAIN);
    let outcome = machine.execute(&mut proc, host);
    (machine, proc, outcome)
}

pub fn run(ops: Vec<Opcode>) -> (UcMachine, UcProcess, ExecOutcome) {
    run_in(GameVariant::Ultima8, ops, &mut TestHost::default())
}

/// Result register of a terminated run
pub fn result_of(outcome: &ExecOutcome) -> u32 {
    match outcome {
        ExecOutcome::Terminated(result) => *result,
        other => panic!("expected termination, got {other:?}"),
    }
}

/// Evaluate `ops`, which leave one dword on the stack
pub fn eval_dword_in(variant: GameVariant, mut ops: Vec<Opcode>) -> i32 {
    ops.extend([Opcode::PopResult, Opcode::Ret]);
    let (_, _, outcome) = run_in(variant, ops, &mut TestHost::default());
    result_of(&outcome) as i32
}

/// Evaluate `ops`, which leave one word on the stack, sign-extended
pub fn eval_word_in(variant: GameVariant, mut ops: Vec<Opcode>) -> i32 {
    ops.push(Opcode::WordToDword);
    eval_dword_in(variant, ops)
}

pub fn eval_word(ops: Vec<Opcode>) -> i32 {
    eval_word_in(GameVariant::Ultima8, ops)
}

pub fn eval_dword(ops: Vec<Opcode>) -> i32 {
    eval_dword_in(GameVariant::Ultima8, ops)
}

/// `ops` followed by storing the top word as the result
pub fn returning_word(mut ops: Vec<Opcode>) -> Vec<Opcode> {
    ops.extend([Opcode::WordToDword, Opcode::PopResult, Opcode::Ret]);
    ops
}

/// The error of a faulted run
pub fn fault_of(outcome: ExecOutcome) -> core_types::UcError {
    match outcome {
        ExecOutcome::Faulted(err) => err,
        other => panic!("expected a fault, got {other:?}"),
    }
}
