//! Cooperative process kernel
//!
//! The kernel owns every usecode process and runs them one at a time in
//! creation order, once per tick. While a process runs it is checked out
//! of its slot; the slot keeps its pid alive and queues anything other
//! processes do to it until the run ends.
//!
//! A process that finishes during a tick keeps its pid until the tick
//! ends, so a parent can still link to a child that returned on its
//! first run.

use crate::world::{ItemWorld, StaticWorld};
use core_types::{ObjId, ProcId};
use interpreter::{
    matches_info, ExecOutcome, ItemSearch, ProcessHost, SpawnRequest, UcMachine, UcProcess,
};
use memory_manager::IdPool;
use std::collections::BTreeMap;
use tracing::{debug, trace, warn};

/// First process id handed out
pub const FIRST_PID: ProcId = 1;
/// Last process id handed out
pub const MAX_PID: ProcId = 32766;
const START_PIDS: u16 = 128;

#[derive(Debug)]
struct Slot {
    /// `None` while the process is running
    process: Option<UcProcess>,
    waiters: Vec<ProcId>,
    suspend_pending: bool,
    wake_pending: Option<u32>,
}

impl Slot {
    fn new(process: Option<UcProcess>) -> Self {
        Self {
            process,
            waiters: Vec::new(),
            suspend_pending: false,
            wake_pending: None,
        }
    }
}

/// Owner and scheduler of usecode processes
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use bytecode_system::{Opcode, UsecodeClass, UsecodeImage};
/// use interpreter::{ExecOutcome, MachineConfig, SpawnRequest, UcMachine};
/// use scheduler::Kernel;
///
/// let mut class = UsecodeClass::new();
/// class.emit(Opcode::PushDword(5));
/// class.emit(Opcode::Suspend);
/// class.emit(Opcode::PopResult);
/// class.emit(Opcode::Ret);
/// let mut image = UsecodeImage::new();
/// image.insert(1, class);
///
/// let mut machine = UcMachine::new(MachineConfig::default(), Arc::new(image));
/// let mut kernel = Kernel::new();
/// let pid = kernel.add_process(&machine, SpawnRequest { class_id: 1, ..Default::default() });
/// kernel.run_until_idle(&mut machine, 10);
/// assert_eq!(kernel.outcome(pid), Some(&ExecOutcome::Terminated(5)));
/// ```
pub struct Kernel {
    pids: IdPool,
    slots: BTreeMap<ProcId, Slot>,
    run_list: Vec<ProcId>,
    finished: BTreeMap<ProcId, ExecOutcome>,
    /// Result of each process finished during the current tick
    zombies: BTreeMap<ProcId, u32>,
    in_tick: bool,
    tick: u32,
    world: Box<dyn ItemWorld>,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("tick", &self.tick)
            .field("run_list", &self.run_list)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// A kernel with no processes and an empty world
    pub fn new() -> Self {
        Self::with_world(Box::new(StaticWorld::new()))
    }

    /// A kernel whose search loops look at `world`
    pub fn with_world(world: Box<dyn ItemWorld>) -> Self {
        Self {
            pids: IdPool::new(FIRST_PID, MAX_PID, START_PIDS),
            slots: BTreeMap::new(),
            run_list: Vec::new(),
            finished: BTreeMap::new(),
            zombies: BTreeMap::new(),
            in_tick: false,
            tick: 0,
            world,
        }
    }

    /// Ticks run so far
    pub fn current_tick(&self) -> u32 {
        self.tick
    }

    /// Live processes, including a running one
    pub fn process_count(&self) -> usize {
        self.slots.len()
    }

    /// A process that is not running
    pub fn process(&self, pid: ProcId) -> Option<&UcProcess> {
        self.slots.get(&pid)?.process.as_ref()
    }

    /// Mutable access to a process that is not running
    pub fn process_mut(&mut self, pid: ProcId) -> Option<&mut UcProcess> {
        self.slots.get_mut(&pid)?.process.as_mut()
    }

    /// How a finished process ended. Kept until its pid is reused.
    pub fn outcome(&self, pid: ProcId) -> Option<&ExecOutcome> {
        self.finished.get(&pid)
    }

    /// Live pids in run order
    pub fn pids(&self) -> &[ProcId] {
        &self.run_list
    }

    fn allocate(&mut self, machine: &UcMachine, request: &SpawnRequest) -> Option<UcProcess> {
        let pid = self.pids.get_new_id();
        if pid == 0 {
            warn!("out of process ids");
            return None;
        }
        let mut proc = machine.new_process(pid);
        if let Err(err) = proc.load(request) {
            warn!(pid, "cannot start {:04X}:{:04X}: {err}", request.class_id, request.offset);
            self.pids.clear_id(pid);
            return None;
        }
        self.finished.remove(&pid);
        self.run_list.push(pid);
        Some(proc)
    }

    /// Queue a new process for the next tick. Returns its pid, or 0 when
    /// it could not be created.
    pub fn add_process(&mut self, machine: &UcMachine, request: SpawnRequest) -> ProcId {
        match self.allocate(machine, &request) {
            Some(proc) => {
                let pid = proc.pid;
                debug!(pid, "added process {:04X}:{:04X}", request.class_id, request.offset);
                self.slots.insert(pid, Slot::new(Some(proc)));
                pid
            }
            None => 0,
        }
    }

    /// Give every runnable process one turn. Returns how many ran.
    pub fn run_tick(&mut self, machine: &mut UcMachine) -> usize {
        self.tick = self.tick.wrapping_add(1);
        trace!(tick = self.tick, "kernel tick");
        let mut ran = 0;
        self.in_tick = true;
        for pid in self.run_list.clone() {
            if self.is_runnable(pid) {
                self.run_process(machine, pid);
                ran += 1;
            }
        }
        self.in_tick = false;
        for pid in std::mem::take(&mut self.zombies).into_keys() {
            self.pids.clear_id(pid);
        }
        ran
    }

    /// Run ticks until nothing is runnable or `max_ticks` have passed.
    /// Returns the number of ticks run.
    pub fn run_until_idle(&mut self, machine: &mut UcMachine, max_ticks: u32) -> u32 {
        let mut ticks = 0;
        while ticks < max_ticks && !self.is_idle() {
            self.run_tick(machine);
            ticks += 1;
        }
        if !self.is_idle() {
            warn!(ticks, "processes still runnable after tick limit");
        }
        ticks
    }

    /// True when no process can run
    pub fn is_idle(&self) -> bool {
        !self.run_list.iter().any(|&pid| self.is_runnable(pid))
    }

    fn is_runnable(&self, pid: ProcId) -> bool {
        self.process(pid)
            .is_some_and(|p| !p.suspended && !p.is_terminated())
    }

    fn run_process(&mut self, machine: &mut UcMachine, pid: ProcId) {
        let Some(mut proc) = self.slots.get_mut(&pid).and_then(|slot| slot.process.take()) else {
            return;
        };
        let outcome = machine.execute(&mut proc, self);
        self.settle(machine, proc, outcome);
    }

    /// Check a process back in after a run, finishing it if it ended
    fn settle(&mut self, machine: &mut UcMachine, mut proc: UcProcess, outcome: ExecOutcome) {
        match outcome {
            ExecOutcome::Yielded => {
                let Some(slot) = self.slots.get_mut(&proc.pid) else {
                    return;
                };
                if std::mem::take(&mut slot.suspend_pending) {
                    proc.suspended = true;
                }
                if let Some(result) = slot.wake_pending.take() {
                    proc.result = result;
                    proc.suspended = false;
                }
                slot.process = Some(proc);
            }
            outcome => self.finish(machine, proc, outcome),
        }
    }

    fn finish(&mut self, machine: &mut UcMachine, mut proc: UcProcess, outcome: ExecOutcome) {
        let pid = proc.pid;
        machine.terminate_process(&mut proc);
        let waiters = self
            .slots
            .remove(&pid)
            .map(|slot| slot.waiters)
            .unwrap_or_default();
        for waiter in waiters {
            self.wake(waiter, proc.result);
        }
        self.run_list.retain(|&p| p != pid);
        if self.in_tick {
            self.zombies.insert(pid, proc.result);
        } else {
            self.pids.clear_id(pid);
        }
        self.finished.insert(pid, outcome);
    }

    fn wake(&mut self, pid: ProcId, result: u32) {
        let Some(slot) = self.slots.get_mut(&pid) else {
            return;
        };
        match slot.process.as_mut() {
            Some(proc) => {
                proc.result = result;
                proc.suspended = false;
            }
            None => slot.wake_pending = Some(result),
        }
        debug!(pid, result, "woken");
    }

    /// Kill a process that is not running; its waiters are woken.
    /// False when `pid` is not a stored process.
    pub fn terminate(&mut self, machine: &mut UcMachine, pid: ProcId) -> bool {
        let Some(proc) = self.slots.get_mut(&pid).and_then(|slot| slot.process.take()) else {
            return false;
        };
        let result = proc.result;
        self.finish(machine, proc, ExecOutcome::Terminated(result));
        true
    }

    /// Kill every process and forget finished outcomes
    pub fn reset(&mut self, machine: &mut UcMachine) {
        for pid in self.run_list.clone() {
            if let Some(mut proc) = self.slots.get_mut(&pid).and_then(|slot| slot.process.take()) {
                machine.terminate_process(&mut proc);
            }
        }
        self.slots.clear();
        self.run_list.clear();
        self.finished.clear();
        self.zombies.clear();
        self.pids.clear_all();
        debug!("kernel reset");
    }
}

impl ProcessHost for Kernel {
    fn tick(&self) -> u32 {
        self.tick
    }

    fn process_exists(&self, pid: ProcId) -> bool {
        self.slots.contains_key(&pid) || self.zombies.contains_key(&pid)
    }

    fn usecode_process(&self, pid: ProcId) -> Option<&UcProcess> {
        self.process(pid)
    }

    fn usecode_process_mut(&mut self, pid: ProcId) -> Option<&mut UcProcess> {
        self.process_mut(pid)
    }

    fn spawn_exec(&mut self, machine: &mut UcMachine, request: SpawnRequest) -> ProcId {
        let Some(mut proc) = self.allocate(machine, &request) else {
            return 0;
        };
        let pid = proc.pid;
        self.slots.insert(pid, Slot::new(None));
        debug!(pid, "spawned {:04X}:{:04X}", request.class_id, request.offset);
        let outcome = machine.execute(&mut proc, self);
        self.settle(machine, proc, outcome);
        pid
    }

    fn register_waiter(&mut self, target: ProcId, waiter: ProcId) -> bool {
        if let Some(slot) = self.slots.get_mut(&target) {
            slot.waiters.push(waiter);
            return true;
        }
        // already finished this tick; hand over its result now
        match self.zombies.get(&target).copied() {
            Some(result) => {
                self.wake(waiter, result);
                true
            }
            None => false,
        }
    }

    fn suspend(&mut self, pid: ProcId) -> bool {
        let Some(slot) = self.slots.get_mut(&pid) else {
            return false;
        };
        match slot.process.as_mut() {
            Some(proc) => proc.suspended = true,
            None => slot.suspend_pending = true,
        }
        true
    }

    fn count_processes(&self, item: ObjId, ty: u16) -> u32 {
        self.slots
            .values()
            .filter_map(|slot| slot.process.as_ref())
            .filter(|p| !p.is_terminated() && matches_info(item, ty, p))
            .count() as u32
    }

    fn search_items(&mut self, search: &ItemSearch, script: &[u8]) -> Option<Vec<ObjId>> {
        self.world.search(search, script)
    }

    fn item_exists(&self, item: ObjId) -> bool {
        self.world.contains(item)
    }
}
