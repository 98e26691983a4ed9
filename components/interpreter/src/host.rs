//! The process execution contract
//!
//! The machine runs one process at a time and calls back into whoever
//! owns the processes for everything that involves another process or
//! the game world. The process being run is checked out of the host for
//! the duration of the run, so lookups by its own pid go through the
//! machine, never the host.

use crate::process::UcProcess;
use crate::vm::UcMachine;
use core_types::{ObjId, ProcId};
use tracing::warn;

/// Everything needed to start a usecode function in a new process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnRequest {
    /// Class of the function
    pub class_id: u16,
    /// Entry offset in that class
    pub offset: u16,
    /// This pointer as seen by the spawner
    pub this_ptr: u32,
    /// Dereferenced this object, copied onto the new stack when non-empty
    pub this_data: Vec<u8>,
    /// Raw argument block
    pub args: Vec<u8>,
}

/// Item search requested by a search loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSearch {
    /// Items within `range` of `origin`
    Area {
        /// Item at the centre of the search
        origin: ObjId,
        /// Search radius in world units
        range: u16,
        /// Descend into containers
        recurse: bool,
    },
    /// Contents of a container
    Container {
        /// The container searched
        container: ObjId,
        /// Descend into nested containers
        recurse: bool,
    },
    /// Items on top of and/or below an item
    Surface {
        /// Reference item
        item: ObjId,
        /// Include items above
        above: bool,
        /// Include items below
        below: bool,
    },
}

/// Scheduler side of the machine.
///
/// Implemented by the kernel that owns the processes. All calls happen
/// synchronously on the interpreter's thread.
pub trait ProcessHost {
    /// Monotonic tick counter
    fn tick(&self) -> u32;

    /// Whether `pid` names a live process, including checked-out ones
    fn process_exists(&self, pid: ProcId) -> bool;

    /// Borrow a process that is not currently running
    fn usecode_process(&self, pid: ProcId) -> Option<&UcProcess>;

    /// Mutably borrow a process that is not currently running
    fn usecode_process_mut(&mut self, pid: ProcId) -> Option<&mut UcProcess>;

    /// Create a process for `request`, run it once right away and return
    /// its pid. Returns 0 when no process could be created.
    fn spawn_exec(&mut self, machine: &mut UcMachine, request: SpawnRequest) -> ProcId;

    /// Make `waiter` wake up when `target` terminates. False when
    /// `target` does not exist. A `target` that already finished but is
    /// still reported by `process_exists` wakes `waiter` at once.
    fn register_waiter(&mut self, target: ProcId, waiter: ProcId) -> bool;

    /// Mark `pid` suspended. False when it does not exist.
    fn suspend(&mut self, pid: ProcId) -> bool;

    /// Live processes other than the running one matching `item` and
    /// `ty`. Item 0 and type 6 match anything.
    fn count_processes(&self, item: ObjId, ty: u16) -> u32;

    /// Run an item search. `None` means the reference item or container
    /// does not exist.
    fn search_items(&mut self, search: &ItemSearch, script: &[u8]) -> Option<Vec<ObjId>>;

    /// Whether `item` exists in the world
    fn item_exists(&self, item: ObjId) -> bool;
}

/// Whether `candidate` matches an exclusivity query for `(item, ty)`
pub fn matches_info(item: ObjId, ty: u16, candidate: &UcProcess) -> bool {
    (item == 0 || item == candidate.item_num) && (ty == 6 || ty == candidate.ty)
}

/// A host with no other processes and an empty world.
///
/// Enough to run self-contained functions; spawning always fails.
#[derive(Debug, Clone, Default)]
pub struct NullHost {
    /// Value reported by [`ProcessHost::tick`]
    pub tick: u32,
}

impl ProcessHost for NullHost {
    fn tick(&self) -> u32 {
        self.tick
    }

    fn process_exists(&self, _pid: ProcId) -> bool {
        false
    }

    fn usecode_process(&self, _pid: ProcId) -> Option<&UcProcess> {
        None
    }

    fn usecode_process_mut(&mut self, _pid: ProcId) -> Option<&mut UcProcess> {
        None
    }

    fn spawn_exec(&mut self, _machine: &mut UcMachine, request: SpawnRequest) -> ProcId {
        warn!(
            "cannot spawn {:04X}:{:04X} without a scheduler",
            request.class_id, request.offset
        );
        0
    }

    fn register_waiter(&mut self, _target: ProcId, _waiter: ProcId) -> bool {
        false
    }

    fn suspend(&mut self, _pid: ProcId) -> bool {
        false
    }

    fn count_processes(&self, _item: ObjId, _ty: u16) -> u32 {
        0
    }

    fn search_items(&mut self, _search: &ItemSearch, _script: &[u8]) -> Option<Vec<ObjId>> {
        None
    }

    fn item_exists(&self, _item: ObjId) -> bool {
        false
    }
}
