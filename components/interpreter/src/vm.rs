//! The usecode machine
//!
//! Owns everything processes share: global storage, the string and list
//! heaps, the intrinsic table, the loaded usecode and the random number
//! generator. Processes themselves belong to the host.

use bytecode_system::UsecodeSource;
use core_types::{ByteReader, GameVariant, ProcId, UcError, UcResult};
use memory_manager::{BitSet, ByteSet, GlobalStorage, HeapStats, UsecodeHeap};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::MachineConfig;
use crate::intrinsics::IntrinsicTable;
use crate::process::UcProcess;

/// How a single run of a process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Suspended, waiting or ceded; can be run again later
    Yielded,
    /// Returned from its outermost function or excluded itself; carries
    /// the result register
    Terminated(u32),
    /// Killed by an error
    Faulted(UcError),
}

/// The usecode virtual machine
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use bytecode_system::UsecodeImage;
/// use interpreter::{MachineConfig, UcMachine};
///
/// let machine = UcMachine::new(MachineConfig::default(), Arc::new(UsecodeImage::new()));
/// assert_eq!(machine.usecode_stats().strings, 0);
/// assert_eq!(machine.globals().size(), 0x1000);
/// ```
pub struct UcMachine {
    config: MachineConfig,
    globals: Box<dyn GlobalStorage>,
    heap: UsecodeHeap,
    intrinsics: IntrinsicTable,
    usecode: Arc<dyn UsecodeSource>,
    rng: StdRng,
}

impl fmt::Debug for UcMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UcMachine")
            .field("config", &self.config)
            .field("globals", &self.globals)
            .field("heap", &self.heap.stats())
            .field("intrinsics", &self.intrinsics)
            .finish()
    }
}

fn new_globals(config: &MachineConfig) -> Box<dyn GlobalStorage> {
    match config.variant {
        GameVariant::Ultima8 => Box::new(BitSet::new(config.globals_size)),
        GameVariant::Remorse | GameVariant::Regret => Box::new(ByteSet::new(config.globals_size)),
    }
}

fn new_heap(config: &MachineConfig) -> UsecodeHeap {
    UsecodeHeap::new(config.string_pool.build(), config.list_pool.build())
}

impl UcMachine {
    /// Create a machine running `usecode` with the built-in intrinsics
    pub fn new(config: MachineConfig, usecode: Arc<dyn UsecodeSource>) -> Self {
        let mut machine = Self {
            globals: new_globals(&config),
            heap: new_heap(&config),
            intrinsics: IntrinsicTable::with_builtins(),
            usecode,
            rng: StdRng::seed_from_u64(config.rng_seed),
            config,
        };
        machine.preset_globals();
        info!(variant = ?machine.config.variant, globals = machine.config.globals_size, "usecode machine created");
        machine
    }

    /// Replace the intrinsic table
    pub fn with_intrinsics(mut self, intrinsics: IntrinsicTable) -> Self {
        self.intrinsics = intrinsics;
        self
    }

    fn preset_globals(&mut self) {
        if let Some(pos) = self.config.variant.avatar_global() {
            // the avatar is always object 1
            if let Err(err) = self.globals.set_entries(u32::from(pos), 2, 1) {
                debug!(%err, "globals too small for the avatar global");
            }
        }
    }

    /// Active configuration
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Game variant
    pub fn variant(&self) -> GameVariant {
        self.config.variant
    }

    /// Global storage
    pub fn globals(&self) -> &dyn GlobalStorage {
        self.globals.as_ref()
    }

    /// Mutable global storage
    pub fn globals_mut(&mut self) -> &mut dyn GlobalStorage {
        self.globals.as_mut()
    }

    /// String and list heaps
    pub fn heap(&self) -> &UsecodeHeap {
        &self.heap
    }

    /// Mutable string and list heaps
    pub fn heap_mut(&mut self) -> &mut UsecodeHeap {
        &mut self.heap
    }

    /// Intrinsic table
    pub fn intrinsics(&self) -> &IntrinsicTable {
        &self.intrinsics
    }

    /// Mutable intrinsic table
    pub fn intrinsics_mut(&mut self) -> &mut IntrinsicTable {
        &mut self.intrinsics
    }

    /// Random number generator shared by intrinsics
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Loaded usecode
    pub fn usecode(&self) -> &Arc<dyn UsecodeSource> {
        &self.usecode
    }

    /// A fresh, unloaded process sized by the configuration
    pub fn new_process(&self, pid: ProcId) -> UcProcess {
        UcProcess::new(pid, self.config.stack_size)
    }

    /// Finish a process: free everything it owns and mark it terminated
    pub fn terminate_process(&mut self, proc: &mut UcProcess) {
        proc.scope.release(&mut self.heap);
        proc.terminated = true;
        proc.terminate_deferred = false;
        debug!(pid = proc.pid, result = proc.result, "process terminated");
    }

    /// Zero the globals and drop every string and list
    pub fn reset(&mut self) {
        self.globals.set_size(self.config.globals_size);
        self.preset_globals();
        self.heap.reset();
        info!("usecode machine reset");
    }

    /// Live string and list counts
    pub fn usecode_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Append globals, strings and lists to `out`
    pub fn save(&self, out: &mut Vec<u8>) {
        self.globals.save(out);
        self.heap.save_strings(out);
        self.heap.save_lists(out);
    }

    /// Restore state written by [`save`](Self::save). Nothing changes
    /// unless every part decodes.
    pub fn load(&mut self, reader: &mut ByteReader<'_>) -> UcResult<()> {
        let mut globals = new_globals(&self.config);
        let mut heap = new_heap(&self.config);
        globals.load(reader)?;
        heap.load_strings(reader)?;
        heap.load_lists(reader)?;
        self.globals = globals;
        self.heap = heap;
        debug!(stats = ?self.heap.stats(), "usecode machine state loaded");
        Ok(())
    }
}
