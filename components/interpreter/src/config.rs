//! Machine configuration
//!
//! Everything the machine needs at construction time. The variant drives
//! the handful of behaviours that differ between games; the rest sizes
//! the stores.

use core_types::GameVariant;
use memory_manager::IdPool;
use serde::{Deserialize, Serialize};

/// Bounds of one handle pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Lowest handle handed out
    pub begin: u16,
    /// Highest handle the pool may grow to
    pub max_end: u16,
    /// Handles available before the first expansion
    pub start_count: u16,
}

impl PoolConfig {
    /// Build the id pool described by this config
    pub fn build(&self) -> IdPool {
        IdPool::new(self.begin, self.max_end, self.start_count)
    }
}

/// Configuration of a [`UcMachine`](crate::UcMachine)
///
/// # Example
///
/// ```
/// use core_types::GameVariant;
/// use interpreter::MachineConfig;
///
/// let config = MachineConfig::default()
///     .with_variant(GameVariant::Remorse)
///     .with_rng_seed(7);
/// assert_eq!(config.globals_size, 0x1000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Game conventions
    pub variant: GameVariant,
    /// Global storage size in storage units (bits or bytes)
    pub globals_size: u32,
    /// String handle pool
    pub string_pool: PoolConfig,
    /// List handle pool
    pub list_pool: PoolConfig,
    /// Stack bytes given to each new process
    pub stack_size: u32,
    /// Seed of the intrinsic random number generator
    pub rng_seed: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            variant: GameVariant::Ultima8,
            globals_size: 0x1000,
            string_pool: PoolConfig {
                begin: 1,
                max_end: 65534,
                start_count: 256,
            },
            list_pool: PoolConfig {
                begin: 1,
                max_end: 65534,
                start_count: 128,
            },
            stack_size: 0x1000,
            rng_seed: 0,
        }
    }
}

impl MachineConfig {
    /// Select the game variant
    pub fn with_variant(mut self, variant: GameVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Set the global storage size
    pub fn with_globals_size(mut self, size: u32) -> Self {
        self.globals_size = size;
        self
    }

    /// Set the string pool bounds
    pub fn with_string_pool(mut self, pool: PoolConfig) -> Self {
        self.string_pool = pool;
        self
    }

    /// Set the list pool bounds
    pub fn with_list_pool(mut self, pool: PoolConfig) -> Self {
        self.list_pool = pool;
        self
    }

    /// Set the per-process stack size
    pub fn with_stack_size(mut self, size: u32) -> Self {
        self.stack_size = size;
        self
    }

    /// Seed the random number generator
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }
}
