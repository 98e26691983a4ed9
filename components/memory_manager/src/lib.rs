//! Memory Manager - heaps, globals and stacks of the usecode machine
//!
//! This component provides:
//! - Bounded 16-bit id pools with FIFO reuse
//! - A handle-indexed arena used for both the string and the list heap
//! - Fixed-width element lists, including string-list semantics
//! - Bit- and byte-granular global storage
//! - Downward-growing per-process stacks
//! - Save and restore of all of the above

pub mod globals;
pub mod heap;
pub mod id_pool;
pub mod list;
pub mod stack;
pub mod usecode_heap;

// Re-export main types
pub use globals::{BitSet, ByteSet, GlobalStorage};
pub use heap::Heap;
pub use id_pool::IdPool;
pub use list::UcList;
pub use stack::UcStack;
pub use usecode_heap::{HeapStats, UsecodeHeap};
