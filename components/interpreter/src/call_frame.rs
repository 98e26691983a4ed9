//! Call frame for the usecode call stack
//!
//! Frames live on the process stack itself: a call pushes the caller's
//! class, instruction pointer and base pointer, in that order, and the
//! callee's BP points at the saved BP. Arguments start at BP+06.

use core_types::{UcResult, NO_CLASS};
use memory_manager::UcStack;

/// Saved caller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallFrame {
    /// Class to return to (BP+04)
    pub class_id: u16,
    /// Offset to return to (BP+02)
    pub ip: u16,
    /// Caller's base pointer (BP+00)
    pub bp: u16,
}

impl CallFrame {
    /// Bytes a frame occupies on the stack
    pub const SIZE: u32 = 6;

    /// Create a new call frame
    pub fn new(class_id: u16, ip: u16, bp: u16) -> Self {
        Self { class_id, ip, bp }
    }

    /// The frame below a process's outermost function
    pub fn outermost() -> Self {
        Self::new(NO_CLASS, NO_CLASS, 0)
    }

    /// Whether returning to this frame leaves usecode entirely
    pub fn is_outermost(&self) -> bool {
        self.class_id == NO_CLASS && self.ip == NO_CLASS
    }

    /// Push the frame
    pub fn push_onto(&self, stack: &mut UcStack) -> UcResult<()> {
        stack.push2(self.class_id)?;
        stack.push2(self.ip)?;
        stack.push2(self.bp)
    }

    /// Pop a frame
    pub fn pop_from(stack: &mut UcStack) -> UcResult<Self> {
        let bp = stack.pop2()?;
        let ip = stack.pop2()?;
        let class_id = stack.pop2()?;
        Ok(Self { class_id, ip, bp })
    }
}
