//! Usecode processes
//!
//! A process is one running usecode function plus everything it calls:
//! its own byte stack with the frames on it, the current code position
//! and the registers the instructions use. Processes are owned by the
//! host; the machine only borrows one while running it.

use crate::call_frame::CallFrame;
use crate::host::SpawnRequest;
use core_types::{CodeLocation, ObjId, ProcId, UcPointer, UcResult, NO_CLASS};
use memory_manager::{UcStack, UsecodeHeap};

/// What kind of heap entry a scoped handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A string
    String,
    /// A string list (frees its strings too)
    StringList,
    /// A plain list
    List,
}

impl HandleKind {
    /// Map the type operand of the param-pid-change opcode
    pub fn from_param_type(kind: u8) -> Option<Self> {
        match kind {
            1 => Some(HandleKind::String),
            2 => Some(HandleKind::StringList),
            3 => Some(HandleKind::List),
            _ => None,
        }
    }
}

/// Heap handles a process owns until it terminates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceScope {
    handles: Vec<(u16, HandleKind)>,
}

impl ResourceScope {
    /// Take ownership of `id`
    pub fn adopt(&mut self, id: u16, kind: HandleKind) {
        self.handles.push((id, kind));
    }

    /// Number of owned handles
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True when nothing is owned
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Free every owned handle, leaving the scope empty
    pub fn release(&mut self, heap: &mut UsecodeHeap) {
        for (id, kind) in self.handles.drain(..) {
            match kind {
                HandleKind::String => heap.free_string(id),
                HandleKind::StringList => heap.free_string_list(id),
                HandleKind::List => heap.free_list(id),
            }
        }
    }
}

/// A usecode process
#[derive(Debug, Clone)]
pub struct UcProcess {
    /// Process id, also its stack segment
    pub pid: ProcId,
    /// Item the process runs for
    pub item_num: ObjId,
    /// Process type, used for exclusivity
    pub ty: u16,
    /// Class of the running function
    pub class_id: u16,
    /// Offset of the next instruction
    pub ip: u16,
    /// Base pointer of the current frame
    pub bp: u16,
    /// The process stack
    pub stack: UcStack,
    /// Scratch register (intrinsic returns, spawn pids)
    pub temp32: u32,
    /// Result register
    pub result: u32,
    /// Handles freed on termination
    pub scope: ResourceScope,
    /// Waiting for another process
    pub suspended: bool,
    /// Terminate once the current run ends
    pub terminate_deferred: bool,
    /// Fully terminated
    pub terminated: bool,
}

impl UcProcess {
    /// A process with an empty stack that has not been loaded yet
    pub fn new(pid: ProcId, stack_size: u32) -> Self {
        Self {
            pid,
            item_num: 0,
            ty: 0,
            class_id: NO_CLASS,
            ip: NO_CLASS,
            bp: 0,
            stack: UcStack::new(stack_size),
            temp32: 0,
            result: 0,
            scope: ResourceScope::default(),
            suspended: false,
            terminate_deferred: false,
            terminated: false,
        }
    }

    /// Prepare the stack for `request` and enter its function.
    ///
    /// A non-empty `this_data` is copied onto the stack and the this
    /// pointer is redirected to that copy.
    pub fn load(&mut self, request: &SpawnRequest) -> UcResult<()> {
        self.bp = 0;
        self.class_id = NO_CLASS;
        self.ip = NO_CLASS;

        let mut this_ptr = request.this_ptr;
        if this_ptr != 0 && !request.this_data.is_empty() {
            self.stack.push(&request.this_data)?;
            this_ptr = UcPointer::stack(self.pid, self.stack.sp() as u16);
        }
        self.stack.push(&request.args)?;
        self.stack.push4(this_ptr)?;
        self.call(request.class_id, request.offset)
    }

    /// Save the current position and enter `class_id:offset`
    pub fn call(&mut self, class_id: u16, offset: u16) -> UcResult<()> {
        CallFrame::new(self.class_id, self.ip, self.bp).push_onto(&mut self.stack)?;
        self.class_id = class_id;
        self.ip = offset;
        self.bp = self.stack.sp() as u16;
        Ok(())
    }

    /// Leave the current function. Returns true when that was the
    /// outermost one.
    pub fn ret(&mut self) -> UcResult<bool> {
        self.stack.set_sp(u32::from(self.bp))?;
        let frame = CallFrame::pop_from(&mut self.stack)?;
        self.bp = frame.bp;
        self.ip = frame.ip;
        self.class_id = frame.class_id;
        Ok(frame.is_outermost())
    }

    /// Absolute stack offset of BP+`var`
    pub fn local(&self, var: i8) -> u32 {
        u32::from(self.bp.wrapping_add_signed(i16::from(var)))
    }

    /// Current code position
    pub fn location(&self) -> CodeLocation {
        CodeLocation::new(self.class_id, self.ip)
    }

    /// Terminated or about to be
    pub fn is_terminated(&self) -> bool {
        self.terminated || self.terminate_deferred
    }
}
