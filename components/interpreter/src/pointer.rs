//! Segmented pointer resolution
//!
//! Maps a raw 32-bit usecode pointer onto the store it addresses. Stack
//! pointers name their process by pid; the running process is resolved
//! through the machine's own borrow, every other one through the host.

use crate::host::ProcessHost;
use crate::process::UcProcess;
use crate::vm::UcMachine;
use core_types::{ErrorKind, ObjId, ProcId, UcError, UcPointer, UcResult};
use memory_manager::UcStack;
use tracing::warn;

fn missing_process(pid: ProcId) -> UcError {
    UcError::new(
        ErrorKind::MissingProcess,
        format!("trying to access stack of non-existent process (pid: {pid})"),
    )
}

fn stack_of<'a>(
    pid: ProcId,
    current: &'a UcProcess,
    host: &'a dyn ProcessHost,
) -> UcResult<&'a UcStack> {
    if pid == current.pid {
        return Ok(&current.stack);
    }
    host.usecode_process(pid)
        .map(|p| &p.stack)
        .ok_or_else(|| missing_process(pid))
}

fn stack_of_mut<'a>(
    pid: ProcId,
    current: &'a mut UcProcess,
    host: &'a mut dyn ProcessHost,
) -> UcResult<&'a mut UcStack> {
    if pid == current.pid {
        return Ok(&mut current.stack);
    }
    host.usecode_process_mut(pid)
        .map(|p| &mut p.stack)
        .ok_or_else(|| missing_process(pid))
}

fn global_width(size: u32) -> UcResult<u32> {
    if size == 1 || size == 2 {
        Ok(size)
    } else {
        Err(UcError::new(
            ErrorKind::InvalidOperand,
            format!("global pointers only address 1 or 2 units, not {size}"),
        ))
    }
}

fn handle_bytes(id: u16, size: u32, what: &str) -> UcResult<Vec<u8>> {
    if size != 2 {
        return Err(UcError::new(
            ErrorKind::InvalidOperand,
            format!("trying to read {size} bytes from a {what} pointer"),
        ));
    }
    Ok(id.to_le_bytes().to_vec())
}

impl UcMachine {
    /// Copy `size` bytes out of the store `raw` points into.
    pub fn dereference(
        &self,
        raw: u32,
        size: u32,
        current: &UcProcess,
        host: &dyn ProcessHost,
    ) -> UcResult<Vec<u8>> {
        match UcPointer::from_raw(raw)? {
            UcPointer::Stack { pid, offset } => {
                let stack = stack_of(pid, current, host)?;
                Ok(stack.access(u32::from(offset), size)?.to_vec())
            }
            UcPointer::Global(offset) => {
                let width = global_width(size)?;
                let value = self.globals().get_entries(u32::from(offset), width)?;
                Ok(value.to_le_bytes()[..width as usize].to_vec())
            }
            UcPointer::Object(id) => handle_bytes(id, size, "object"),
            UcPointer::String(id) => handle_bytes(id, size, "string"),
            UcPointer::List(id) => handle_bytes(id, size, "list"),
        }
    }

    /// Write `data` into the store `raw` points into.
    pub fn assign_pointer(
        &mut self,
        raw: u32,
        data: &[u8],
        current: &mut UcProcess,
        host: &mut dyn ProcessHost,
    ) -> UcResult<()> {
        match UcPointer::from_raw(raw)? {
            UcPointer::Stack { pid, offset } => {
                stack_of_mut(pid, current, host)?.assign(u32::from(offset), data)
            }
            UcPointer::Global(offset) => {
                let width = global_width(data.len() as u32)?;
                let mut value = [0u8; 4];
                value[..data.len()].copy_from_slice(data);
                self.globals_mut()
                    .set_entries(u32::from(offset), width, u32::from_le_bytes(value))
            }
            UcPointer::Object(_) | UcPointer::String(_) | UcPointer::List(_) => Err(UcError::new(
                ErrorKind::ReadOnlySegment,
                format!("trying to write through read-only pointer {raw:08X}"),
            )),
        }
    }

    /// Object number a pointer refers to, or 0 with a warning.
    ///
    /// Stack pointers yield the word stored there, global pointers a
    /// two-unit global, object and string pointers their own offset.
    pub fn ptr_to_object(&self, raw: u32, current: &UcProcess, host: &dyn ProcessHost) -> ObjId {
        let resolved = match UcPointer::from_raw(raw) {
            Ok(UcPointer::Stack { pid, offset }) => stack_of(pid, current, host)
                .and_then(|stack| stack.access2(u32::from(offset))),
            Ok(UcPointer::Object(id)) | Ok(UcPointer::String(id)) => Ok(id),
            Ok(UcPointer::Global(offset)) => self
                .globals()
                .get_entries(u32::from(offset), 2)
                .map(|v| v as u16),
            Ok(UcPointer::List(_)) => Err(UcError::new(
                ErrorKind::InvalidSegment,
                "list pointers do not name objects",
            )),
            Err(err) => Err(err),
        };
        resolved.unwrap_or_else(|err| {
            warn!("pointer {raw:08X} does not resolve to an object: {err}");
            0
        })
    }
}
