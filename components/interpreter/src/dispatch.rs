//! Dispatch loop for usecode execution
//!
//! Decodes one instruction at a time from the running process's class and
//! applies it. The instruction pointer only moves forward when the
//! instruction succeeds; a failing instruction kills the process and
//! leaves `ip` on the offending opcode.

use bytecode_system::{CodeReader, Opcode, UsecodeSource};
use core_types::{ErrorKind, ObjId, UcError, UcPointer, UcResult};
use memory_manager::UcList;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

use crate::host::{ItemSearch, ProcessHost, SpawnRequest};
use crate::intrinsics::{ArgReader, IntrinsicContext};
use crate::process::{HandleKind, UcProcess};
use crate::vm::{ExecOutcome, UcMachine};

/// Longest loop script a search loop accepts
const MAX_LOOP_SCRIPT: u8 = 0x20;

/// What the run loop does after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Keep going unless the process got suspended
    Continue,
    /// Give up the time slice
    Cede,
    /// Keep going even when suspended, until the next cede
    GoUntilCede,
}

fn invalid(kind: ErrorKind, message: impl Into<String>) -> UcError {
    UcError::new(kind, message)
}

fn sp_offset(proc: &UcProcess, delta: i32) -> u32 {
    proc.stack.sp().wrapping_add_signed(delta)
}

fn pop_i16(proc: &mut UcProcess) -> UcResult<i16> {
    Ok(proc.stack.pop2()? as i16)
}

fn pop_i32(proc: &mut UcProcess) -> UcResult<i32> {
    Ok(proc.stack.pop4()? as i32)
}

/// Pops `a` then `b` and pushes `f(b, a)` as a word
fn binary16(proc: &mut UcProcess, f: impl FnOnce(i16, i16) -> i16) -> UcResult<()> {
    let a = pop_i16(proc)?;
    let b = pop_i16(proc)?;
    proc.stack.push2(f(b, a) as u16)
}

/// Pops `a` then `b` and pushes `f(b, a)` as a dword
fn binary32(proc: &mut UcProcess, f: impl FnOnce(i32, i32) -> i32) -> UcResult<()> {
    let a = pop_i32(proc)?;
    let b = pop_i32(proc)?;
    proc.stack.push4(f(b, a) as u32)
}

/// Word comparison of `b` against `a`, pushing a word flag
fn compare16(proc: &mut UcProcess, f: impl FnOnce(i16, i16) -> bool) -> UcResult<()> {
    let a = pop_i16(proc)?;
    let b = pop_i16(proc)?;
    proc.stack.push2(u16::from(f(b, a)))
}

/// Dword comparison of `b` against `a`, still pushing a word flag
fn compare32(proc: &mut UcProcess, f: impl FnOnce(i32, i32) -> bool) -> UcResult<()> {
    let a = pop_i32(proc)?;
    let b = pop_i32(proc)?;
    proc.stack.push2(u16::from(f(b, a)))
}

fn divide16(proc: &mut UcProcess, op: &str, f: impl FnOnce(i16, i16) -> i16) -> UcResult<()> {
    binary16(proc, |b, a| {
        if a == 0 {
            warn!("{op} by zero");
            0
        } else {
            f(b, a)
        }
    })
}

fn divide32(proc: &mut UcProcess, op: &str, f: impl FnOnce(i32, i32) -> i32) -> UcResult<()> {
    binary32(proc, |b, a| {
        if a == 0 {
            warn!("{op} by zero");
            0
        } else {
            f(b, a)
        }
    })
}

/// Pops shift operands in the variant's order: `(value, count)`
fn shift_operands(proc: &mut UcProcess, crusader: bool) -> UcResult<(i16, u16)> {
    if crusader {
        let count = proc.stack.pop2()?;
        let value = pop_i16(proc)?;
        Ok((value, count))
    } else {
        let value = pop_i16(proc)?;
        let count = proc.stack.pop2()?;
        Ok((value, count))
    }
}

impl UcMachine {
    /// Run `proc` until it yields, terminates or fails.
    ///
    /// The process must be checked out of `host`; every other process is
    /// reached through it.
    pub fn execute(&mut self, proc: &mut UcProcess, host: &mut dyn ProcessHost) -> ExecOutcome {
        let usecode = Arc::clone(self.usecode());
        debug!(
            tick = host.tick(),
            pid = proc.pid,
            item = proc.item_num,
            ty = proc.ty,
            "running process at {}",
            proc.location()
        );

        let mut go_until_cede = false;
        while !proc.is_terminated() {
            let location = proc.location();
            match self.step(proc, host, usecode.as_ref()) {
                Ok(Flow::Cede) => return ExecOutcome::Yielded,
                Ok(Flow::GoUntilCede) => go_until_cede = true,
                Ok(Flow::Continue) => {}
                Err(err) => {
                    let err = err.at(location);
                    error!(pid = proc.pid, item = proc.item_num, "process killed: {err}");
                    proc.terminate_deferred = true;
                    return ExecOutcome::Faulted(err);
                }
            }
            if proc.suspended && !go_until_cede {
                return ExecOutcome::Yielded;
            }
        }
        ExecOutcome::Terminated(proc.result)
    }

    fn step(
        &mut self,
        proc: &mut UcProcess,
        host: &mut dyn ProcessHost,
        usecode: &dyn UsecodeSource,
    ) -> UcResult<Flow> {
        let code = usecode.class_code(proc.class_id).ok_or_else(|| {
            invalid(
                ErrorKind::MissingClass,
                format!("class {:04X} has no code", proc.class_id),
            )
        })?;
        let mut reader = CodeReader::new(code, proc.ip);
        let op = Opcode::decode(&mut reader)?;
        trace!(
            "sp = {:02X}; {:04X}:{:04X}: {op}",
            proc.stack.stack_size(),
            proc.class_id,
            proc.ip
        );

        let mut next_ip = reader.position();
        let flow = self.exec_opcode(op, proc, host, usecode, &mut next_ip)?;
        proc.ip = next_ip;
        Ok(flow)
    }

    fn event_offset(&self, usecode: &dyn UsecodeSource, class_id: u16, offset: u16) -> UcResult<u16> {
        if !self.variant().is_crusader() {
            return Ok(offset);
        }
        usecode.class_event(class_id, offset).ok_or_else(|| {
            invalid(
                ErrorKind::MissingClass,
                format!("class {class_id:04X} has no event {offset:04X}"),
            )
        })
    }

    fn exec_opcode(
        &mut self,
        op: Opcode,
        proc: &mut UcProcess,
        host: &mut dyn ProcessHost,
        usecode: &dyn UsecodeSource,
        next_ip: &mut u16,
    ) -> UcResult<Flow> {
        match op {
            Opcode::PopByte(var) => {
                let value = proc.stack.pop2()?;
                proc.stack.assign1(proc.local(var), value as u8)?;
            }
            Opcode::Pop(var) => {
                let value = proc.stack.pop2()?;
                proc.stack.assign2(proc.local(var), value)?;
            }
            Opcode::PopDword(var) => {
                let value = proc.stack.pop4()?;
                proc.stack.assign4(proc.local(var), value)?;
            }
            Opcode::PopHuge { var, size } => {
                let bytes = proc.stack.pop(u32::from(size))?;
                proc.stack.assign(proc.local(var), &bytes)?;
            }
            Opcode::PopResult => {
                proc.result = proc.stack.pop4()?;
            }
            Opcode::AssignElement { var, size, slist } => {
                let index = proc.stack.pop2()?.wrapping_sub(1);
                let list_id = proc.stack.access2(proc.local(var))?;
                if slist && size != 2 {
                    return Err(invalid(
                        ErrorKind::InvalidOperand,
                        format!("string list elements are 2 bytes, not {size}"),
                    ));
                }
                let value = proc.stack.access(proc.stack.sp(), u32::from(size))?.to_vec();
                let list = self
                    .heap_mut()
                    .list_mut(list_id)
                    .ok_or_else(|| invalid(ErrorKind::InvalidHandle, format!("invalid list {list_id} in assign element")))?;
                list.assign(usize::from(index), &value);
                proc.stack.add_sp(i32::from(size))?;
            }

            Opcode::PushByte(value) => proc.stack.push2(i16::from(value) as u16)?,
            Opcode::Push(value) => proc.stack.push2(value)?,
            Opcode::PushDword(value) => proc.stack.push4(value)?,
            Opcode::PushString(text) => {
                let id = self.heap_mut().assign_string(text);
                proc.stack.push2(id)?;
            }
            Opcode::CreateList { size, count } => {
                let width = u32::from(size);
                let total = width * u32::from(count);
                let sp = proc.stack.sp();
                let mut list = UcList::new(usize::from(size));
                // the first element pushed sits deepest
                for i in (0..u32::from(count)).rev() {
                    list.append(proc.stack.access(sp + i * width, width)?);
                }
                proc.stack.add_sp(total as i32)?;
                let id = self.heap_mut().assign_list(list);
                proc.stack.push2(id)?;
            }

            Opcode::CallIntrinsic { arg_bytes, func } => {
                let args = proc
                    .stack
                    .access(proc.stack.sp(), u32::from(arg_bytes))?
                    .to_vec();
                let bound = self.intrinsics().get(func);
                match bound {
                    Some(intrinsic) => {
                        let value = {
                            let mut ctx = IntrinsicContext {
                                machine: &mut *self,
                                host: &mut *host,
                                process: &*proc,
                            };
                            intrinsic(&mut ctx, &mut ArgReader::new(&args))?
                        };
                        proc.temp32 = value;
                    }
                    None => {
                        proc.temp32 = 0;
                        if args.len() >= 4 {
                            let mut reader = ArgReader::new(&args);
                            let item = self.ptr_to_object(reader.ptr()?, proc, &*host);
                            warn!(pid = proc.pid, "unhandled intrinsic {func:04X} called (item {item}, {arg_bytes} bytes)");
                        } else {
                            warn!(pid = proc.pid, "unhandled intrinsic {func:04X} called ({arg_bytes} bytes)");
                        }
                    }
                }
            }
            Opcode::Call { class_id, offset } => {
                let offset = self.event_offset(usecode, class_id, offset)?;
                proc.ip = *next_ip;
                proc.call(class_id, offset)?;
                *next_ip = offset;
            }
            Opcode::PopTemp => proc.temp32 = u32::from(proc.stack.pop2()?),
            Opcode::PopTempDword => proc.temp32 = proc.stack.pop4()?,

            Opcode::Add => binary16(proc, i16::wrapping_add)?,
            Opcode::AddDword => binary32(proc, i32::wrapping_add)?,
            Opcode::Concat => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                if b == 0 {
                    return Err(invalid(ErrorKind::InvalidHandle, "trying to append to string 0"));
                }
                self.heap_mut().concat_strings(b, a)?;
                proc.stack.push2(b)?;
            }
            Opcode::AppendList => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                let heap = self.heap_mut();
                match (heap.list(b).is_some(), heap.list(a).is_some()) {
                    (true, true) => {
                        if a == b {
                            return Err(invalid(
                                ErrorKind::InvalidHandle,
                                format!("trying to append list {a} to itself"),
                            ));
                        }
                        heap.append_lists(b, a)?;
                        proc.stack.push2(b)?;
                    }
                    (true, false) => proc.stack.push2(b)?,
                    (false, true) => proc.stack.push2(a)?,
                    (false, false) => proc.stack.push2(0)?,
                }
            }
            Opcode::UnionStringList(size) => {
                if size != 2 {
                    return Err(invalid(
                        ErrorKind::InvalidOperand,
                        format!("unhandled operand {size} to union slist"),
                    ));
                }
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                self.heap_mut().union_string_lists(b, a)?;
                proc.stack.push2(b)?;
            }
            Opcode::SubtractStringList(size) => {
                if size != 2 {
                    return Err(invalid(
                        ErrorKind::InvalidOperand,
                        format!("unhandled operand {size} to subtract slist"),
                    ));
                }
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                self.heap_mut().subtract_string_lists(b, a)?;
                proc.stack.push2(b)?;
            }
            Opcode::SubtractList(_) => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                self.heap_mut().subtract_lists(b, a)?;
                proc.stack.push2(b)?;
            }
            Opcode::Sub => binary16(proc, i16::wrapping_sub)?,
            Opcode::SubDword => binary32(proc, i32::wrapping_sub)?,
            Opcode::Mul => binary16(proc, i16::wrapping_mul)?,
            Opcode::MulDword => binary32(proc, i32::wrapping_mul)?,
            Opcode::Div => divide16(proc, "division", i16::wrapping_div)?,
            Opcode::DivDword => divide32(proc, "division", i32::wrapping_div)?,
            Opcode::Mod => divide16(proc, "modulo", i16::wrapping_rem)?,
            Opcode::ModDword => divide32(proc, "modulo", i32::wrapping_rem)?,
            Opcode::Eq => compare16(proc, |b, a| b == a)?,
            Opcode::EqDword => compare32(proc, |b, a| b == a)?,
            Opcode::StringEq => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                let heap = self.heap_mut();
                let equal = heap.string_text(a) == heap.string_text(b);
                heap.free_string(a);
                heap.free_string(b);
                proc.stack.push2(u16::from(equal))?;
            }
            Opcode::Lt => compare16(proc, |b, a| b < a)?,
            Opcode::LtDword => compare32(proc, |b, a| b < a)?,
            Opcode::Le => compare16(proc, |b, a| b <= a)?,
            Opcode::LeDword => compare32(proc, |b, a| b <= a)?,
            Opcode::Gt => compare16(proc, |b, a| b > a)?,
            Opcode::GtDword => compare32(proc, |b, a| b > a)?,
            Opcode::Ge => compare16(proc, |b, a| b >= a)?,
            Opcode::GeDword => compare32(proc, |b, a| b >= a)?,
            Opcode::Not => {
                let value = proc.stack.pop2()?;
                proc.stack.push2(u16::from(value == 0))?;
            }
            Opcode::NotDword => {
                let value = proc.stack.pop4()?;
                proc.stack.push2(u16::from(value == 0))?;
            }
            Opcode::And => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                proc.stack.push2(u16::from(a != 0 && b != 0))?;
            }
            Opcode::AndDword => {
                let a = proc.stack.pop4()?;
                let b = proc.stack.pop4()?;
                proc.stack.push4(u32::from(a != 0 && b != 0))?;
            }
            Opcode::Or => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                proc.stack.push2(u16::from(a != 0 || b != 0))?;
            }
            Opcode::OrDword => {
                let a = proc.stack.pop4()?;
                let b = proc.stack.pop4()?;
                proc.stack.push4(u32::from(a != 0 || b != 0))?;
            }
            Opcode::Ne => compare16(proc, |b, a| b != a)?,
            Opcode::NeDword => compare32(proc, |b, a| b != a)?,
            Opcode::InList { size, slist } => {
                let list_id = proc.stack.pop2()?;
                self.heap().require_list(list_id, "in list")?;
                if slist {
                    if size != 2 {
                        return Err(invalid(
                            ErrorKind::InvalidOperand,
                            format!("unhandled operand {size} to in slist"),
                        ));
                    }
                    let needle = proc.stack.pop2()?;
                    let found = self.heap().string_in_list(list_id, needle);
                    proc.stack.push2(u16::from(found))?;
                    self.heap_mut().free_string_list(list_id);
                } else {
                    let needle = proc.stack.access(proc.stack.sp(), u32::from(size))?;
                    let found = self
                        .heap()
                        .list(list_id)
                        .is_some_and(|list| list.contains(needle));
                    proc.stack.add_sp(i32::from(size))?;
                    proc.stack.push2(u16::from(found))?;
                    self.heap_mut().free_list(list_id);
                }
            }
            Opcode::BitAnd => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                proc.stack.push2(a & b)?;
            }
            Opcode::BitOr => {
                let a = proc.stack.pop2()?;
                let b = proc.stack.pop2()?;
                proc.stack.push2(a | b)?;
            }
            Opcode::BitNot => {
                let value = proc.stack.pop2()?;
                proc.stack.push2(!value)?;
            }
            Opcode::Shl => {
                let (value, count) = shift_operands(proc, self.variant().is_crusader())?;
                let shifted = i32::from(value) << u32::from(count).min(31);
                proc.stack.push2(shifted as u16)?;
            }
            Opcode::Sar => {
                let (value, count) = shift_operands(proc, self.variant().is_crusader())?;
                proc.stack.push2((value >> count.min(15)) as u16)?;
            }

            Opcode::PushLocalByte(var) => {
                let value = proc.stack.access1(proc.local(var))? as i8;
                proc.stack.push2(i16::from(value) as u16)?;
            }
            Opcode::PushLocal(var) => {
                let value = proc.stack.access2(proc.local(var))?;
                proc.stack.push2(value)?;
            }
            Opcode::PushLocalDword(var) => {
                let value = proc.stack.access4(proc.local(var))?;
                proc.stack.push4(value)?;
            }
            Opcode::PushStringLocal(var) => {
                let id = proc.stack.access2(proc.local(var))?;
                let copy = self.heap_mut().duplicate_string(id);
                proc.stack.push2(copy)?;
            }
            Opcode::PushList { var, size } => {
                let id = proc.stack.access2(proc.local(var))?;
                let copy = self.heap_mut().copy_list(id, usize::from(size));
                proc.stack.push2(copy)?;
            }
            Opcode::PushStringList(var) => {
                let id = proc.stack.access2(proc.local(var))?;
                let copy = self.heap_mut().copy_string_list(id);
                proc.stack.push2(copy)?;
            }
            Opcode::PushElement { size, slist } => {
                let index = proc.stack.pop2()?.wrapping_sub(1);
                let list_id = proc.stack.pop2()?;
                let Some(list) = self.heap().list(list_id) else {
                    proc.stack.push0(u32::from(size))?;
                    return Ok(Flow::Continue);
                };
                if slist {
                    let id = list.get_u16(usize::from(index)).unwrap_or(0);
                    let copy = self.heap_mut().duplicate_string(id);
                    proc.stack.push2(copy)?;
                } else if let Some(element) = list.get(usize::from(index)) {
                    let mut element = element.to_vec();
                    element.resize(usize::from(size), 0);
                    proc.stack.push(&element)?;
                } else {
                    warn!(
                        pid = proc.pid,
                        "ignoring request to push element {index} from list of {}",
                        list.len()
                    );
                }
            }
            Opcode::PushHuge { var, size } => {
                let bytes = proc.stack.access(proc.local(var), u32::from(size))?.to_vec();
                proc.stack.push(&bytes)?;
            }

            Opcode::PushAddress(var) => {
                let ptr = UcPointer::stack(proc.pid, proc.local(var) as u16);
                proc.stack.push4(ptr)?;
            }
            Opcode::PushIndirect(size) => {
                let ptr = proc.stack.pop4()?;
                let data = self.dereference(ptr, u32::from(size), proc, &*host)?;
                proc.stack.push(&data)?;
            }
            Opcode::PopIndirect(size) => {
                let ptr = proc.stack.pop4()?;
                let data = proc.stack.access(proc.stack.sp(), u32::from(size))?.to_vec();
                self.assign_pointer(ptr, &data, proc, host)?;
                proc.stack.add_sp(i32::from(size))?;
            }
            Opcode::PushGlobal { pos, size } => {
                let value = self.globals().get_entries(u32::from(pos), u32::from(size))?;
                proc.stack.push2(value as u16)?;
            }
            Opcode::PopGlobal { pos, size } => {
                let value = u32::from(proc.stack.pop2()?);
                let n = u32::from(size);
                self.globals_mut().set_entries(u32::from(pos), n, value)?;
                let fits = if self.variant().is_crusader() {
                    n <= 2
                } else {
                    self.globals().fits(n, value)
                };
                if !fits {
                    warn!(pid = proc.pid, "value {value:04X} popped into global {pos:04X} of {size} units does not fit");
                }
            }

            Opcode::Ret => {
                if proc.ret()? {
                    proc.terminate_deferred = true;
                } else {
                    *next_ip = proc.ip;
                }
            }
            Opcode::JumpIfFalse(rel) => {
                if proc.stack.pop2()? == 0 {
                    *next_ip = next_ip.wrapping_add_signed(rel);
                }
            }
            Opcode::Jump(rel) => *next_ip = next_ip.wrapping_add_signed(rel),
            Opcode::Suspend => return Ok(Flow::Cede),
            Opcode::Implies => return self.implies(proc, host),
            Opcode::Spawn {
                arg_bytes,
                this_size,
                class_id,
                offset,
            } => {
                let this_ptr = proc.stack.pop4()?;
                let offset = self.event_offset(usecode, class_id, offset)?;
                let args = proc
                    .stack
                    .access(proc.stack.sp(), u32::from(arg_bytes))?
                    .to_vec();
                let this_data = if this_ptr != 0 && this_size > 0 {
                    self.dereference(this_ptr, u32::from(this_size), proc, &*host)?
                } else {
                    Vec::new()
                };
                let request = SpawnRequest {
                    class_id,
                    offset,
                    this_ptr,
                    this_data,
                    args,
                };
                proc.temp32 = u32::from(host.spawn_exec(self, request));
                debug!(pid = proc.pid, child = proc.temp32, "spawned {class_id:04X}:{offset:04X}");
            }
            Opcode::SpawnInline {
                class_id,
                offset,
                delta,
                this_size,
                ..
            } => {
                let this_ptr = if this_size > 0 {
                    proc.stack.access4(proc.local(6))?
                } else {
                    0
                };
                let this_data = if this_ptr != 0 {
                    self.dereference(this_ptr, u32::from(this_size), proc, &*host)?
                } else {
                    Vec::new()
                };
                let request = SpawnRequest {
                    class_id,
                    offset: offset.wrapping_add(delta),
                    this_ptr,
                    this_data,
                    args: Vec::new(),
                };
                let pid = host.spawn_exec(self, request);
                proc.stack.push2(pid)?;
            }
            Opcode::PushPid => proc.stack.push2(proc.pid)?,
            Opcode::InitLocals(size) => {
                let size = u32::from(size);
                // keep the stack word aligned
                let size = size + (size & 1);
                if size > 0 {
                    proc.stack.push0(size)?;
                }
            }
            Opcode::LineNumber(line) => debug!(pid = proc.pid, line, "line number"),
            Opcode::SymbolInfo { line, name } => {
                let name: String = name
                    .iter()
                    .take_while(|&&b| b != 0)
                    .map(|&b| char::from(b))
                    .collect();
                debug!(pid = proc.pid, line, "line number in {name}");
            }
            Opcode::PushTempByte => proc.stack.push2(u16::from(proc.temp32 as u8))?,
            Opcode::PushTemp => proc.stack.push2(proc.temp32 as u16)?,
            Opcode::PushTempDword => proc.stack.push4(proc.temp32)?,
            Opcode::WordToDword => {
                let value = pop_i16(proc)?;
                proc.stack.push4(i32::from(value) as u32)?;
            }
            Opcode::DwordToWord => {
                let value = proc.stack.pop4()?;
                proc.stack.push2(value as u16)?;
            }

            Opcode::FreeStringLocal(var) => {
                let id = proc.stack.access2(proc.local(var))?;
                self.heap_mut().free_string(id);
            }
            Opcode::FreeStringListLocal(var) => {
                let id = proc.stack.access2(proc.local(var))?;
                self.heap_mut().free_string_list(id);
            }
            Opcode::FreeListLocal(var) => {
                let id = proc.stack.access2(proc.local(var))?;
                self.heap_mut().free_list(id);
            }
            Opcode::FreeStringAtSp(off) => {
                let id = proc.stack.access2(sp_offset(proc, i32::from(off)))?;
                self.heap_mut().free_string(id);
            }
            Opcode::FreeListAtSp(off) => {
                let id = proc.stack.access2(sp_offset(proc, i32::from(off)))?;
                self.heap_mut().free_list(id);
            }
            Opcode::FreeStringListAtSp(off) => {
                let id = proc.stack.access2(sp_offset(proc, i32::from(off)))?;
                self.heap_mut().free_string_list(id);
            }
            Opcode::StringLocalToPtr(var) => {
                let id = proc.stack.access2(proc.local(var))?;
                proc.stack.push4(UcPointer::string(id))?;
            }
            Opcode::StringToPtr => {
                let id = proc.stack.pop2()?;
                proc.stack.push4(UcPointer::string(id))?;
            }
            Opcode::ParamPidChange { var, kind } => self.param_pid_change(proc, var, kind)?,
            Opcode::PushResult => proc.stack.push4(proc.result)?,
            Opcode::MoveSp(delta) => proc.stack.add_sp(-i32::from(delta))?,
            Opcode::PushSpAddress(delta) => {
                let offset = sp_offset(proc, -i32::from(delta));
                proc.stack.push4(UcPointer::stack(proc.pid, offset as u16))?;
            }

            Opcode::LoopSearch {
                var,
                script_size,
                search_type,
            } => {
                self.loop_search(proc, host, var, script_size, search_type)?;
                self.loop_next(proc, host)?;
            }
            Opcode::LoopNext => self.loop_next(proc, host)?,
            Opcode::LoopScript(byte) => proc.stack.push1(byte)?,
            Opcode::ForEachList { var, size, jump } => {
                self.for_each(proc, var, size, jump, false, next_ip)?
            }
            Opcode::ForEachStringList { var, size, jump } => {
                self.for_each(proc, var, size, jump, true, next_ip)?
            }

            Opcode::SetInfo => {
                proc.item_num = proc.stack.pop2()?;
                proc.ty = proc.stack.pop2()?;
                trace!(pid = proc.pid, item = proc.item_num, ty = proc.ty, "set info");
            }
            Opcode::ProcessExclude => {
                let count = host.count_processes(proc.item_num, proc.ty) + 1;
                if count > 1 {
                    debug!(pid = proc.pid, item = proc.item_num, ty = proc.ty, "excluded by a running process");
                    proc.terminate_deferred = true;
                }
            }
            Opcode::PushGlobalAddress(pos) => proc.stack.push4(UcPointer::global(pos))?,
            Opcode::EndOfFunction => {
                return Err(invalid(ErrorKind::EndOfFunction, "end of function opcode reached"));
            }
        }
        Ok(Flow::Continue)
    }

    /// `b` waits for `a`; `a` stays on the stack
    fn implies(&mut self, proc: &mut UcProcess, host: &mut dyn ProcessHost) -> UcResult<Flow> {
        let a = proc.stack.pop2()?;
        let b = proc.stack.pop2()?;
        proc.stack.push2(a)?;

        let current = proc.pid;
        let exists = |pid: u16| pid == current || host.process_exists(pid);
        let target_exists = exists(a);
        let waiter_exists = exists(b);
        if !(target_exists && waiter_exists) {
            warn!(pid = proc.pid, "non-existent process in implies ({a}, {b})");
            if (a != 0 && !target_exists) || (b != 0 && !waiter_exists) {
                return Err(invalid(
                    ErrorKind::MissingProcess,
                    format!("implies on missing process ({a}, {b})"),
                ));
            }
            return Ok(Flow::Continue);
        }

        if b == proc.pid {
            proc.suspended = true;
        } else {
            host.suspend(b);
        }
        host.register_waiter(a, b);
        Ok(Flow::GoUntilCede)
    }

    fn param_pid_change(&mut self, proc: &mut UcProcess, var: i8, kind: u8) -> UcResult<()> {
        let offset = proc.local(var);
        let id = proc.stack.access2(offset)?;
        let handle = HandleKind::from_param_type(kind).ok_or_else(|| {
            invalid(
                ErrorKind::InvalidOperand,
                format!("invalid param pid change type ({kind})"),
            )
        })?;
        let heap = self.heap_mut();
        let copy = match handle {
            HandleKind::String => heap.duplicate_string(id),
            HandleKind::StringList if heap.list(id).is_some() => heap.copy_string_list(id),
            HandleKind::List => match heap.list(id).map(UcList::element_size) {
                Some(size) => heap.copy_list(id, size),
                None => {
                    warn!(pid = proc.pid, "invalid source list {id} passed to list copy");
                    0
                }
            },
            HandleKind::StringList => {
                warn!(pid = proc.pid, "invalid source list {id} passed to slist copy");
                0
            }
        };
        proc.stack.assign2(offset, copy)?;
        proc.scope.adopt(copy, handle);
        Ok(())
    }

    fn loop_search(
        &mut self,
        proc: &mut UcProcess,
        host: &mut dyn ProcessHost,
        var: i8,
        script_size: u8,
        search_type: u8,
    ) -> UcResult<()> {
        let a = proc.stack.pop2()?;
        let b = proc.stack.pop2()?;
        if script_size > MAX_LOOP_SCRIPT {
            return Err(invalid(
                ErrorKind::InvalidOperand,
                format!("loop script of {script_size} bytes is too long"),
            ));
        }
        let script = proc.stack.pop(u32::from(script_size))?;

        let crusader = self.variant().is_crusader();
        let (search, stack_size): (ItemSearch, u32) = match search_type {
            2 | 3 => (
                ItemSearch::Area {
                    origin: a,
                    range: if crusader { b.wrapping_mul(2) } else { b },
                    recurse: search_type == 3,
                },
                if crusader { 0x3A } else { 0x34 },
            ),
            4 | 5 => {
                if a != 0xFFFF {
                    warn!(pid = proc.pid, "non-FFFF value {a:04X} passed to container search");
                }
                let base = if crusader { 0x2A } else { 0x28 };
                (
                    ItemSearch::Container {
                        container: b,
                        recurse: search_type == 5,
                    },
                    if search_type == 5 { base + 2 } else { base },
                )
            }
            6 => {
                let above = a != 0xFFFF;
                let below = b != 0xFFFF;
                (
                    ItemSearch::Surface {
                        item: if below { b } else { a },
                        above,
                        below,
                    },
                    if crusader { 0x43 } else { 0x3D },
                )
            }
            other => {
                return Err(invalid(
                    ErrorKind::InvalidOperand,
                    format!("unhandled search type {other}"),
                ));
            }
        };

        let items: Vec<ObjId> = host.search_items(&search, &script).unwrap_or_else(|| {
            warn!(pid = proc.pid, ?search, "search reference does not exist");
            Vec::new()
        });
        let mut list = UcList::new(2);
        for item in &items {
            list.append_u16(*item);
        }

        proc.stack.push0(stack_size - u32::from(script_size) - 8)?;
        proc.stack.push(&script)?;
        proc.stack.push2(u16::from(script_size))?;
        proc.stack.push2(i16::from(var) as u16)?;
        proc.stack.push2(0)?;
        let list_id = self.heap_mut().assign_list(list);
        proc.stack.push2(list_id)?;
        trace!(pid = proc.pid, found = items.len(), "item search");
        Ok(())
    }

    fn loop_next(&mut self, proc: &mut UcProcess, host: &mut dyn ProcessHost) -> UcResult<()> {
        let sp = proc.stack.sp();
        let list_id = proc.stack.access2(sp)?;
        let mut index = proc.stack.access2(sp + 2)?;
        let var = proc.stack.access2(sp + 4)? as i16;
        let target = u32::from(proc.bp.wrapping_add_signed(var));
        let list = self.heap().require_list(list_id, "loop next")?;

        let mut valid = false;
        while usize::from(index) < list.len() {
            let item = list.get_u16(usize::from(index)).unwrap_or(0);
            proc.stack.assign2(target, item)?;
            if host.item_exists(item) {
                valid = true;
                break;
            }
            index += 1;
        }

        if valid {
            proc.stack.push2(1)?;
            proc.stack.assign2(sp + 2, index + 1)?;
        } else {
            proc.stack.push2(0)?;
            self.heap_mut().free_list(list_id);
        }
        Ok(())
    }

    fn for_each(
        &mut self,
        proc: &mut UcProcess,
        var: i8,
        size: u8,
        jump: i16,
        slist: bool,
        next_ip: &mut u16,
    ) -> UcResult<()> {
        if slist && size != 2 {
            return Err(invalid(
                ErrorKind::InvalidOperand,
                format!("string list foreach with element size {size}"),
            ));
        }
        let sp = proc.stack.sp();
        let index = proc.stack.access2(sp)?;
        let list_id = proc.stack.access2(sp + 2)?;
        let index = if index == 0xFFFF { 0 } else { index.wrapping_add(1) };
        let list = self.heap().require_list(list_id, "foreach")?;

        match list.get(usize::from(index)) {
            Some(element) => {
                let width = usize::from(size).min(element.len());
                let element = element[..width].to_vec();
                proc.stack.assign2(sp, index)?;
                proc.stack.assign(proc.local(var), &element)?;
            }
            None => {
                if slist {
                    self.heap_mut().free_string_list(list_id);
                } else {
                    self.heap_mut().free_list(list_id);
                }
                proc.stack.add_sp(4)?;
                *next_ip = next_ip.wrapping_add_signed(jump);
            }
        }
        Ok(())
    }
}
