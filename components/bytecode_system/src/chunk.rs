//! Usecode class - one class's code buffer and event table
//!
//! Classes are built by emitting opcodes in order; every emit returns the
//! offset the instruction starts at so jumps can be patched once their
//! target is known.

use crate::opcode::Opcode;
use crate::reader::CodeReader;
use core_types::{ErrorKind, UcError, UcResult};
use std::collections::BTreeMap;

/// Compiled code of a single usecode class
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsecodeClass {
    code: Vec<u8>,
    events: BTreeMap<u16, u16>,
}

impl UsecodeClass {
    /// Create an empty class
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing code buffer
    pub fn from_code(code: Vec<u8>) -> Self {
        Self {
            code,
            events: BTreeMap::new(),
        }
    }

    /// Raw code bytes
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// Current end of the code, where the next emit lands
    pub fn offset(&self) -> u16 {
        self.code.len() as u16
    }

    /// Append an instruction and return its start offset
    pub fn emit(&mut self, opcode: Opcode) -> u16 {
        let start = self.offset();
        opcode.encode(&mut self.code);
        start
    }

    /// Append raw bytes (for deliberately malformed test code)
    pub fn emit_raw(&mut self, bytes: &[u8]) -> u16 {
        let start = self.offset();
        self.code.extend_from_slice(bytes);
        start
    }

    /// Rewrite the displacement of the jump emitted at `at` so that it
    /// lands on `target`.
    pub fn patch_jump(&mut self, at: u16, target: u16) -> UcResult<()> {
        let mut reader = CodeReader::new(&self.code, at);
        let opcode = Opcode::decode(&mut reader)?;
        if !opcode.has_jump() {
            return Err(UcError::new(
                ErrorKind::InvalidOperand,
                format!("no jump at {at:04X}: {opcode}"),
            ));
        }
        let end = reader.position();
        let rel = target.wrapping_sub(end) as i16;
        let slot = usize::from(end) - 2;
        self.code[slot..slot + 2].copy_from_slice(&rel.to_le_bytes());
        Ok(())
    }

    /// Bind event number `event` to `offset`
    pub fn set_event(&mut self, event: u16, offset: u16) {
        self.events.insert(event, offset);
    }

    /// Offset bound to `event`
    pub fn event(&self, event: u16) -> Option<u16> {
        self.events.get(&event).copied()
    }

    /// All event bindings in event order
    pub fn events(&self) -> impl Iterator<Item = (u16, u16)> + '_ {
        self.events.iter().map(|(&e, &o)| (e, o))
    }

    /// Disassemble the whole class, one `offset: mnemonic` line per
    /// instruction. Stops at the first undecodable byte.
    pub fn disassemble(&self) -> Vec<String> {
        let mut reader = CodeReader::new(&self.code, 0);
        let mut lines = Vec::new();
        while !reader.at_end() {
            let at = reader.position();
            match Opcode::decode(&mut reader) {
                Ok(op) => lines.push(format!("{at:04X}: {op}")),
                Err(err) => {
                    lines.push(format!("{at:04X}: <{err}>"));
                    break;
                }
            }
        }
        lines
    }
}
