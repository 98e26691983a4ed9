//! Loop scripts
//!
//! Item search loops carry a small postfix program that every candidate
//! item must satisfy. Values are 16-bit words on a scratch stack; the
//! script ends with [`END`], which pops the verdict.

use crate::world::WorldItem;
use core_types::UcResult;
use memory_manager::UcStack;
use tracing::warn;

/// Push 0
pub const FALSE: u8 = 0x00;
/// Push 1
pub const TRUE: u8 = 0x01;
/// Pop the verdict and stop
pub const END: u8 = b'$';
/// Push the following little-endian word
pub const INT: u8 = b'%';
/// Logical and of two values
pub const AND: u8 = b'&';
/// Logical or of two values
pub const OR: u8 = b'+';
/// Logical not
pub const NOT: u8 = b'!';
/// Push the item's status flags
pub const STATUS: u8 = b'?';
/// Push the item's quality
pub const QUALITY: u8 = b'*';
/// Push the item's npc number
pub const NPC_NUM: u8 = b'#';
/// Compare for equality
pub const EQUAL: u8 = b'=';
/// Second value greater than the top
pub const GREATER: u8 = b'>';
/// Second value less than the top
pub const LESS: u8 = b'<';
/// Second value greater than or equal to the top
pub const GEQUAL: u8 = b']';
/// Second value less than or equal to the top
pub const LEQUAL: u8 = b'[';
/// Push the item's family
pub const FAMILY: u8 = b':';
/// Push the item's shape
pub const SHAPE: u8 = b'@';
/// Push the item's frame
pub const FRAME: u8 = b'`';

const SCRATCH_SIZE: u32 = 0x40;

fn word(script: &[u8], at: usize) -> u16 {
    let lo = script.get(at).copied().unwrap_or(0);
    let hi = script.get(at + 1).copied().unwrap_or(0);
    u16::from_le_bytes([lo, hi])
}

fn flag(value: bool) -> u16 {
    u16::from(value)
}

/// Evaluate `script` against `item`.
///
/// An empty verdict stack defaults to true. A script without [`END`]
/// matches nothing. `A`..`Z` match the shape against the next 1..26
/// words, `a`..`z` the frame.
pub fn matches(item: &WorldItem, script: &[u8]) -> bool {
    match evaluate(item, script) {
        Ok(Some(verdict)) => verdict,
        Ok(None) => {
            warn!("loop script without end token");
            false
        }
        Err(err) => {
            warn!("loop script failed: {err}");
            false
        }
    }
}

fn evaluate(item: &WorldItem, script: &[u8]) -> UcResult<Option<bool>> {
    let mut stack = UcStack::new(SCRATCH_SIZE);
    stack.push2(1)?;

    let mut i = 0;
    while i < script.len() {
        match script[i] {
            FALSE => stack.push2(0)?,
            TRUE => stack.push2(1)?,
            END => return Ok(Some(stack.pop2()? != 0)),
            INT => {
                stack.push2(word(script, i + 1))?;
                i += 2;
            }
            AND => {
                let a = stack.pop2()?;
                let b = stack.pop2()?;
                stack.push2(flag(a != 0 && b != 0))?;
            }
            OR => {
                let a = stack.pop2()?;
                let b = stack.pop2()?;
                stack.push2(flag(a != 0 || b != 0))?;
            }
            NOT => {
                let a = stack.pop2()?;
                stack.push2(flag(a == 0))?;
            }
            STATUS => stack.push2(item.flags)?,
            QUALITY => stack.push2(item.quality)?,
            NPC_NUM => stack.push2(item.npc_num)?,
            op @ (EQUAL | GREATER | LESS | GEQUAL | LEQUAL) => {
                let a = stack.pop2()?;
                let b = stack.pop2()?;
                let result = match op {
                    EQUAL => b == a,
                    GREATER => b > a,
                    LESS => b < a,
                    GEQUAL => b >= a,
                    _ => b <= a,
                };
                stack.push2(flag(result))?;
            }
            FAMILY => stack.push2(item.family)?,
            SHAPE => stack.push2(item.shape)?,
            FRAME => stack.push2(item.frame)?,
            op @ (b'A'..=b'Z' | b'a'..=b'z') => {
                let (count, value) = if op.is_ascii_uppercase() {
                    (usize::from(op - b'@'), item.shape)
                } else {
                    (usize::from(op - b'`'), item.frame)
                };
                let hit = (0..count).any(|j| word(script, i + 1 + 2 * j) == value);
                i += 2 * count;
                stack.push2(flag(hit))?;
            }
            other => warn!("unknown loop script token {other:02X}"),
        }
        i += 1;
    }
    Ok(None)
}
