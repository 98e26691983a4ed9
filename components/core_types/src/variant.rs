//! Game variant selection.

use serde::{Deserialize, Serialize};

/// Which game's usecode conventions the machine follows.
///
/// The instruction set is shared, but a handful of details differ:
/// the granularity of global storage, the operand order of the shift
/// opcodes, whether call targets are event numbers, and the size of the
/// stack frames reserved by item-search loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    /// Ultima 8: bit-granular globals, direct call offsets
    #[default]
    Ultima8,
    /// Crusader: No Remorse
    Remorse,
    /// Crusader: No Regret
    Regret,
}

impl GameVariant {
    /// True for both Crusader games.
    pub fn is_crusader(self) -> bool {
        matches!(self, GameVariant::Remorse | GameVariant::Regret)
    }

    /// Global preset to the avatar's object number on start and reset.
    pub fn avatar_global(self) -> Option<u16> {
        match self {
            GameVariant::Ultima8 => None,
            GameVariant::Remorse => Some(0x3C),
            GameVariant::Regret => Some(0x1E),
        }
    }
}
