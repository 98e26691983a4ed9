//! Code location type for error reporting and tracing.

use std::fmt;

/// A position in usecode: class id plus byte offset into the class code.
///
/// # Examples
///
/// ```
/// use core_types::CodeLocation;
///
/// let loc = CodeLocation::new(0x07c, 0x1a2);
/// assert_eq!(loc.to_string(), "007C:01A2");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeLocation {
    /// Class whose code is executing
    pub class_id: u16,
    /// Offset of the instruction within the class code
    pub offset: u16,
}

impl CodeLocation {
    /// Create a location.
    pub fn new(class_id: u16, offset: u16) -> Self {
        Self { class_id, offset }
    }
}

impl fmt::Display for CodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{:04X}", self.class_id, self.offset)
    }
}
