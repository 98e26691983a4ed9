//! Usecode image - the set of loaded classes and its file format
//!
//! Layout (little-endian):
//!
//! ```text
//! "UCIM" version:u32 class_count:u32
//!   class_id:u16 event_count:u32 (event:u16 offset:u16)* code_len:u32 code
//! ```

use crate::chunk::UsecodeClass;
use core_types::{ByteReader, ByteWriter, ErrorKind, UcError, UcResult};
use std::collections::BTreeMap;

const MAGIC: &[u8; 4] = b"UCIM";
const VERSION: u32 = 1;

/// Where the interpreter gets class code from.
///
/// Returning `None` for an unknown class lets the interpreter fault the
/// process that asked for it.
pub trait UsecodeSource: Send + Sync {
    /// Code buffer of `class_id`
    fn class_code(&self, class_id: u16) -> Option<&[u8]>;

    /// Offset of event `event` in `class_id` (Crusader call convention)
    fn class_event(&self, class_id: u16, event: u16) -> Option<u16>;
}

/// An in-memory collection of usecode classes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsecodeImage {
    classes: BTreeMap<u16, UsecodeClass>,
}

impl UsecodeImage {
    /// Create an empty image
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a class
    pub fn insert(&mut self, class_id: u16, class: UsecodeClass) {
        self.classes.insert(class_id, class);
    }

    /// Look up a class
    pub fn class(&self, class_id: u16) -> Option<&UsecodeClass> {
        self.classes.get(&class_id)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// True when no class is loaded
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class ids in ascending order
    pub fn class_ids(&self) -> impl Iterator<Item = u16> + '_ {
        self.classes.keys().copied()
    }

    /// Serialize to the image file format
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.put_u32(VERSION);
        out.put_u32(self.classes.len() as u32);
        for (&id, class) in &self.classes {
            out.put_u16(id);
            let events: Vec<(u16, u16)> = class.events().collect();
            out.put_u32(events.len() as u32);
            for (event, offset) in events {
                out.put_u16(event);
                out.put_u16(offset);
            }
            out.put_u32(class.code().len() as u32);
            out.extend_from_slice(class.code());
        }
        out
    }

    /// Parse the image file format
    pub fn from_bytes(bytes: &[u8]) -> UcResult<Self> {
        let mut r = ByteReader::new(bytes);
        if r.read_bytes(4)? != MAGIC {
            return Err(UcError::new(ErrorKind::CorruptSave, "not a usecode image"));
        }
        let version = r.read_u32()?;
        if version != VERSION {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!("unsupported image version {version}"),
            ));
        }
        let count = r.read_u32()?;
        if count > 0x10000 {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!("image claims {count} classes"),
            ));
        }
        let mut image = Self::new();
        for _ in 0..count {
            let id = r.read_u16()?;
            if image.classes.contains_key(&id) {
                return Err(UcError::new(
                    ErrorKind::CorruptSave,
                    format!("class {id:04X} appears twice"),
                ));
            }
            let event_count = r.read_u32()?;
            let mut events = Vec::new();
            for _ in 0..event_count {
                events.push((r.read_u16()?, r.read_u16()?));
            }
            let len = r.read_u32()? as usize;
            let mut class = UsecodeClass::from_code(r.read_bytes(len)?.to_vec());
            for (event, offset) in events {
                class.set_event(event, offset);
            }
            image.classes.insert(id, class);
        }
        if r.remaining() != 0 {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!("{} trailing bytes after image", r.remaining()),
            ));
        }
        Ok(image)
    }
}

impl UsecodeSource for UsecodeImage {
    fn class_code(&self, class_id: u16) -> Option<&[u8]> {
        self.classes.get(&class_id).map(UsecodeClass::code)
    }

    fn class_event(&self, class_id: u16, event: u16) -> Option<u16> {
        self.classes.get(&class_id)?.event(event)
    }
}
