//! String and list heaps shared by every usecode process.

use crate::heap::Heap;
use crate::id_pool::IdPool;
use crate::list::UcList;
use core_types::{ByteReader, ByteWriter, ErrorKind, UcError, UcResult};
use tracing::trace;

/// Live entry counts, reported by the machine's stats query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    /// Live strings
    pub strings: usize,
    /// Live lists
    pub lists: usize,
}

/// The string heap and the list heap, each with its own id pool.
#[derive(Debug, Clone)]
pub struct UsecodeHeap {
    strings: Heap<String>,
    lists: Heap<UcList>,
}

impl UsecodeHeap {
    /// Build heaps over the given pools.
    pub fn new(string_ids: IdPool, list_ids: IdPool) -> Self {
        Self {
            strings: Heap::new(string_ids),
            lists: Heap::new(list_ids),
        }
    }

    /// Borrow the string heap.
    pub fn strings(&self) -> &Heap<String> {
        &self.strings
    }

    /// Mutably borrow the string heap.
    pub fn strings_mut(&mut self) -> &mut Heap<String> {
        &mut self.strings
    }

    /// Borrow the list heap.
    pub fn lists(&self) -> &Heap<UcList> {
        &self.lists
    }

    // --- strings ---

    /// Store `text` under a new handle (0 when the pool is exhausted).
    pub fn assign_string(&mut self, text: impl Into<String>) -> u16 {
        self.strings.assign(text.into())
    }

    /// Text behind `id`, if live.
    pub fn string(&self, id: u16) -> Option<&str> {
        self.strings.get(id).map(String::as_str)
    }

    /// Text behind `id`, empty when the handle is not live.
    pub fn string_text(&self, id: u16) -> &str {
        self.strings.text(id)
    }

    /// Copy `id` under a new handle.
    pub fn duplicate_string(&mut self, id: u16) -> u16 {
        self.strings.duplicate(id)
    }

    /// Release a string. Unknown handles are ignored.
    pub fn free_string(&mut self, id: u16) {
        if self.strings.remove(id).is_some() {
            trace!(id, "freed string");
        }
    }

    /// Append the text of `src` onto `dst` and release `src`.
    pub fn concat_strings(&mut self, dst: u16, src: u16) -> UcResult<()> {
        let tail = self.strings.text(src).to_string();
        let Some(target) = self.strings.get_mut(dst) else {
            return Err(UcError::new(
                ErrorKind::InvalidHandle,
                format!("concatenating onto missing string {dst}"),
            ));
        };
        target.push_str(&tail);
        self.strings.remove(src);
        Ok(())
    }

    // --- lists ---

    /// Store `list` under a new handle (0 when the pool is exhausted).
    pub fn assign_list(&mut self, list: UcList) -> u16 {
        self.lists.assign(list)
    }

    /// Borrow the list behind `id`.
    pub fn list(&self, id: u16) -> Option<&UcList> {
        self.lists.get(id)
    }

    /// Mutably borrow the list behind `id`.
    pub fn list_mut(&mut self, id: u16) -> Option<&mut UcList> {
        self.lists.get_mut(id)
    }

    /// The list behind `id`, or an `InvalidHandle` error naming `what`.
    pub fn require_list(&self, id: u16, what: &str) -> UcResult<&UcList> {
        self.lists.get(id).ok_or_else(|| {
            UcError::new(ErrorKind::InvalidHandle, format!("invalid list {id} in {what}"))
        })
    }

    /// Release a list without touching the strings it may reference.
    pub fn free_list(&mut self, id: u16) {
        if self.lists.remove(id).is_some() {
            trace!(id, "freed list");
        }
    }

    /// Release a string list and every string it holds.
    pub fn free_string_list(&mut self, id: u16) {
        if let Some(list) = self.lists.remove(id) {
            list.free_strings(&mut self.strings);
            trace!(id, strings = list.len(), "freed string list");
        }
    }

    /// Copy list `id` under a new handle. A missing source yields an
    /// empty list of `element_size`.
    pub fn copy_list(&mut self, id: u16, element_size: usize) -> u16 {
        let copy = self
            .lists
            .get(id)
            .cloned()
            .unwrap_or_else(|| UcList::new(element_size));
        self.lists.assign(copy)
    }

    /// Copy string list `id`, duplicating every string it references.
    pub fn copy_string_list(&mut self, id: u16) -> u16 {
        let mut copy = self.lists.get(id).cloned().unwrap_or_else(|| UcList::new(2));
        copy.copy_string_list(&mut self.strings);
        self.lists.assign(copy)
    }

    fn require_pair(&self, dst: u16, src: u16, what: &str) -> UcResult<()> {
        if self.lists.contains(dst) && self.lists.contains(src) {
            Ok(())
        } else {
            Err(UcError::new(
                ErrorKind::InvalidHandle,
                format!("invalid list param to {what} ({dst}, {src})"),
            ))
        }
    }

    fn require_same_width(&self, dst: u16, src: u16) -> UcResult<()> {
        let dst_size = self.lists.get(dst).map(UcList::element_size);
        let src_size = self.lists.get(src).map(UcList::element_size);
        if dst_size != src_size {
            return Err(UcError::new(
                ErrorKind::ElementSizeMismatch,
                format!("list {dst} and list {src} have different element sizes"),
            ));
        }
        Ok(())
    }

    fn require_string_lists(&self, dst: u16, src: u16) -> UcResult<()> {
        for id in [dst, src] {
            let size = self.lists.get(id).map_or(0, UcList::element_size);
            if size != 2 {
                return Err(UcError::new(
                    ErrorKind::ElementSizeMismatch,
                    format!("list {id} has element size {size}, not a string list"),
                ));
            }
        }
        Ok(())
    }

    /// Merge string list `src` into `dst`, dropping duplicate texts, and
    /// release `src`.
    pub fn union_string_lists(&mut self, dst: u16, src: u16) -> UcResult<()> {
        self.require_pair(dst, src, "union slist")?;
        self.require_string_lists(dst, src)?;
        let Some(source) = self.lists.remove(src) else {
            return Ok(());
        };
        if let Some(target) = self.lists.get_mut(dst) {
            target.union_string_list(source, &mut self.strings);
        }
        Ok(())
    }

    /// Remove texts of string list `src` from `dst`, then release `src`
    /// together with its strings.
    pub fn subtract_string_lists(&mut self, dst: u16, src: u16) -> UcResult<()> {
        self.require_pair(dst, src, "subtract slist")?;
        self.require_string_lists(dst, src)?;
        let Some(source) = self.lists.remove(src) else {
            return Ok(());
        };
        if let Some(target) = self.lists.get_mut(dst) {
            target.subtract_string_list(&source, &mut self.strings);
        }
        source.free_strings(&mut self.strings);
        Ok(())
    }

    /// Remove records of `src` from `dst`, then release `src`.
    pub fn subtract_lists(&mut self, dst: u16, src: u16) -> UcResult<()> {
        self.require_pair(dst, src, "subtract list")?;
        self.require_same_width(dst, src)?;
        if let Some(source) = self.lists.remove(src) {
            if let Some(target) = self.lists.get_mut(dst) {
                target.subtract_list(&source)?;
            }
        }
        Ok(())
    }

    /// Append list `src` onto `dst`, then release `src`.
    pub fn append_lists(&mut self, dst: u16, src: u16) -> UcResult<()> {
        self.require_pair(dst, src, "append list")?;
        self.require_same_width(dst, src)?;
        if let Some(source) = self.lists.remove(src) {
            if let Some(target) = self.lists.get_mut(dst) {
                target.append_list(&source)?;
            }
        }
        Ok(())
    }

    /// Whether string list `list` holds text equal to string `id`.
    pub fn string_in_list(&self, list: u16, id: u16) -> bool {
        self.lists
            .get(list)
            .is_some_and(|l| l.string_in_list(id, &self.strings))
    }

    // --- housekeeping ---

    /// Live entry counts.
    pub fn stats(&self) -> HeapStats {
        HeapStats {
            strings: self.strings.len(),
            lists: self.lists.len(),
        }
    }

    /// Drop every string and list and reset both pools.
    pub fn reset(&mut self) {
        self.strings.clear();
        self.lists.clear();
    }

    /// Serialise the string heap.
    pub fn save_strings(&self, out: &mut Vec<u8>) {
        self.strings.save_with(out, |text, out| {
            out.put_u32(text.len() as u32);
            out.extend_from_slice(text.as_bytes());
        });
    }

    /// Serialise the list heap.
    pub fn save_lists(&self, out: &mut Vec<u8>) {
        self.lists.save_with(out, |list, out| {
            out.put_u32(list.element_size() as u32);
            out.put_u32(list.len() as u32);
            out.extend_from_slice(list.as_bytes());
        });
    }

    /// Restore the string heap written by [`UsecodeHeap::save_strings`].
    pub fn load_strings(&mut self, reader: &mut ByteReader<'_>) -> UcResult<()> {
        self.strings.load_with(reader, |r| {
            let len = r.read_u32()? as usize;
            let bytes = r.read_bytes(len)?;
            String::from_utf8(bytes.to_vec()).map_err(|e| {
                UcError::new(ErrorKind::CorruptSave, format!("saved string is not UTF-8: {e}"))
            })
        })
    }

    /// Restore the list heap written by [`UsecodeHeap::save_lists`].
    pub fn load_lists(&mut self, reader: &mut ByteReader<'_>) -> UcResult<()> {
        self.lists.load_with(reader, |r| {
            let element_size = r.read_u32()? as usize;
            let count = r.read_u32()? as usize;
            let len = element_size.checked_mul(count).ok_or_else(|| {
                UcError::new(ErrorKind::CorruptSave, "saved list size overflows")
            })?;
            let bytes = r.read_bytes(len)?;
            UcList::from_bytes(element_size, bytes.to_vec())
                .map_err(|e| UcError::new(ErrorKind::CorruptSave, e.message))
        })
    }
}
