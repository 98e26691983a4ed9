//! Fixed-width element lists.
//!
//! A [`UcList`] is a flat byte vector chopped into records of
//! `element_size` bytes. String lists are lists of 2-byte string handles;
//! the helpers that take a `&mut Heap<String>` treat the list that way and
//! keep the string heap consistent with what the list owns.

use crate::heap::Heap;
use core_types::{ErrorKind, UcError, UcResult};

/// An ordered sequence of fixed-width records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UcList {
    element_size: usize,
    elements: Vec<u8>,
}

impl UcList {
    /// Empty list whose records are `element_size` bytes wide.
    pub fn new(element_size: usize) -> Self {
        Self {
            element_size,
            elements: Vec::new(),
        }
    }

    /// Rebuild a list from raw record bytes.
    pub fn from_bytes(element_size: usize, elements: Vec<u8>) -> UcResult<Self> {
        if element_size == 0 && !elements.is_empty() {
            return Err(UcError::new(
                ErrorKind::InvalidOperand,
                "zero-width list with element data",
            ));
        }
        if element_size != 0 && elements.len() % element_size != 0 {
            return Err(UcError::new(
                ErrorKind::InvalidOperand,
                format!(
                    "{} bytes is not a whole number of {}-byte elements",
                    elements.len(),
                    element_size
                ),
            ));
        }
        Ok(Self {
            element_size,
            elements,
        })
    }

    /// Width of one record in bytes.
    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        if self.element_size == 0 {
            0
        } else {
            self.elements.len() / self.element_size
        }
    }

    /// True when the list holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All record bytes back to back.
    pub fn as_bytes(&self) -> &[u8] {
        &self.elements
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        if index >= self.len() {
            return None;
        }
        let start = index * self.element_size;
        Some(&self.elements[start..start + self.element_size])
    }

    /// First two bytes of record `index` as a little-endian handle.
    pub fn get_u16(&self, index: usize) -> Option<u16> {
        self.get(index)
            .filter(|e| e.len() >= 2)
            .map(|e| u16::from_le_bytes([e[0], e[1]]))
    }

    /// Iterate over the records.
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    fn fit(&self, data: &[u8]) -> Vec<u8> {
        let mut record = vec![0u8; self.element_size];
        let n = data.len().min(self.element_size);
        record[..n].copy_from_slice(&data[..n]);
        record
    }

    /// Append one record, zero-padded or truncated to the element width.
    pub fn append(&mut self, data: &[u8]) {
        let record = self.fit(data);
        self.elements.extend_from_slice(&record);
    }

    /// Append a 2-byte handle.
    pub fn append_u16(&mut self, value: u16) {
        self.append(&value.to_le_bytes());
    }

    /// Overwrite record `index`. Out-of-range indices are ignored.
    pub fn assign(&mut self, index: usize, data: &[u8]) {
        if index >= self.len() {
            return;
        }
        let record = self.fit(data);
        let start = index * self.element_size;
        self.elements[start..start + self.element_size].copy_from_slice(&record);
    }

    /// Whether any record equals `data`.
    pub fn contains(&self, data: &[u8]) -> bool {
        let record = self.fit(data);
        self.iter().any(|e| e == record.as_slice())
    }

    /// Remove every record equal to `data`.
    pub fn remove(&mut self, data: &[u8]) {
        let record = self.fit(data);
        let kept: Vec<u8> = self
            .iter()
            .filter(|e| *e != record.as_slice())
            .flatten()
            .copied()
            .collect();
        self.elements = kept;
    }

    fn check_width(&self, other: &UcList) -> UcResult<()> {
        if self.element_size != other.element_size {
            return Err(UcError::new(
                ErrorKind::ElementSizeMismatch,
                format!(
                    "element sizes differ: {} vs {}",
                    self.element_size, other.element_size
                ),
            ));
        }
        Ok(())
    }

    /// Append every record of `other`.
    pub fn append_list(&mut self, other: &UcList) -> UcResult<()> {
        self.check_width(other)?;
        self.elements.extend_from_slice(&other.elements);
        Ok(())
    }

    /// Remove every record that also appears in `other`.
    pub fn subtract_list(&mut self, other: &UcList) -> UcResult<()> {
        self.check_width(other)?;
        for record in other.iter() {
            self.remove(record);
        }
        Ok(())
    }

    /// Release every string handle the list holds. The records stay.
    pub fn free_strings(&self, strings: &mut Heap<String>) {
        for i in 0..self.len() {
            if let Some(id) = self.get_u16(i) {
                strings.remove(id);
            }
        }
    }

    /// Give this list its own copy of every string it references.
    pub fn copy_string_list(&mut self, strings: &mut Heap<String>) {
        for i in 0..self.len() {
            if let Some(id) = self.get_u16(i) {
                let copy = strings.duplicate(id);
                self.assign(i, &copy.to_le_bytes());
            }
        }
    }

    /// Whether some handle in the list refers to text equal to `id`'s.
    pub fn string_in_list(&self, id: u16, strings: &Heap<String>) -> bool {
        let needle = strings.text(id);
        (0..self.len())
            .filter_map(|i| self.get_u16(i))
            .any(|h| strings.text(h) == needle)
    }

    /// Move the strings of `other` into this list, skipping texts already
    /// present. Skipped handles are released.
    pub fn union_string_list(&mut self, other: UcList, strings: &mut Heap<String>) {
        for i in 0..other.len() {
            let Some(id) = other.get_u16(i) else { continue };
            if self.string_in_list(id, strings) {
                strings.remove(id);
            } else {
                self.append_u16(id);
            }
        }
    }

    /// Drop (and release) every string whose text appears in `other`.
    pub fn subtract_string_list(&mut self, other: &UcList, strings: &mut Heap<String>) {
        for i in 0..other.len() {
            let Some(id) = other.get_u16(i) else { continue };
            let needle = strings.text(id).to_string();
            let mut index = 0;
            while index < self.len() {
                let handle = self.get_u16(index).unwrap_or(0);
                if strings.text(handle) == needle {
                    if handle != id {
                        strings.remove(handle);
                    }
                    self.remove_at(index);
                } else {
                    index += 1;
                }
            }
        }
    }

    fn remove_at(&mut self, index: usize) {
        let start = index * self.element_size;
        self.elements.drain(start..start + self.element_size);
    }
}
