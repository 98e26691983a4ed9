//! Handle-indexed arena.
//!
//! `Heap<T>` owns values keyed by 16-bit handles drawn from an [`IdPool`].
//! A handle is live exactly while its id is in use in the pool, so a stale
//! handle (freed, or never assigned) simply resolves to nothing.

use crate::id_pool::IdPool;
use core_types::{ByteReader, ByteWriter, ErrorKind, UcError, UcResult};

/// Largest number of entries a saved heap may declare.
const MAX_SAVED_ENTRIES: u32 = 65536;

/// Arena of values addressed by pool-issued handles.
#[derive(Debug, Clone)]
pub struct Heap<T> {
    slots: Vec<Option<T>>,
    ids: IdPool,
}

impl<T> Heap<T> {
    /// Create an empty heap drawing handles from `ids`.
    pub fn new(ids: IdPool) -> Self {
        Self {
            slots: Vec::new(),
            ids,
        }
    }

    /// Store `value` under a fresh handle.
    ///
    /// Returns 0 when the pool is exhausted; the value is dropped.
    pub fn assign(&mut self, value: T) -> u16 {
        let id = self.ids.get_new_id();
        if id == 0 {
            return 0;
        }
        self.put(id, value);
        id
    }

    fn put(&mut self, id: u16, value: T) {
        let idx = usize::from(id);
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(value);
    }

    /// Whether `id` names a live entry.
    pub fn contains(&self, id: u16) -> bool {
        self.ids.is_used(id)
    }

    /// Borrow the entry behind `id`.
    pub fn get(&self, id: u16) -> Option<&T> {
        if !self.ids.is_used(id) {
            return None;
        }
        self.slots.get(usize::from(id)).and_then(Option::as_ref)
    }

    /// Mutably borrow the entry behind `id`.
    pub fn get_mut(&mut self, id: u16) -> Option<&mut T> {
        if !self.ids.is_used(id) {
            return None;
        }
        self.slots.get_mut(usize::from(id)).and_then(Option::as_mut)
    }

    /// Release `id` and hand back its value. Unknown ids are a no-op.
    pub fn remove(&mut self, id: u16) -> Option<T> {
        if !self.ids.is_used(id) {
            return None;
        }
        self.ids.clear_id(id);
        self.slots.get_mut(usize::from(id)).and_then(Option::take)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        usize::from(self.ids.used_count())
    }

    /// True when no entry is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(id, slot)| slot.as_ref().map(|value| (id as u16, value)))
    }

    /// Drop every entry and reset the pool.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.ids.clear_all();
    }

    /// The underlying id pool.
    pub fn ids(&self) -> &IdPool {
        &self.ids
    }

    /// Write pool state, entry count and each `(handle, payload)`.
    pub fn save_with<F>(&self, out: &mut Vec<u8>, mut write: F)
    where
        F: FnMut(&T, &mut Vec<u8>),
    {
        self.ids.save(out);
        out.put_u32(self.len() as u32);
        for (id, value) in self.iter() {
            out.put_u16(id);
            write(value, out);
        }
    }

    /// Replace this heap with one written by [`Heap::save_with`].
    ///
    /// Every saved handle must be marked used in the saved pool and the
    /// entry count must match the pool's used count.
    pub fn load_with<F>(&mut self, reader: &mut ByteReader<'_>, mut read: F) -> UcResult<()>
    where
        F: FnMut(&mut ByteReader<'_>) -> UcResult<T>,
    {
        let ids = IdPool::load(reader)?;
        let count = reader.read_u32()?;
        if count > MAX_SAVED_ENTRIES || count != u32::from(ids.used_count()) {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!(
                    "heap declares {} entries but its pool has {} in use",
                    count,
                    ids.used_count()
                ),
            ));
        }

        let mut loaded = Heap::new(ids);
        for _ in 0..count {
            let id = reader.read_u16()?;
            if !loaded.ids.is_used(id) || loaded.get(id).is_some() {
                return Err(UcError::new(
                    ErrorKind::CorruptSave,
                    format!("saved handle {id} is not allocated or repeats"),
                ));
            }
            let value = read(reader)?;
            loaded.put(id, value);
        }

        *self = loaded;
        Ok(())
    }
}

impl Heap<String> {
    /// Copy the string behind `id` under a new handle.
    ///
    /// A missing source yields a fresh empty string.
    pub fn duplicate(&mut self, id: u16) -> u16 {
        let copy = self.get(id).cloned().unwrap_or_default();
        self.assign(copy)
    }

    /// Text behind `id`, empty when the handle is not live.
    pub fn text(&self, id: u16) -> &str {
        self.get(id).map(String::as_str).unwrap_or("")
    }
}
