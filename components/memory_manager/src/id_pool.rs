//! Bounded id allocator.
//!
//! Hands out 16-bit ids in `begin..=max_end`. The pool starts with
//! `start_count` ids and doubles its range whenever it runs dry, up to
//! `max_end`. Released ids are queued at the back of the free list, so a
//! freshly released id is handed out again only after every id that was
//! already free. Id 0 and 65535 are never handed out.

use core_types::{ByteReader, ByteWriter, ErrorKind, UcError, UcResult};
use std::collections::VecDeque;

/// FIFO pool of 16-bit ids.
///
/// # Examples
///
/// ```
/// use memory_manager::IdPool;
///
/// let mut pool = IdPool::new(1, 65534, 4);
/// let a = pool.get_new_id();
/// let b = pool.get_new_id();
/// assert_eq!((a, b), (1, 2));
///
/// pool.clear_id(a);
/// assert!(!pool.is_used(a));
/// assert_eq!(pool.used_count(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPool {
    begin: u16,
    end: u16,
    max_end: u16,
    start_count: u16,
    used_count: u16,
    free: VecDeque<u16>,
    used: Vec<bool>,
}

impl IdPool {
    /// Create a pool over `begin..=max_end` with `start_count` ids ready.
    ///
    /// A `start_count` of 0 makes the whole range available immediately.
    pub fn new(begin: u16, max_end: u16, start_count: u16) -> Self {
        let begin = begin.max(1);
        let max_end = max_end.min(65534).max(begin);
        let start_count = if start_count == 0 {
            max_end - begin + 1
        } else {
            start_count
        };
        let mut pool = Self {
            begin,
            end: begin,
            max_end,
            start_count,
            used_count: 0,
            free: VecDeque::new(),
            used: Vec::new(),
        };
        pool.clear_all();
        pool
    }

    /// Release every id and shrink back to the starting range.
    pub fn clear_all(&mut self) {
        let end = u32::from(self.begin) + u32::from(self.start_count) - 1;
        self.end = end.min(u32::from(self.max_end)) as u16;
        self.used = vec![false; usize::from(self.end) + 1];
        self.free = (self.begin..=self.end).collect();
        self.used_count = 0;
    }

    /// Take the next free id, or 0 when the pool is exhausted.
    pub fn get_new_id(&mut self) -> u16 {
        if self.free.is_empty() {
            self.expand();
        }
        match self.free.pop_front() {
            Some(id) => {
                self.used[usize::from(id)] = true;
                self.used_count += 1;
                id
            }
            None => 0,
        }
    }

    /// Return `id` to the pool. Ids that are not in use are ignored.
    pub fn clear_id(&mut self, id: u16) {
        if self.is_used(id) {
            self.used[usize::from(id)] = false;
            self.free.push_back(id);
            self.used_count -= 1;
        }
    }

    /// Whether `id` is currently handed out.
    pub fn is_used(&self, id: u16) -> bool {
        id >= self.begin && id <= self.end && self.used[usize::from(id)]
    }

    /// Number of ids currently handed out.
    pub fn used_count(&self) -> u16 {
        self.used_count
    }

    /// Highest id the pool can currently hand out without growing.
    pub fn end(&self) -> u16 {
        self.end
    }

    /// The id the next `get_new_id` call would return without growing.
    pub fn peek_next(&self) -> Option<u16> {
        self.free.front().copied()
    }

    fn expand(&mut self) {
        if self.end == self.max_end {
            return;
        }
        let old_end = self.end;
        let new_end = (u32::from(old_end) * 2).min(u32::from(self.max_end)) as u16;
        self.end = new_end;
        self.used.resize(usize::from(new_end) + 1, false);
        // new ids go in front of whatever is still queued
        for id in (old_end + 1..=new_end).rev() {
            self.free.push_front(id);
        }
    }

    /// Serialise range, counters and the free list in hand-out order.
    pub fn save(&self, out: &mut Vec<u8>) {
        out.put_u16(self.begin);
        out.put_u16(self.end);
        out.put_u16(self.max_end);
        out.put_u16(self.start_count);
        out.put_u16(self.used_count);
        for &id in &self.free {
            out.put_u16(id);
        }
        out.put_u16(0);
    }

    /// Rebuild a pool written by [`IdPool::save`].
    pub fn load(reader: &mut ByteReader<'_>) -> UcResult<Self> {
        let begin = reader.read_u16()?;
        let end = reader.read_u16()?;
        let max_end = reader.read_u16()?;
        let start_count = reader.read_u16()?;
        let used_count = reader.read_u16()?;
        if begin == 0 || end < begin || end > max_end || max_end == 0xFFFF {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!("bad id pool range {begin}..={end} (max {max_end})"),
            ));
        }

        let mut used = vec![false; usize::from(end) + 1];
        for flag in &mut used[usize::from(begin)..] {
            *flag = true;
        }
        let mut free = VecDeque::new();
        loop {
            let id = reader.read_u16()?;
            if id == 0 {
                break;
            }
            if id < begin || id > end || !used[usize::from(id)] {
                return Err(UcError::new(
                    ErrorKind::CorruptSave,
                    format!("free id {id} out of range or listed twice"),
                ));
            }
            used[usize::from(id)] = false;
            free.push_back(id);
        }

        let live = used.iter().filter(|&&u| u).count();
        if live != usize::from(used_count) {
            return Err(UcError::new(
                ErrorKind::CorruptSave,
                format!("id pool claims {used_count} used ids but lists {live}"),
            ));
        }

        Ok(Self {
            begin,
            end,
            max_end,
            start_count,
            used_count,
            free,
            used,
        })
    }
}
