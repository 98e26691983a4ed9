//! The item world seen by search loops

use crate::loop_script;
use core_types::ObjId;
use interpreter::ItemSearch;
use std::collections::BTreeMap;

/// Items the kernel can search
pub trait ItemWorld {
    /// Items matching `search` that satisfy `script`, or `None` when the
    /// reference item or container does not exist
    fn search(&self, search: &ItemSearch, script: &[u8]) -> Option<Vec<ObjId>>;

    /// Whether `item` exists
    fn contains(&self, item: ObjId) -> bool;
}

/// One item of a [`StaticWorld`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldItem {
    /// World x
    pub x: i32,
    /// World y
    pub y: i32,
    /// World z
    pub z: i32,
    /// Container holding the item; its position is then ignored
    pub container: Option<ObjId>,
    /// Shape number
    pub shape: u16,
    /// Animation frame
    pub frame: u16,
    /// Quality
    pub quality: u16,
    /// Shape family
    pub family: u16,
    /// Npc number, 0 for plain items
    pub npc_num: u16,
    /// Status flags
    pub flags: u16,
}

impl WorldItem {
    /// A loose item at `(x, y, z)`
    pub fn at(x: i32, y: i32, z: i32) -> Self {
        Self {
            x,
            y,
            z,
            ..Self::default()
        }
    }

    /// The same item inside `container`
    pub fn inside(mut self, container: ObjId) -> Self {
        self.container = Some(container);
        self
    }

    /// The same item with another shape
    pub fn with_shape(mut self, shape: u16) -> Self {
        self.shape = shape;
        self
    }
}

/// A fixed set of items kept in memory
///
/// # Examples
///
/// ```
/// use interpreter::ItemSearch;
/// use scheduler::{ItemWorld, StaticWorld, WorldItem};
///
/// let world = StaticWorld::new()
///     .with_item(1, WorldItem::at(0, 0, 0))
///     .with_item(2, WorldItem::at(10, 0, 0));
/// let search = ItemSearch::Area { origin: 1, range: 16, recurse: false };
/// assert_eq!(world.search(&search, &[0x01, b'$']), Some(vec![2]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticWorld {
    items: BTreeMap<ObjId, WorldItem>,
}

// containers nested deeper than this are treated as a cycle
const MAX_NESTING: usize = 64;

impl StaticWorld {
    /// An empty world
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_item(mut self, id: ObjId, item: WorldItem) -> Self {
        self.insert(id, item);
        self
    }

    /// Add or replace an item
    pub fn insert(&mut self, id: ObjId, item: WorldItem) {
        self.items.insert(id, item);
    }

    /// Remove an item
    pub fn remove(&mut self, id: ObjId) -> Option<WorldItem> {
        self.items.remove(&id)
    }

    /// Look an item up
    pub fn get(&self, id: ObjId) -> Option<&WorldItem> {
        self.items.get(&id)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the world has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn top_level(&self, id: ObjId) -> Option<&WorldItem> {
        let mut item = self.items.get(&id)?;
        for _ in 0..MAX_NESTING {
            match item.container {
                Some(parent) => item = self.items.get(&parent)?,
                None => return Some(item),
            }
        }
        None
    }

    fn collect_contents(&self, container: ObjId, recurse: bool, depth: usize, out: &mut Vec<ObjId>) {
        if depth >= MAX_NESTING {
            return;
        }
        for (&id, item) in &self.items {
            if item.container == Some(container) {
                out.push(id);
                if recurse {
                    self.collect_contents(id, true, depth + 1, out);
                }
            }
        }
    }

    fn area(&self, origin: ObjId, range: u16, recurse: bool) -> Option<Vec<ObjId>> {
        let centre = self.top_level(origin)?;
        let range = i32::from(range);
        let found = self
            .items
            .keys()
            .copied()
            .filter(|&id| id != origin)
            .filter(|&id| recurse || self.items[&id].container.is_none())
            .filter(|&id| {
                self.top_level(id).is_some_and(|top| {
                    (top.x - centre.x).abs() <= range && (top.y - centre.y).abs() <= range
                })
            })
            .collect();
        Some(found)
    }

    fn surface(&self, item: ObjId, above: bool, below: bool) -> Option<Vec<ObjId>> {
        let base = self.items.get(&item)?;
        let found = self
            .items
            .iter()
            .filter(|(&id, other)| {
                id != item
                    && other.container.is_none()
                    && other.x == base.x
                    && other.y == base.y
                    && ((above && other.z > base.z) || (below && other.z < base.z))
            })
            .map(|(&id, _)| id)
            .collect();
        Some(found)
    }
}

impl ItemWorld for StaticWorld {
    fn search(&self, search: &ItemSearch, script: &[u8]) -> Option<Vec<ObjId>> {
        let candidates = match *search {
            ItemSearch::Area {
                origin,
                range,
                recurse,
            } => self.area(origin, range, recurse)?,
            ItemSearch::Container { container, recurse } => {
                self.items.get(&container)?;
                let mut out = Vec::new();
                self.collect_contents(container, recurse, 0, &mut out);
                out
            }
            ItemSearch::Surface { item, above, below } => self.surface(item, above, below)?,
        };
        Some(
            candidates
                .into_iter()
                .filter(|id| loop_script::matches(&self.items[id], script))
                .collect(),
        )
    }

    fn contains(&self, item: ObjId) -> bool {
        self.items.contains_key(&item)
    }
}
