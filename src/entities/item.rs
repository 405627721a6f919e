use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u32);

static NEXT_ITEM_ID: AtomicU32 = AtomicU32::new(1);

impl ItemId {
    pub fn next() -> Self {
        let id = NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed);
        ItemId(id)
    }

    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemTypeId(pub u16);

pub const MAX_STACK_COUNT: u16 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub type_id: ItemTypeId,
    pub count: u16,
}

impl Item {
    pub fn new(type_id: ItemTypeId, count: u16) -> Self {
        Self {
            id: ItemId::next(),
            type_id,
            count: count.max(1),
        }
    }

    /// Splits `count` off into a fresh item; the original keeps the rest.
    /// Returns `None` when the split would leave nothing behind.
    pub fn split(&mut self, count: u16) -> Option<Item> {
        if count == 0 || count >= self.count {
            return None;
        }
        self.count -= count;
        Some(Item::new(self.type_id, count))
    }
}
