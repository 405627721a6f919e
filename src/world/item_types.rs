use crate::entities::item::ItemTypeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Stacking layer an item occupies on a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemLayer {
    Ground,
    Top,
    #[default]
    Loose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemType {
    pub id: ItemTypeId,
    pub name: String,
    #[serde(default)]
    pub layer: ItemLayer,
    #[serde(default)]
    pub blocks_path: bool,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub movable: bool,
    /// Ground speed for walk duration; only meaningful on ground items.
    #[serde(default)]
    pub ground_speed: Option<u16>,
    /// Type this item becomes when used.
    #[serde(default)]
    pub use_target: Option<ItemTypeId>,
    #[serde(default)]
    pub decay_ms: Option<u64>,
    /// Type this item decays into; `None` with `decay_ms` set means it vanishes.
    #[serde(default)]
    pub decay_target: Option<ItemTypeId>,
}

impl ItemType {
    pub fn new(id: ItemTypeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            layer: ItemLayer::Loose,
            blocks_path: false,
            stackable: false,
            movable: true,
            ground_speed: None,
            use_target: None,
            decay_ms: None,
            decay_target: None,
        }
    }

    pub fn decay_duration(&self) -> Option<Duration> {
        self.decay_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Default, Clone)]
pub struct ItemTypeIndex {
    types: HashMap<ItemTypeId, ItemType>,
}

impl ItemTypeIndex {
    pub fn get(&self, id: ItemTypeId) -> Option<&ItemType> {
        self.types.get(&id)
    }

    pub fn insert(&mut self, item: ItemType) -> Result<(), String> {
        if self.types.contains_key(&item.id) {
            return Err(format!("item type {:?} already exists", item.id));
        }
        self.types.insert(item.id, item);
        Ok(())
    }

    pub fn layer(&self, id: ItemTypeId) -> ItemLayer {
        self.get(id).map(|item| item.layer).unwrap_or_default()
    }

    pub fn blocks_path(&self, id: ItemTypeId) -> bool {
        self.get(id).map_or(false, |item| item.blocks_path)
    }

    pub fn is_stackable(&self, id: ItemTypeId) -> bool {
        self.get(id).map_or(false, |item| item.stackable)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl FromIterator<ItemType> for ItemTypeIndex {
    fn from_iter<T: IntoIterator<Item = ItemType>>(iter: T) -> Self {
        let mut index = ItemTypeIndex::default();
        for item in iter {
            index.types.insert(item.id, item);
        }
        index
    }
}
