use crate::entities::creature::CreatureId;
use crate::entities::item::{Item, ItemId, ItemTypeId, MAX_STACK_COUNT};
use crate::world::item_types::{ItemLayer, ItemTypeIndex};
use crate::world::position::Position;
use std::collections::HashMap;

pub const MAX_LOOSE_ITEMS: usize = 10;
pub const DEFAULT_GROUND_SPEED: u16 = 150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thing {
    Item(Item),
    Creature(CreatureId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThingRef {
    Item(ItemId),
    Creature(CreatureId),
}

/// Result of a container operation. Partial success is normal: whatever
/// did not fit comes back in `remainder`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentOutcome {
    pub count: u16,
    pub removed: Option<Thing>,
    pub placed: Option<ItemId>,
    pub remainder: Option<Thing>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    NotFound(ThingRef),
    GroundOccupied(Position),
    Full(Position),
    InvalidCount(u16),
}

impl std::fmt::Display for ContainerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerError::NotFound(thing) => write!(f, "thing not found: {:?}", thing),
            ContainerError::GroundOccupied(pos) => {
                write!(f, "ground already set at ({}, {}, {})", pos.x, pos.y, pos.z)
            }
            ContainerError::Full(pos) => {
                write!(f, "tile full at ({}, {}, {})", pos.x, pos.y, pos.z)
            }
            ContainerError::InvalidCount(count) => write!(f, "invalid count {}", count),
        }
    }
}

impl std::error::Error for ContainerError {}

/// Anything that holds things in stacking order.
pub trait ThingContainer {
    fn add_content(
        &mut self,
        types: &ItemTypeIndex,
        thing: Thing,
    ) -> Result<ContentOutcome, ContainerError>;

    fn remove_content(
        &mut self,
        types: &ItemTypeIndex,
        target: ThingRef,
        count: u16,
    ) -> Result<ContentOutcome, ContainerError>;

    fn replace_content(
        &mut self,
        types: &ItemTypeIndex,
        target: ItemId,
        replacement: ItemTypeId,
    ) -> Result<ContentOutcome, ContainerError>;
}

/// One map square. Stacking order, bottom to top: ground, fixed top items,
/// creatures, loose items. Within `creatures` and `items` index 0 is the
/// topmost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub position: Position,
    pub ground: Option<Item>,
    pub top: Vec<Item>,
    pub creatures: Vec<CreatureId>,
    pub items: Vec<Item>,
}

impl Tile {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            ground: None,
            top: Vec::new(),
            creatures: Vec::new(),
            items: Vec::new(),
        }
    }

    pub fn item_ids(&self) -> Vec<ItemId> {
        self.ground
            .iter()
            .chain(self.top.iter())
            .chain(self.items.iter())
            .map(|item| item.id)
            .collect()
    }

    pub fn find_item(&self, id: ItemId) -> Option<&Item> {
        self.ground
            .iter()
            .chain(self.top.iter())
            .chain(self.items.iter())
            .find(|item| item.id == id)
    }

    pub fn top_item_of_type(&self, type_id: ItemTypeId) -> Option<&Item> {
        self.items
            .iter()
            .chain(self.top.iter())
            .chain(self.ground.iter())
            .find(|item| item.type_id == type_id)
    }

    pub fn blocks_path(&self, types: &ItemTypeIndex) -> bool {
        self.ground
            .iter()
            .chain(self.top.iter())
            .chain(self.items.iter())
            .any(|item| types.blocks_path(item.type_id))
    }

    /// Walkable means: has ground, nothing blocking, nobody standing there.
    pub fn is_walkable(&self, types: &ItemTypeIndex) -> bool {
        self.ground.is_some() && self.creatures.is_empty() && !self.blocks_path(types)
    }

    pub fn ground_speed(&self, types: &ItemTypeIndex) -> u16 {
        self.ground
            .as_ref()
            .and_then(|ground| types.get(ground.type_id))
            .and_then(|ground| ground.ground_speed)
            .unwrap_or(DEFAULT_GROUND_SPEED)
    }

    fn add_loose(&mut self, types: &ItemTypeIndex, mut item: Item) -> ContentOutcome {
        let mut outcome = ContentOutcome::default();
        if types.is_stackable(item.type_id) {
            if let Some(stack) = self
                .items
                .iter_mut()
                .find(|stack| stack.type_id == item.type_id && stack.count < MAX_STACK_COUNT)
            {
                let merged = (MAX_STACK_COUNT - stack.count).min(item.count);
                stack.count += merged;
                item.count -= merged;
                outcome.count += merged;
                outcome.placed = Some(stack.id);
                if item.count == 0 {
                    return outcome;
                }
            }
        }
        if self.items.len() >= MAX_LOOSE_ITEMS {
            outcome.remainder = Some(Thing::Item(item));
            return outcome;
        }
        outcome.count += item.count;
        outcome.placed = Some(item.id);
        self.items.insert(0, item);
        outcome
    }

    fn take_item(&mut self, id: ItemId) -> Option<(ItemLayer, usize, Item)> {
        if self.ground.as_ref().map(|ground| ground.id) == Some(id) {
            return self.ground.take().map(|item| (ItemLayer::Ground, 0, item));
        }
        if let Some(index) = self.top.iter().position(|item| item.id == id) {
            return Some((ItemLayer::Top, index, self.top.remove(index)));
        }
        if let Some(index) = self.items.iter().position(|item| item.id == id) {
            return Some((ItemLayer::Loose, index, self.items.remove(index)));
        }
        None
    }
}

impl ThingContainer for Tile {
    fn add_content(
        &mut self,
        types: &ItemTypeIndex,
        thing: Thing,
    ) -> Result<ContentOutcome, ContainerError> {
        match thing {
            Thing::Creature(id) => {
                self.creatures.insert(0, id);
                Ok(ContentOutcome {
                    count: 1,
                    ..ContentOutcome::default()
                })
            }
            Thing::Item(item) => match types.layer(item.type_id) {
                ItemLayer::Ground => {
                    if self.ground.is_some() {
                        return Err(ContainerError::GroundOccupied(self.position));
                    }
                    let outcome = ContentOutcome {
                        count: item.count,
                        placed: Some(item.id),
                        ..ContentOutcome::default()
                    };
                    self.ground = Some(item);
                    Ok(outcome)
                }
                ItemLayer::Top => {
                    let outcome = ContentOutcome {
                        count: item.count,
                        placed: Some(item.id),
                        ..ContentOutcome::default()
                    };
                    self.top.push(item);
                    Ok(outcome)
                }
                ItemLayer::Loose => {
                    let outcome = self.add_loose(types, item);
                    if outcome.count == 0 && outcome.remainder.is_some() {
                        return Err(ContainerError::Full(self.position));
                    }
                    Ok(outcome)
                }
            },
        }
    }

    fn remove_content(
        &mut self,
        types: &ItemTypeIndex,
        target: ThingRef,
        count: u16,
    ) -> Result<ContentOutcome, ContainerError> {
        match target {
            ThingRef::Creature(id) => {
                let index = self
                    .creatures
                    .iter()
                    .position(|creature| *creature == id)
                    .ok_or(ContainerError::NotFound(target))?;
                self.creatures.remove(index);
                Ok(ContentOutcome {
                    count: 1,
                    removed: Some(Thing::Creature(id)),
                    ..ContentOutcome::default()
                })
            }
            ThingRef::Item(id) => {
                if count == 0 {
                    return Err(ContainerError::InvalidCount(count));
                }
                if let Some(stack) = self.items.iter_mut().find(|item| item.id == id) {
                    if types.is_stackable(stack.type_id) && count < stack.count {
                        let remaining = stack.id;
                        let taken = stack
                            .split(count)
                            .ok_or(ContainerError::InvalidCount(count))?;
                        return Ok(ContentOutcome {
                            count,
                            removed: Some(Thing::Item(taken)),
                            placed: Some(remaining),
                            remainder: None,
                        });
                    }
                }
                let (_, _, item) = self.take_item(id).ok_or(ContainerError::NotFound(target))?;
                Ok(ContentOutcome {
                    count: item.count,
                    removed: Some(Thing::Item(item)),
                    ..ContentOutcome::default()
                })
            }
        }
    }

    fn replace_content(
        &mut self,
        types: &ItemTypeIndex,
        target: ItemId,
        replacement: ItemTypeId,
    ) -> Result<ContentOutcome, ContainerError> {
        let (layer, index, old) = self
            .take_item(target)
            .ok_or(ContainerError::NotFound(ThingRef::Item(target)))?;
        let new_item = Item::new(replacement, old.count);
        let new_id = new_item.id;
        let count = new_item.count;
        let new_layer = types.layer(replacement);
        if new_layer == layer {
            match layer {
                ItemLayer::Ground => self.ground = Some(new_item),
                ItemLayer::Top => self.top.insert(index.min(self.top.len()), new_item),
                ItemLayer::Loose => self.items.insert(index.min(self.items.len()), new_item),
            }
            return Ok(ContentOutcome {
                count,
                removed: Some(Thing::Item(old)),
                placed: Some(new_id),
                remainder: None,
            });
        }
        match self.add_content(types, Thing::Item(new_item)) {
            Ok(mut outcome) => {
                outcome.removed = Some(Thing::Item(old));
                Ok(outcome)
            }
            Err(err) => {
                // put the original back where it was
                match layer {
                    ItemLayer::Ground => self.ground = Some(old),
                    ItemLayer::Top => self.top.insert(index.min(self.top.len()), old),
                    ItemLayer::Loose => self.items.insert(index.min(self.items.len()), old),
                }
                Err(err)
            }
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Map {
    tiles: HashMap<Position, Tile>,
    revision: u64,
}

impl Map {
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn has_tile(&self, position: Position) -> bool {
        self.tiles.contains_key(&position)
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.tiles.get(&position)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    /// Mutable access to the container at `position`. Any such access counts
    /// as a change for path caching.
    pub fn container_at(&mut self, position: Position) -> Option<&mut Tile> {
        let tile = self.tiles.get_mut(&position)?;
        self.revision = self.revision.wrapping_add(1);
        Some(tile)
    }

    pub fn ensure_tile(&mut self, position: Position) -> &mut Tile {
        self.revision = self.revision.wrapping_add(1);
        self.tiles
            .entry(position)
            .or_insert_with(|| Tile::new(position))
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_walkable(&self, position: Position, types: &ItemTypeIndex) -> bool {
        self.tile(position)
            .map_or(false, |tile| tile.is_walkable(types))
    }
}
