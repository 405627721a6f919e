use crate::entities::creature::{Creature, CreatureId};
use crate::entities::item::{Item, ItemId, ItemTypeId};
use crate::world::item_types::ItemTypeIndex;
use crate::world::map::{ContainerError, ContentOutcome, Map, Thing, ThingContainer, ThingRef, Tile};
use crate::world::position::Position;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    NoTile(Position),
    UnknownCreature(CreatureId),
    UnknownItem(ItemId),
    DuplicateCreature(CreatureId),
    Container(ContainerError),
}

impl std::fmt::Display for WorldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorldError::NoTile(pos) => write!(f, "no tile at ({}, {}, {})", pos.x, pos.y, pos.z),
            WorldError::UnknownCreature(id) => write!(f, "unknown creature {}", id.0),
            WorldError::UnknownItem(id) => write!(f, "unknown item {}", id.0),
            WorldError::DuplicateCreature(id) => write!(f, "creature {} already placed", id.0),
            WorldError::Container(err) => write!(f, "container: {}", err),
        }
    }
}

impl std::error::Error for WorldError {}

impl From<ContainerError> for WorldError {
    fn from(err: ContainerError) -> Self {
        WorldError::Container(err)
    }
}

/// Everything operations may mutate: the tile map, the creature registry and
/// a reverse index from item to tile.
#[derive(Debug, Default, Clone)]
pub struct World {
    pub map: Map,
    pub item_types: ItemTypeIndex,
    creatures: BTreeMap<CreatureId, Creature>,
    item_locations: HashMap<ItemId, Position>,
}

impl World {
    pub fn new(map: Map, item_types: ItemTypeIndex) -> Self {
        let mut world = Self {
            map,
            item_types,
            creatures: BTreeMap::new(),
            item_locations: HashMap::new(),
        };
        world.reindex_items();
        world
    }

    fn reindex_items(&mut self) {
        self.item_locations.clear();
        let positions: Vec<Position> = self
            .map
            .tiles()
            .map(|tile| tile.position)
            .collect();
        for position in positions {
            if let Some(tile) = self.map.tile(position) {
                for id in tile.item_ids() {
                    self.item_locations.insert(id, position);
                }
            }
        }
    }

    pub fn creature(&self, id: CreatureId) -> Option<&Creature> {
        self.creatures.get(&id)
    }

    pub fn creature_mut(&mut self, id: CreatureId) -> Option<&mut Creature> {
        self.creatures.get_mut(&id)
    }

    pub fn creatures(&self) -> impl Iterator<Item = &Creature> {
        self.creatures.values()
    }

    pub fn creature_exists(&self, id: CreatureId) -> bool {
        self.creatures.contains_key(&id)
    }

    pub fn spawn_creature(&mut self, creature: Creature) -> Result<(), WorldError> {
        if self.creatures.contains_key(&creature.id) {
            return Err(WorldError::DuplicateCreature(creature.id));
        }
        let tile = self
            .map
            .container_at(creature.position)
            .ok_or(WorldError::NoTile(creature.position))?;
        tile.add_content(&self.item_types, Thing::Creature(creature.id))?;
        self.creatures.insert(creature.id, creature);
        Ok(())
    }

    pub fn remove_creature(&mut self, id: CreatureId) -> Option<Creature> {
        let creature = self.creatures.remove(&id)?;
        if let Some(tile) = self.map.container_at(creature.position) {
            let _ = tile.remove_content(&self.item_types, ThingRef::Creature(id), 1);
        }
        for other in self.creatures.values_mut() {
            if other.attack_target == Some(id) {
                other.attack_target = None;
            }
        }
        Some(creature)
    }

    /// Moves a creature between tile containers. The destination must
    /// already be checked for walkability by the caller.
    pub fn relocate_creature(
        &mut self,
        id: CreatureId,
        to: Position,
    ) -> Result<Position, WorldError> {
        let from = self
            .creatures
            .get(&id)
            .map(|creature| creature.position)
            .ok_or(WorldError::UnknownCreature(id))?;
        if !self.map.has_tile(to) {
            return Err(WorldError::NoTile(to));
        }
        let types = &self.item_types;
        if let Some(tile) = self.map.container_at(from) {
            tile.remove_content(types, ThingRef::Creature(id), 1)?;
        }
        let tile = self.map.container_at(to).ok_or(WorldError::NoTile(to))?;
        tile.add_content(types, Thing::Creature(id))?;
        if let Some(creature) = self.creatures.get_mut(&id) {
            creature.position = to;
        }
        Ok(from)
    }

    pub fn locate_item(&self, id: ItemId) -> Option<Position> {
        self.item_locations.get(&id).copied()
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        let position = self.locate_item(id)?;
        self.map.tile(position)?.find_item(id)
    }

    pub fn place_item(&mut self, position: Position, item: Item) -> Result<ContentOutcome, WorldError> {
        let tile = self
            .map
            .container_at(position)
            .ok_or(WorldError::NoTile(position))?;
        let outcome = tile.add_content(&self.item_types, Thing::Item(item))?;
        if let Some(placed) = outcome.placed {
            self.item_locations.insert(placed, position);
        }
        Ok(outcome)
    }

    pub fn remove_item(&mut self, id: ItemId, count: u16) -> Result<ContentOutcome, WorldError> {
        let position = self.locate_item(id).ok_or(WorldError::UnknownItem(id))?;
        let tile = self
            .map
            .container_at(position)
            .ok_or(WorldError::NoTile(position))?;
        let outcome = tile.remove_content(&self.item_types, ThingRef::Item(id), count)?;
        if outcome.placed.is_none() {
            self.item_locations.remove(&id);
        }
        Ok(outcome)
    }

    pub fn replace_item(
        &mut self,
        id: ItemId,
        replacement: ItemTypeId,
    ) -> Result<ContentOutcome, WorldError> {
        let position = self.locate_item(id).ok_or(WorldError::UnknownItem(id))?;
        let tile = self
            .map
            .container_at(position)
            .ok_or(WorldError::NoTile(position))?;
        let outcome = tile.replace_content(&self.item_types, id, replacement)?;
        self.item_locations.remove(&id);
        if let Some(placed) = outcome.placed {
            self.item_locations.insert(placed, position);
        }
        Ok(outcome)
    }

    pub fn tile(&self, position: Position) -> Option<&Tile> {
        self.map.tile(position)
    }

    pub fn is_walkable(&self, position: Position) -> bool {
        self.map.is_walkable(position, &self.item_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::creature::CreatureKind;
    use crate::world::item_types::{ItemLayer, ItemType};

    const GRASS: ItemTypeId = ItemTypeId(100);
    const APPLE: ItemTypeId = ItemTypeId(101);
    const CORE: ItemTypeId = ItemTypeId(102);

    fn world() -> World {
        let mut grass = ItemType::new(GRASS, "grass");
        grass.layer = ItemLayer::Ground;
        let types: ItemTypeIndex = [grass, ItemType::new(APPLE, "apple"), ItemType::new(CORE, "core")]
            .into_iter()
            .collect();
        let mut map = Map::default();
        for x in 0..3 {
            map.ensure_tile(Position { x, y: 0, z: 7 });
        }
        let mut world = World::new(map, types);
        for x in 0..3 {
            world
                .place_item(Position { x, y: 0, z: 7 }, Item::new(GRASS, 1))
                .expect("ground");
        }
        world
    }

    #[test]
    fn relocating_moves_between_tiles() {
        let mut world = world();
        let origin = Position { x: 0, y: 0, z: 7 };
        let creature = Creature::new(CreatureId(1), "Knight", CreatureKind::Player, origin);
        world.spawn_creature(creature).expect("spawn");
        assert!(!world.is_walkable(origin));
        let target = Position { x: 1, y: 0, z: 7 };
        assert_eq!(world.relocate_creature(CreatureId(1), target), Ok(origin));
        assert!(world.is_walkable(origin));
        assert_eq!(world.creature(CreatureId(1)).map(|c| c.position), Some(target));
        assert_eq!(world.tile(target).map(|t| t.creatures.clone()), Some(vec![CreatureId(1)]));
    }

    #[test]
    fn replacing_updates_item_index() {
        let mut world = world();
        let position = Position { x: 2, y: 0, z: 7 };
        let apple = world
            .place_item(position, Item::new(APPLE, 1))
            .expect("apple")
            .placed
            .expect("apple id");
        assert_eq!(world.locate_item(apple), Some(position));
        let core = world
            .replace_item(apple, CORE)
            .expect("replace")
            .placed
            .expect("core id");
        assert_eq!(world.locate_item(apple), None);
        assert_eq!(world.item(core).map(|item| item.type_id), Some(CORE));
        world.remove_item(core, 1).expect("remove");
        assert_eq!(world.locate_item(core), None);
    }

    #[test]
    fn removing_creature_clears_attack_targets() {
        let mut world = world();
        let mut knight = Creature::new(
            CreatureId(1),
            "Knight",
            CreatureKind::Player,
            Position { x: 0, y: 0, z: 7 },
        );
        knight.attack_target = Some(CreatureId(2));
        world.spawn_creature(knight).expect("knight");
        world
            .spawn_creature(Creature::new(
                CreatureId(2),
                "Rat",
                CreatureKind::Monster,
                Position { x: 1, y: 0, z: 7 },
            ))
            .expect("rat");
        assert!(world.remove_creature(CreatureId(2)).is_some());
        assert_eq!(world.creature(CreatureId(1)).and_then(|c| c.attack_target), None);
        assert!(world.is_walkable(Position { x: 1, y: 0, z: 7 }));
    }
}
