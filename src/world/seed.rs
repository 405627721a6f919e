use crate::entities::creature::{BloodType, CombatCredits, Creature, CreatureId, CreatureKind};
use crate::entities::item::{Item, ItemTypeId};
use crate::entities::stats::Stats;
use crate::requests::Intent;
use crate::world::item_types::{ItemType, ItemTypeIndex};
use crate::world::map::Map;
use crate::world::position::{Direction, Position};
use crate::world::state::World;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Starting world and an optional list of intents to replay, as found in
/// `<root>/world.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSeed {
    pub item_types: Vec<ItemType>,
    /// Rectangles of plain ground on one floor.
    pub areas: Vec<AreaSeed>,
    pub tiles: Vec<TileSeed>,
    pub creatures: Vec<CreatureSeed>,
    pub script: Vec<ScriptedIntent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSeed {
    pub from: Position,
    pub to: Position,
    pub ground: ItemTypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSeed {
    pub position: Position,
    #[serde(default)]
    pub ground: Option<ItemTypeId>,
    #[serde(default)]
    pub items: Vec<ItemSeed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemSeed {
    pub type_id: ItemTypeId,
    #[serde(default = "one")]
    pub count: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatureSeed {
    pub id: CreatureId,
    pub name: String,
    pub kind: CreatureKind,
    pub position: Position,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub health: Option<u32>,
    #[serde(default)]
    pub speed: Option<u16>,
    #[serde(default)]
    pub attack: Option<u16>,
    #[serde(default)]
    pub armor: Option<u16>,
    #[serde(default)]
    pub attack_speed: Option<u16>,
    #[serde(default)]
    pub blood: BloodType,
    #[serde(default)]
    pub credits: Option<u8>,
}

/// One intent fed to the engine `at_ms` after start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedIntent {
    pub at_ms: u64,
    pub actor: CreatureId,
    pub intent: Intent,
}

fn one() -> u16 {
    1
}

impl WorldSeed {
    pub fn from_yaml_str(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|err| format!("invalid world seed: {}", err))
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|err| format!("read {} failed: {}", path.display(), err))?;
        Self::from_yaml_str(&text)
    }

    /// Script entries in replay order.
    pub fn sorted_script(&self) -> Vec<ScriptedIntent> {
        let mut script = self.script.clone();
        script.sort_by_key(|entry| entry.at_ms);
        script
    }

    pub fn build(&self) -> Result<World, String> {
        let mut types = ItemTypeIndex::default();
        for item_type in &self.item_types {
            types.insert(item_type.clone())?;
        }

        let mut map = Map::default();
        for area in &self.areas {
            for position in area.positions()? {
                map.ensure_tile(position);
            }
        }
        for tile in &self.tiles {
            map.ensure_tile(tile.position);
        }

        let mut world = World::new(map, types);
        for area in &self.areas {
            for position in area.positions()? {
                place(&mut world, position, area.ground, 1)?;
            }
        }
        for tile in &self.tiles {
            if let Some(ground) = tile.ground {
                place(&mut world, tile.position, ground, 1)?;
            }
            for item in &tile.items {
                place(&mut world, tile.position, item.type_id, item.count)?;
            }
        }
        for seed in &self.creatures {
            world
                .spawn_creature(seed.to_creature())
                .map_err(|err| format!("creature {} ({}): {}", seed.id.0, seed.name, err))?;
        }
        Ok(world)
    }
}

impl AreaSeed {
    fn positions(&self) -> Result<Vec<Position>, String> {
        if self.from.z != self.to.z {
            return Err(format!(
                "area spans floors {} and {}",
                self.from.z, self.to.z
            ));
        }
        let (min_x, max_x) = (self.from.x.min(self.to.x), self.from.x.max(self.to.x));
        let (min_y, max_y) = (self.from.y.min(self.to.y), self.from.y.max(self.to.y));
        let mut positions = Vec::new();
        for x in min_x..=max_x {
            for y in min_y..=max_y {
                positions.push(Position {
                    x,
                    y,
                    z: self.from.z,
                });
            }
        }
        Ok(positions)
    }
}

impl CreatureSeed {
    fn to_creature(&self) -> Creature {
        let mut creature = Creature::new(self.id, self.name.clone(), self.kind, self.position);
        if let Some(direction) = self.direction {
            creature.direction = direction;
        }
        if let Some(health) = self.health {
            creature.stats = Stats::with_health(health);
        }
        if let Some(speed) = self.speed {
            creature.speed = speed;
        }
        if let Some(attack) = self.attack {
            creature.attack = attack;
        }
        if let Some(armor) = self.armor {
            creature.armor = armor;
        }
        if let Some(attack_speed) = self.attack_speed {
            creature.attack_speed = attack_speed;
        }
        if let Some(credits) = self.credits {
            creature.attack_credits = CombatCredits::full(credits);
            creature.defense_credits = CombatCredits::full(credits);
        }
        creature.blood = self.blood;
        creature
    }
}

fn place(world: &mut World, position: Position, type_id: ItemTypeId, count: u16) -> Result<(), String> {
    if world.item_types.get(type_id).is_none() {
        return Err(format!("unknown item type {}", type_id.0));
    }
    world
        .place_item(position, Item::new(type_id, count))
        .map(|_| ())
        .map_err(|err| format!("place {} at {:?}: {}", type_id.0, position, err))
}
