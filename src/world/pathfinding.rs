use crate::world::position::{Direction, Position};
use crate::world::state::World;
use lru::LruCache;
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroUsize;

/// Route lookup consumed by movement-dependent operations. An empty result
/// means there is no way.
pub trait Pathfinder: Send {
    fn find_path(&mut self, world: &World, from: Position, to: Position) -> Vec<Direction>;
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64)
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPath {
    revision: u64,
    steps: Vec<Direction>,
}

/// Breadth-first search over walkable tiles on one floor. Ends on `to` when
/// it is walkable, otherwise on any tile next to it. Results are cached per
/// map revision.
pub struct GridPathfinder {
    max_distance: u16,
    cache: LruCache<(Position, Position), CachedPath>,
    stats: CacheStats,
}

impl GridPathfinder {
    pub fn new(max_distance: u16, cache_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            max_distance: max_distance.max(1),
            cache: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn search(&self, world: &World, from: Position, to: Position) -> Vec<Direction> {
        if from.distance_to(to).map_or(true, |d| d > self.max_distance) {
            return Vec::new();
        }
        let exact = world.is_walkable(to);
        let is_goal = |position: Position| {
            if exact {
                position == to
            } else {
                position != from && position.is_within(to, 1)
            }
        };

        let mut came_from: HashMap<Position, (Position, Direction)> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            for direction in Direction::ALL {
                let Some(next) = current.step(direction) else {
                    continue;
                };
                if next == from || came_from.contains_key(&next) {
                    continue;
                }
                if !next.is_within(from, self.max_distance) || !world.is_walkable(next) {
                    continue;
                }
                came_from.insert(next, (current, direction));
                if is_goal(next) {
                    return unwind(&came_from, from, next);
                }
                queue.push_back(next);
            }
        }
        Vec::new()
    }
}

impl Pathfinder for GridPathfinder {
    fn find_path(&mut self, world: &World, from: Position, to: Position) -> Vec<Direction> {
        let revision = world.map.revision();
        if let Some(cached) = self.cache.get(&(from, to)) {
            if cached.revision == revision {
                self.stats.hits += 1;
                return cached.steps.clone();
            }
        }
        self.stats.misses += 1;
        let steps = self.search(world, from, to);
        self.cache.put(
            (from, to),
            CachedPath {
                revision,
                steps: steps.clone(),
            },
        );
        steps
    }
}

fn unwind(
    came_from: &HashMap<Position, (Position, Direction)>,
    from: Position,
    goal: Position,
) -> Vec<Direction> {
    let mut steps = Vec::new();
    let mut cursor = goal;
    while cursor != from {
        let Some(&(previous, direction)) = came_from.get(&cursor) else {
            return Vec::new();
        };
        steps.push(direction);
        cursor = previous;
    }
    steps.reverse();
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::item::{Item, ItemTypeId};
    use crate::world::item_types::{ItemLayer, ItemType, ItemTypeIndex};
    use crate::world::map::Map;

    const GRASS: ItemTypeId = ItemTypeId(1);
    const WALL: ItemTypeId = ItemTypeId(2);

    fn corridor_world(wall_at: Option<Position>) -> World {
        let mut grass = ItemType::new(GRASS, "grass");
        grass.layer = ItemLayer::Ground;
        let mut wall = ItemType::new(WALL, "wall");
        wall.layer = ItemLayer::Top;
        wall.blocks_path = true;
        let types: ItemTypeIndex = [grass, wall].into_iter().collect();
        let mut map = Map::default();
        for x in 0..6 {
            for y in 0..3 {
                map.ensure_tile(Position { x, y, z: 7 });
            }
        }
        let mut world = World::new(map, types);
        for x in 0..6 {
            for y in 0..3 {
                world
                    .place_item(Position { x, y, z: 7 }, Item::new(GRASS, 1))
                    .expect("ground");
            }
        }
        if let Some(position) = wall_at {
            world.place_item(position, Item::new(WALL, 1)).expect("wall");
        }
        world
    }

    fn walk(from: Position, steps: &[Direction]) -> Position {
        steps
            .iter()
            .fold(from, |position, direction| position.step(*direction).expect("step"))
    }

    #[test]
    fn finds_straight_path_to_walkable_target() {
        let world = corridor_world(None);
        let mut finder = GridPathfinder::new(16, 8);
        let from = Position { x: 0, y: 1, z: 7 };
        let to = Position { x: 4, y: 1, z: 7 };
        let steps = finder.find_path(&world, from, to);
        assert_eq!(steps.len(), 4);
        assert_eq!(walk(from, &steps), to);
    }

    #[test]
    fn stops_next_to_blocked_target() {
        let wall = Position { x: 4, y: 1, z: 7 };
        let world = corridor_world(Some(wall));
        let mut finder = GridPathfinder::new(16, 8);
        let from = Position { x: 0, y: 1, z: 7 };
        let steps = finder.find_path(&world, from, wall);
        assert_eq!(steps.len(), 3);
        assert!(walk(from, &steps).is_within(wall, 1));
    }

    #[test]
    fn no_path_off_floor_or_out_of_range() {
        let world = corridor_world(None);
        let mut finder = GridPathfinder::new(2, 8);
        let from = Position { x: 0, y: 1, z: 7 };
        assert!(finder.find_path(&world, from, Position { x: 5, y: 1, z: 7 }).is_empty());
        assert!(finder.find_path(&world, from, Position { x: 1, y: 1, z: 6 }).is_empty());
    }

    #[test]
    fn repeated_lookups_hit_cache_until_map_changes() {
        let mut world = corridor_world(None);
        let mut finder = GridPathfinder::new(16, 8);
        let from = Position { x: 0, y: 0, z: 7 };
        let to = Position { x: 3, y: 0, z: 7 };
        finder.find_path(&world, from, to);
        finder.find_path(&world, from, to);
        assert_eq!(finder.stats().hits, 1);
        world.map.ensure_tile(Position { x: 9, y: 9, z: 7 });
        finder.find_path(&world, from, to);
        assert_eq!(finder.stats().misses, 2);
    }
}
