use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::notification::{Notification, NotificationPayload};
use crate::entities::creature::{CreatureId, ExhaustionType};
use crate::world::time::GameTick;
use std::collections::BTreeMap;

/// Per-kind latest-wins merge.
pub(super) fn merge(
    mine: &mut BTreeMap<ExhaustionType, GameTick>,
    theirs: BTreeMap<ExhaustionType, GameTick>,
) {
    for (kind, until) in theirs {
        mine.entry(kind)
            .and_modify(|current| *current = (*current).max(until))
            .or_insert(until);
    }
}

/// Clears every kind that has run out, on the condition and on the
/// creature. Returns the earliest expiry still pending.
pub(super) fn pulse(
    creature: CreatureId,
    expiries: &mut BTreeMap<ExhaustionType, GameTick>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<Option<GameTick>, EngineError> {
    let now = ctx.now();
    let expired: Vec<ExhaustionType> = expiries
        .iter()
        .filter(|(_, until)| **until <= now)
        .map(|(kind, _)| *kind)
        .collect();
    for kind in &expired {
        expiries.remove(kind);
    }

    let Some(live) = ctx.world.creature_mut(creature) else {
        // nobody left to notify or to keep waking up for
        expiries.clear();
        return Ok(None);
    };
    for kind in &expired {
        if live.exhaustion.get(kind).map_or(false, |cooldown| cooldown.is_ready(now)) {
            live.exhaustion.remove(kind);
        }
    }
    let flags = live.status_flags(now);
    ctx.notify(Notification::to_creature(
        creature,
        NotificationPayload::StatusFlags { creature, flags },
    ));
    Ok(expiries.values().min().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::rng::SeededRng;
    use crate::entities::creature::{Creature, CreatureKind};
    use crate::entities::item::{Item, ItemTypeId};
    use crate::world::item_types::{ItemLayer, ItemType, ItemTypeIndex};
    use crate::world::map::Map;
    use crate::world::pathfinding::GridPathfinder;
    use crate::world::position::Position;
    use crate::world::state::World;
    use crate::world::time::Cooldown;

    #[test]
    fn merge_keeps_latest_per_kind() {
        let mut mine = BTreeMap::from([(ExhaustionType::Combat, GameTick(2_000))]);
        merge(
            &mut mine,
            BTreeMap::from([
                (ExhaustionType::Combat, GameTick(1_000)),
                (ExhaustionType::Magic, GameTick(4_000)),
            ]),
        );
        assert_eq!(mine.get(&ExhaustionType::Combat), Some(&GameTick(2_000)));
        assert_eq!(mine.get(&ExhaustionType::Magic), Some(&GameTick(4_000)));
    }

    #[test]
    fn pulse_clears_expired_kinds_only() {
        let mut grass = ItemType::new(ItemTypeId(1), "grass");
        grass.layer = ItemLayer::Ground;
        let types: ItemTypeIndex = [grass].into_iter().collect();
        let position = Position { x: 1, y: 1, z: 7 };
        let mut map = Map::default();
        map.ensure_tile(position);
        let mut world = World::new(map, types);
        world.place_item(position, Item::new(ItemTypeId(1), 1)).expect("ground");
        let mut knight = Creature::new(CreatureId(1), "Knight", CreatureKind::Player, position);
        knight
            .exhaustion
            .insert(ExhaustionType::Movement, Cooldown::new(GameTick(1_000)));
        knight
            .exhaustion
            .insert(ExhaustionType::Combat, Cooldown::new(GameTick(2_000)));
        world.spawn_creature(knight).expect("spawn");

        let mut expiries = BTreeMap::from([
            (ExhaustionType::Movement, GameTick(1_000)),
            (ExhaustionType::Combat, GameTick(2_000)),
        ]);
        let mut pathfinder = GridPathfinder::new(8, 4);
        let mut rng = SeededRng::from_seed(1);
        let config = EngineConfig::default();
        let mut ctx = ExecutionContext::new(&mut world, &mut pathfinder, &mut rng, &config, GameTick(1_000));
        let next = pulse(CreatureId(1), &mut expiries, &mut ctx).expect("pulse");
        let notifications = ctx.finish().notifications;
        assert_eq!(next, Some(GameTick(2_000)));
        assert_eq!(expiries.len(), 1);
        assert_eq!(
            notifications[0].payload,
            NotificationPayload::StatusFlags {
                creature: CreatureId(1),
                flags: 0x02
            }
        );
        let knight = world.creature(CreatureId(1)).expect("knight");
        assert!(!knight.exhaustion.contains_key(&ExhaustionType::Movement));
        assert!(knight.exhaustion.contains_key(&ExhaustionType::Combat));
    }
}
