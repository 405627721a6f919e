use crate::conditions::Condition;
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::notification::{Notification, NotificationPayload};
use crate::engine::outcome::{BlockReason, Outcome};
use crate::entities::item::ItemId;

/// Turns the item into its decay target, or removes it when it has none.
/// A successor that decays as well gets its own condition.
pub(super) fn pulse(item: ItemId, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, EngineError> {
    let Some(position) = ctx.world.locate_item(item) else {
        return Ok(Outcome::Blocked(BlockReason::ItemGone));
    };
    let Some(current) = ctx.world.item(item).cloned() else {
        return Ok(Outcome::Blocked(BlockReason::ItemGone));
    };
    let target = ctx
        .world
        .item_types
        .get(current.type_id)
        .and_then(|item_type| item_type.decay_target);

    match target {
        Some(successor) => {
            let outcome = ctx.world.replace_item(item, successor)?;
            let next_decay = ctx
                .world
                .item_types
                .get(successor)
                .and_then(|item_type| item_type.decay_duration());
            if let (Some(placed), Some(duration)) = (outcome.placed, next_decay) {
                let end_time = ctx.now().after(duration);
                ctx.raise_condition(Condition::decay(placed, end_time));
            }
        }
        None => {
            ctx.world.remove_item(item, current.count)?;
        }
    }
    ctx.notify(Notification::spectators(position, NotificationPayload::TileUpdated));
    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::context::SchedulerCommand;
    use crate::engine::rng::SeededRng;
    use crate::entities::item::{Item, ItemTypeId};
    use crate::world::item_types::{ItemLayer, ItemType, ItemTypeIndex};
    use crate::world::map::Map;
    use crate::world::pathfinding::GridPathfinder;
    use crate::world::position::Position;
    use crate::world::state::World;
    use crate::world::time::GameTick;

    const GRASS: ItemTypeId = ItemTypeId(1);
    const BURNING: ItemTypeId = ItemTypeId(2);
    const EMBERS: ItemTypeId = ItemTypeId(3);
    const SPOT: Position = Position { x: 3, y: 3, z: 7 };

    fn world() -> World {
        let mut grass = ItemType::new(GRASS, "grass");
        grass.layer = ItemLayer::Ground;
        let mut burning = ItemType::new(BURNING, "burning wood");
        burning.decay_ms = Some(1_000);
        burning.decay_target = Some(EMBERS);
        let mut embers = ItemType::new(EMBERS, "embers");
        embers.decay_ms = Some(500);
        let types: ItemTypeIndex = [grass, burning, embers].into_iter().collect();
        let mut map = Map::default();
        map.ensure_tile(SPOT);
        let mut world = World::new(map, types);
        world.place_item(SPOT, Item::new(GRASS, 1)).expect("ground");
        world
    }

    fn run_pulse(world: &mut World, item: ItemId, now: GameTick) -> (Outcome, Vec<SchedulerCommand>) {
        let mut pathfinder = GridPathfinder::new(8, 4);
        let mut rng = SeededRng::from_seed(1);
        let config = EngineConfig::default();
        let mut ctx = ExecutionContext::new(world, &mut pathfinder, &mut rng, &config, now);
        let outcome = pulse(item, &mut ctx).expect("pulse");
        (outcome, ctx.finish().commands)
    }

    #[test]
    fn decays_into_successor_and_chains() {
        let mut world = world();
        let wood = world
            .place_item(SPOT, Item::new(BURNING, 1))
            .expect("wood")
            .placed
            .expect("wood id");
        let (outcome, commands) = run_pulse(&mut world, wood, GameTick(1_000));
        assert_eq!(outcome, Outcome::Completed);
        let tile = world.tile(SPOT).expect("tile");
        assert_eq!(tile.items.len(), 1);
        assert_eq!(tile.items[0].type_id, EMBERS);
        match commands.as_slice() {
            [SchedulerCommand::RaiseCondition(next)] => {
                assert_eq!(next.end_time, GameTick(1_500));
                assert_eq!(next.subject, crate::conditions::ConditionSubject::Item(tile.items[0].id));
            }
            other => panic!("unexpected commands {:?}", other),
        }
    }

    #[test]
    fn decays_away_without_successor() {
        let mut world = world();
        let embers = world
            .place_item(SPOT, Item::new(EMBERS, 1))
            .expect("embers")
            .placed
            .expect("embers id");
        let (outcome, commands) = run_pulse(&mut world, embers, GameTick(500));
        assert_eq!(outcome, Outcome::Completed);
        assert!(commands.is_empty());
        assert!(world.tile(SPOT).expect("tile").items.is_empty());
        let (outcome, _) = run_pulse(&mut world, embers, GameTick(600));
        assert_eq!(outcome, Outcome::Blocked(BlockReason::ItemGone));
    }
}
