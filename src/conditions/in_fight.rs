use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::notification::{Notification, NotificationPayload};
use crate::engine::outcome::{BlockReason, Outcome};
use crate::entities::creature::CreatureId;

pub(super) fn pulse(creature: CreatureId, ctx: &mut ExecutionContext<'_>) -> Result<Outcome, EngineError> {
    let now = ctx.now();
    let Some(live) = ctx.world.creature_mut(creature) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone));
    };
    live.in_fight = false;
    let flags = live.status_flags(now);
    ctx.notify(Notification::to_creature(
        creature,
        NotificationPayload::StatusFlags { creature, flags },
    ));
    Ok(Outcome::Completed)
}

/// Puts a creature in fight, tells it when that is news, and (re)arms the
/// timer that lets it out again.
pub fn enter(creature: CreatureId, ctx: &mut ExecutionContext<'_>) {
    let now = ctx.now();
    let until = now.after(ctx.config.fight_duration());
    let Some(live) = ctx.world.creature_mut(creature) else {
        return;
    };
    let was_in_fight = live.in_fight;
    live.in_fight = true;
    let flags = live.status_flags(now);
    if !was_in_fight {
        ctx.notify(Notification::to_creature(
            creature,
            NotificationPayload::StatusFlags { creature, flags },
        ));
    }
    ctx.raise_condition(crate::conditions::Condition::in_fight(creature, until));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::context::SchedulerCommand;
    use crate::engine::rng::SeededRng;
    use crate::entities::creature::{Creature, CreatureKind};
    use crate::entities::item::{Item, ItemTypeId};
    use crate::world::item_types::{ItemLayer, ItemType, ItemTypeIndex};
    use crate::world::map::Map;
    use crate::world::pathfinding::GridPathfinder;
    use crate::world::position::Position;
    use crate::world::state::World;
    use crate::world::time::GameTick;

    #[test]
    fn enter_then_pulse_toggles_flag() {
        let mut grass = ItemType::new(ItemTypeId(1), "grass");
        grass.layer = ItemLayer::Ground;
        let types: ItemTypeIndex = [grass].into_iter().collect();
        let position = Position { x: 1, y: 1, z: 7 };
        let mut map = Map::default();
        map.ensure_tile(position);
        let mut world = World::new(map, types);
        world.place_item(position, Item::new(ItemTypeId(1), 1)).expect("ground");
        world
            .spawn_creature(Creature::new(CreatureId(1), "Knight", CreatureKind::Player, position))
            .expect("spawn");

        let mut pathfinder = GridPathfinder::new(8, 4);
        let mut rng = SeededRng::from_seed(1);
        let config = EngineConfig::default();
        let mut ctx = ExecutionContext::new(&mut world, &mut pathfinder, &mut rng, &config, GameTick(0));
        enter(CreatureId(1), &mut ctx);
        enter(CreatureId(1), &mut ctx);
        let effects = ctx.finish();
        assert_eq!(effects.notifications.len(), 1);
        assert_eq!(effects.commands.len(), 2);
        assert!(matches!(
            &effects.commands[0],
            SchedulerCommand::RaiseCondition(condition) if condition.end_time == GameTick(60_000)
        ));
        assert!(world.creature(CreatureId(1)).map_or(false, |c| c.in_fight));

        let mut ctx = ExecutionContext::new(&mut world, &mut pathfinder, &mut rng, &config, GameTick(60_000));
        assert_eq!(pulse(CreatureId(1), &mut ctx), Ok(Outcome::Completed));
        assert!(world.creature(CreatureId(1)).map_or(false, |c| !c.in_fight));
        let mut ctx = ExecutionContext::new(&mut world, &mut pathfinder, &mut rng, &config, GameTick(60_000));
        assert_eq!(
            pulse(CreatureId(7), &mut ctx),
            Ok(Outcome::Blocked(BlockReason::CreatureGone))
        );
    }
}
