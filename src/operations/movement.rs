use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::event::Event;
use crate::engine::expedite::EventFact;
use crate::engine::notification::{Notification, NotificationPayload};
use crate::engine::outcome::{BlockReason, Outcome};
use crate::entities::creature::{CreatureId, ExhaustionType};
use crate::entities::item::ItemId;
use crate::operations::{ActionResult, Operation};
use crate::world::map::{ContainerError, Thing, DEFAULT_GROUND_SPEED};
use crate::world::position::{Direction, Position};
use crate::world::state::{World, WorldError};
use std::collections::VecDeque;
use std::time::Duration;

const DIAGONAL_FACTOR: u64 = 3;

/// Time one step onto `destination` takes: ground speed over creature
/// speed, tripled for diagonals.
pub fn step_duration(world: &World, speed: u16, destination: Position, direction: Direction) -> Duration {
    let ground = world
        .tile(destination)
        .map(|tile| u64::from(tile.ground_speed(&world.item_types)))
        .unwrap_or(u64::from(DEFAULT_GROUND_SPEED));
    let mut millis = ground * 1000 / u64::from(speed.max(1));
    if direction.is_diagonal() {
        millis *= DIAGONAL_FACTOR;
    }
    Duration::from_millis(millis)
}

pub(super) fn walk(
    requestor: CreatureId,
    direction: Direction,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    let Some(creature) = ctx.world.creature(requestor) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone).into());
    };
    let speed = creature.speed;
    let Some(destination) = creature.position.step(direction) else {
        return Ok(Outcome::Blocked(BlockReason::NoWay).into());
    };
    if !ctx.world.is_walkable(destination) {
        return Ok(Outcome::Blocked(BlockReason::NoWay).into());
    }
    let duration = step_duration(ctx.world, speed, destination, direction);
    let from = ctx.world.relocate_creature(requestor, destination)?;
    if let Some(creature) = ctx.world.creature_mut(requestor) {
        creature.direction = direction;
    }
    ctx.notify(Notification::spectators(
        destination,
        NotificationPayload::CreatureMoved {
            creature: requestor,
            from,
            to: destination,
        },
    ));
    ctx.record_fact(EventFact::CreatureMoved {
        creature: requestor,
        from,
        to: destination,
    });
    Ok(ActionResult::completed().with_cost(ExhaustionType::Movement, duration))
}

/// Takes the next step and chains the rest behind it. Waits out a pending
/// movement cooldown instead of failing.
pub(super) fn auto_walk(
    requestor: CreatureId,
    steps: &mut VecDeque<Direction>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    let now = ctx.now();
    let ready_at = ctx
        .world
        .creature(requestor)
        .and_then(|creature| creature.exhausted_until(ExhaustionType::Movement));
    if let Some(ready_at) = ready_at.filter(|ready_at| *ready_at > now) {
        return Ok(ActionResult::from(Outcome::Snoozed).repeat_after(now.until(ready_at)));
    }
    let Some(direction) = steps.pop_front() else {
        return Ok(ActionResult::completed());
    };
    let result = walk(requestor, direction, ctx)?;
    if !result.outcome.is_completed() {
        steps.clear();
        return Ok(result);
    }
    if !steps.is_empty() {
        let delay = result.cost.map(|cost| cost.duration).unwrap_or_default();
        let rest = Operation::auto_walk(steps.drain(..));
        ctx.schedule(Event::operation(requestor, rest), delay);
    }
    Ok(result)
}

pub(super) fn turn(
    requestor: CreatureId,
    direction: Direction,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    let Some(creature) = ctx.world.creature_mut(requestor) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone).into());
    };
    creature.direction = direction;
    let position = creature.position;
    ctx.notify(Notification::spectators(
        position,
        NotificationPayload::CreatureTurned {
            creature: requestor,
            direction,
        },
    ));
    Ok(ActionResult::completed())
}

/// Throws `count` of an item from a tile next to the actor onto a tile
/// within throw range. Whatever does not fit goes back to the source.
pub(super) fn move_item(
    requestor: CreatureId,
    item: ItemId,
    from: Position,
    to: Position,
    count: u16,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    let Some(actor) = ctx.world.creature(requestor) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone).into());
    };
    if !actor.position.is_within(from, 1) || !from.is_within(to, ctx.config.throw_range) {
        return Ok(Outcome::Blocked(BlockReason::OutOfRange).into());
    }
    let movable = ctx
        .world
        .item(item)
        .and_then(|live| ctx.world.item_types.get(live.type_id))
        .map_or(false, |item_type| item_type.movable);
    if !movable {
        return Ok(Outcome::Blocked(BlockReason::NotMovable).into());
    }
    let accepts = ctx
        .world
        .tile(to)
        .map_or(false, |tile| tile.ground.is_some() && !tile.blocks_path(&ctx.world.item_types));
    if !accepts {
        return Ok(Outcome::Blocked(BlockReason::NotEnoughRoom).into());
    }

    let removed = ctx.world.remove_item(item, count.max(1))?;
    let Some(Thing::Item(moving)) = removed.removed else {
        return Err(EngineError::Fault(format!("item {} vanished while moving", item.0)));
    };
    match ctx.world.place_item(to, moving.clone()) {
        Ok(placed) => {
            if let Some(Thing::Item(rest)) = placed.remainder {
                ctx.world.place_item(from, rest)?;
            }
        }
        Err(WorldError::Container(ContainerError::Full(_))) => {
            ctx.world.place_item(from, moving)?;
            return Ok(Outcome::Blocked(BlockReason::NotEnoughRoom).into());
        }
        Err(err) => return Err(err.into()),
    }
    ctx.notify(Notification::spectators(from, NotificationPayload::TileUpdated));
    ctx.notify(Notification::spectators(to, NotificationPayload::TileUpdated));
    Ok(ActionResult::completed())
}
