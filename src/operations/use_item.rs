use crate::conditions::Condition;
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, PartitionKey};
use crate::engine::expedite::ExpediteTrigger;
use crate::engine::notification::{Notification, NotificationPayload};
use crate::engine::outcome::{BlockReason, Outcome};
use crate::entities::creature::CreatureId;
use crate::entities::item::ItemId;
use crate::operations::{ActionResult, Operation, OperationType};
use crate::world::position::Position;
use std::time::Duration;

const USE_REACH: u16 = 1;

/// Uses an item next to the actor. Out of reach, the actor is sent walking
/// and the use waits until a step lands it next to the item.
pub(super) fn use_item(
    requestor: CreatureId,
    item: ItemId,
    position: Position,
    approaching: &mut bool,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    let Some(actor) = ctx.world.creature(requestor) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone).into());
    };
    let actor_position = actor.position;

    if !actor_position.is_within(position, USE_REACH) {
        let path = ctx.find_path(actor_position, position);
        if path.is_empty() {
            return Ok(Outcome::Blocked(BlockReason::NoWay).into());
        }
        let walk_key = PartitionKey::new(requestor, OperationType::AutoWalk);
        ctx.cancel_all_for(walk_key);
        ctx.schedule(
            Event::operation(requestor, Operation::auto_walk(path)),
            Duration::ZERO,
        );
        *approaching = true;
        return Ok(Outcome::Deferred(ExpediteTrigger::CreatureMovedWithin {
            creature: requestor,
            target: position,
            distance: USE_REACH,
        })
        .into());
    }

    if *approaching {
        // arrived; the rest of the approach walk is no longer wanted
        ctx.cancel_all_for(PartitionKey::new(requestor, OperationType::AutoWalk));
        *approaching = false;
    }

    let Some(current) = ctx.world.item(item) else {
        return Ok(Outcome::Blocked(BlockReason::ItemGone).into());
    };
    let Some(replacement) = ctx
        .world
        .item_types
        .get(current.type_id)
        .and_then(|item_type| item_type.use_target)
    else {
        return Ok(Outcome::Blocked(BlockReason::NotUsable).into());
    };
    let outcome = ctx.world.replace_item(item, replacement)?;
    ctx.notify(Notification::spectators(position, NotificationPayload::TileUpdated));

    let decay = ctx
        .world
        .item_types
        .get(replacement)
        .and_then(|item_type| item_type.decay_duration());
    if let (Some(placed), Some(duration)) = (outcome.placed, decay) {
        let end_time = ctx.now().after(duration);
        ctx.raise_condition(Condition::decay(placed, end_time));
    }
    Ok(ActionResult::completed())
}
