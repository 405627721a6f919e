use crate::engine::error::EngineError;
use crate::engine::event::{Event, EventId, PartitionKey};
use crate::engine::outcome::{BlockReason, EventReport, Outcome};
use crate::engine::scheduler::{Scheduler, SchedulerHandle};
use crate::entities::creature::{CreatureId, ExhaustionType};
use crate::entities::item::{ItemId, ItemTypeId};
use crate::operations::{Operation, OperationType, Precondition};
use crate::world::position::{Direction, Position};
use crate::world::state::World;
use crate::world::time::GameTick;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a player asked for, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Intent {
    Walk {
        direction: Direction,
    },
    AutoWalk {
        steps: Vec<Direction>,
    },
    Turn {
        direction: Direction,
    },
    Attack {
        target: CreatureId,
    },
    StopAttack,
    UseItem {
        position: Position,
        type_id: ItemTypeId,
    },
    MoveItem {
        from: Position,
        type_id: ItemTypeId,
        #[serde(default = "default_count")]
        count: u16,
        to: Position,
    },
}

fn default_count() -> u16 {
    1
}

/// Where request handlers put their work: the scheduler itself on the
/// game thread, or a handle from anywhere else.
pub trait EventQueue {
    fn schedule(&mut self, event: Event, delay: Duration) -> Result<EventId, EngineError>;
    fn cancel_all_for(&mut self, key: PartitionKey) -> Result<(), EngineError>;
}

impl EventQueue for Scheduler {
    fn schedule(&mut self, event: Event, delay: Duration) -> Result<EventId, EngineError> {
        Ok(Scheduler::schedule(self, event, delay))
    }

    fn cancel_all_for(&mut self, key: PartitionKey) -> Result<(), EngineError> {
        Scheduler::cancel_all_for(self, key.requestor, key.operation_type);
        Ok(())
    }
}

impl EventQueue for SchedulerHandle {
    fn schedule(&mut self, event: Event, delay: Duration) -> Result<EventId, EngineError> {
        SchedulerHandle::schedule(self, event, delay)
    }

    fn cancel_all_for(&mut self, key: PartitionKey) -> Result<(), EngineError> {
        SchedulerHandle::cancel_all_for(self, key.requestor, key.operation_type)
    }
}

/// Validates an intent against the world as it is now and queues the
/// matching operation. Rejected intents never reach the queue.
pub fn handle_intent<Q: EventQueue + ?Sized>(
    queue: &mut Q,
    world: &World,
    actor: CreatureId,
    intent: Intent,
    now: GameTick,
) -> Result<EventId, EngineError> {
    let Some(creature) = world.creature(actor) else {
        return Err(EngineError::Validation(format!("unknown creature {}", actor.0)));
    };

    match intent {
        Intent::Walk { direction } => {
            cancel_walking(queue, actor)?;
            let delay = creature
                .exhausted_until(ExhaustionType::Movement)
                .map(|ready_at| now.until(ready_at))
                .unwrap_or_default();
            queue.schedule(Event::operation(actor, Operation::walk(direction)), delay)
        }
        Intent::AutoWalk { steps } => {
            if steps.is_empty() {
                return Err(EngineError::Validation("empty path".to_string()));
            }
            cancel_walking(queue, actor)?;
            queue.schedule(Event::operation(actor, Operation::auto_walk(steps)), Duration::ZERO)
        }
        Intent::Turn { direction } => {
            queue.schedule(Event::operation(actor, Operation::turn(direction)), Duration::ZERO)
        }
        Intent::Attack { target } => {
            if target == actor {
                return Err(EngineError::Validation("cannot attack yourself".to_string()));
            }
            if !world.creature_exists(target) {
                return Err(EngineError::Validation(format!("unknown target {}", target.0)));
            }
            queue.schedule(
                Event::operation(actor, Operation::select_target(Some(target))),
                Duration::ZERO,
            )
        }
        Intent::StopAttack => queue.schedule(
            Event::operation(actor, Operation::select_target(None)),
            Duration::ZERO,
        ),
        Intent::UseItem { position, type_id } => {
            let item = find_item(world, position, type_id)?;
            queue.cancel_all_for(PartitionKey::new(actor, OperationType::UseItem))?;
            queue.schedule(
                Event::operation(actor, Operation::use_item(item, position)),
                Duration::ZERO,
            )
        }
        Intent::MoveItem {
            from,
            type_id,
            count,
            to,
        } => {
            if count == 0 {
                return Err(EngineError::Validation("nothing to move".to_string()));
            }
            let item = find_item(world, from, type_id)?;
            queue.schedule(
                Event::operation(actor, Operation::move_item(item, from, to, count)),
                Duration::ZERO,
            )
        }
    }
}

/// Steering by hand also abandons a use still waiting on its approach walk.
fn cancel_walking<Q: EventQueue + ?Sized>(queue: &mut Q, actor: CreatureId) -> Result<(), EngineError> {
    queue.cancel_all_for(PartitionKey::new(actor, OperationType::Walk))?;
    queue.cancel_all_for(PartitionKey::new(actor, OperationType::AutoWalk))?;
    queue.cancel_all_for(PartitionKey::new(actor, OperationType::UseItem))
}

fn find_item(
    world: &World,
    position: Position,
    type_id: ItemTypeId,
) -> Result<ItemId, EngineError> {
    world
        .tile(position)
        .and_then(|tile| tile.top_item_of_type(type_id))
        .map(|item| item.id)
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "no item of type {} at {},{},{}",
                type_id.0, position.x, position.y, position.z
            ))
        })
}

/// Text shown to the requestor when an operation did not go through.
pub fn describe_failure(report: &EventReport) -> Option<&'static str> {
    match &report.outcome {
        Outcome::Completed | Outcome::Deferred(_) | Outcome::Snoozed => None,
        Outcome::PreconditionFailed(precondition) => match precondition {
            Precondition::NotExhausted(_) => Some("You are exhausted."),
            Precondition::TargetStillSelected { .. } => Some("Target lost."),
            Precondition::HasCombatCredits { .. } => None,
            Precondition::ItemStillAt { .. } => Some("Sorry, not possible."),
            Precondition::RequestorExists | Precondition::RequestorAlive => None,
        },
        Outcome::Blocked(reason) => Some(match reason {
            BlockReason::NoWay => "There is no way.",
            BlockReason::OutOfRange => "Destination is out of range.",
            BlockReason::TargetLost => "Target lost.",
            BlockReason::NotUsable => "You cannot use this object.",
            BlockReason::NotMovable => "You cannot move this object.",
            BlockReason::NotEnoughRoom => "There is not enough room.",
            BlockReason::CreatureGone | BlockReason::ItemGone => "Sorry, not possible.",
        }),
        Outcome::Faulted(_) => Some("Sorry, not possible."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::context::Services;
    use crate::engine::event::EventTag;
    use crate::engine::notification::RecordingSink;
    use crate::entities::item::Item;
    use crate::operations::test_support::*;
    use crate::world::time::{Clock, Cooldown, ManualClock};
    use std::sync::Arc;

    fn scheduler() -> Scheduler {
        Scheduler::new(Arc::new(ManualClock::new(GameTick(1_000))), EngineConfig::default())
    }

    #[test]
    fn unknown_actor_and_bad_arguments_never_queue() {
        let mut world = field();
        spawn(&mut world, 1, at(1, 1));
        let mut queue = scheduler();
        let now = queue.current_time();
        for (actor, intent) in [
            (CreatureId(9), Intent::Turn { direction: Direction::North }),
            (CreatureId(1), Intent::AutoWalk { steps: Vec::new() }),
            (CreatureId(1), Intent::Attack { target: CreatureId(1) }),
            (
                CreatureId(1),
                Intent::MoveItem {
                    from: at(1, 1),
                    type_id: GRASS,
                    count: 0,
                    to: at(2, 2),
                },
            ),
            (
                CreatureId(1),
                Intent::UseItem {
                    position: at(2, 1),
                    type_id: LEVER,
                },
            ),
        ] {
            let result = handle_intent(&mut queue, &world, actor, intent, now);
            assert!(matches!(result, Err(EngineError::Validation(_))));
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn new_walk_replaces_pending_walks() {
        let mut world = field();
        spawn(&mut world, 1, at(1, 1));
        let mut queue = scheduler();
        let now = queue.current_time();
        let first = handle_intent(
            &mut queue,
            &world,
            CreatureId(1),
            Intent::AutoWalk {
                steps: vec![Direction::East, Direction::East],
            },
            now,
        )
        .expect("auto walk");
        let second = handle_intent(
            &mut queue,
            &world,
            CreatureId(1),
            Intent::Walk {
                direction: Direction::South,
            },
            now,
        )
        .expect("walk");
        assert!(!queue.contains(first));
        assert!(queue.contains(second));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn walk_waits_for_movement_cooldown() {
        let mut world = field();
        spawn(&mut world, 1, at(1, 1));
        if let Some(creature) = world.creature_mut(CreatureId(1)) {
            creature
                .exhaustion
                .insert(ExhaustionType::Movement, Cooldown::new(GameTick(1_400)));
        }
        let mut queue = scheduler();
        let now = queue.current_time();
        let id = handle_intent(
            &mut queue,
            &world,
            CreatureId(1),
            Intent::Walk {
                direction: Direction::East,
            },
            now,
        )
        .expect("walk");
        assert_eq!(queue.due_time(id), Some(GameTick(1_400)));
    }

    #[test]
    fn use_item_resolves_item_by_type() {
        let mut world = field();
        spawn(&mut world, 1, at(1, 1));
        world.place_item(at(2, 1), Item::new(LEVER, 1)).expect("lever");
        let mut queue = scheduler();
        let now = queue.current_time();
        let id = handle_intent(
            &mut queue,
            &world,
            CreatureId(1),
            Intent::UseItem {
                position: at(2, 1),
                type_id: LEVER,
            },
            now,
        )
        .expect("use");
        assert_eq!(queue.due_time(id), Some(now));
    }

    #[test]
    fn walking_away_abandons_pending_use() {
        let mut world = field();
        spawn(&mut world, 1, at(1, 1));
        world.place_item(at(4, 1), Item::new(LEVER, 1)).expect("lever");
        let clock = Arc::new(ManualClock::new(GameTick(1_000)));
        let config = EngineConfig {
            rng_seed: Some(3),
            ..EngineConfig::default()
        };
        let mut queue = Scheduler::new(clock.clone(), config.clone());
        let mut services = Services::from_config(&config, Box::new(RecordingSink::new()));
        let use_intent = Intent::UseItem {
            position: at(4, 1),
            type_id: LEVER,
        };
        let use_id = handle_intent(&mut queue, &world, CreatureId(1), use_intent, clock.now())
            .expect("use");
        queue.step(&mut world, &mut services);
        assert!(queue.is_parked(use_id));

        handle_intent(
            &mut queue,
            &world,
            CreatureId(1),
            Intent::Walk {
                direction: Direction::South,
            },
            clock.now(),
        )
        .expect("walk");
        assert!(!queue.contains(use_id));
        assert!(queue.expedite_rules().is_empty());

        clock.set(GameTick(5_000));
        queue.step(&mut world, &mut services);
        handle_intent(
            &mut queue,
            &world,
            CreatureId(1),
            Intent::AutoWalk {
                steps: vec![Direction::North, Direction::East],
            },
            clock.now(),
        )
        .expect("auto walk");
        for millis in [5_000, 10_000, 15_000] {
            clock.set(GameTick(millis));
            queue.step(&mut world, &mut services);
        }
        assert_eq!(
            world.creature(CreatureId(1)).map(|creature| creature.position),
            Some(at(3, 1))
        );
        let lever_untouched = world
            .tile(at(4, 1))
            .and_then(|tile| tile.top_item_of_type(LEVER))
            .is_some();
        assert!(lever_untouched);
    }

    #[test]
    fn intents_parse_from_yaml() {
        let intent: Intent = serde_yaml::from_str(
            "kind: move_item\nfrom: {x: 1, y: 1, z: 7}\ntype_id: 5\nto: {x: 3, y: 3, z: 7}\n",
        )
        .expect("intent");
        assert_eq!(
            intent,
            Intent::MoveItem {
                from: at(1, 1),
                type_id: STONE,
                count: 1,
                to: at(3, 3),
            }
        );
        let walk: Intent = serde_yaml::from_str("kind: walk\ndirection: north\n").expect("walk");
        assert_eq!(walk, Intent::Walk { direction: Direction::North });
    }

    #[test]
    fn failure_texts() {
        let report = |outcome| EventReport {
            event_id: EventId(1),
            requestor: CreatureId(1),
            tag: EventTag::Operation(OperationType::Walk),
            outcome,
            executed_at: GameTick(0),
            rescheduled_at: None,
        };
        assert_eq!(
            describe_failure(&report(Outcome::Blocked(BlockReason::NoWay))),
            Some("There is no way.")
        );
        assert_eq!(
            describe_failure(&report(Outcome::PreconditionFailed(Precondition::NotExhausted(
                ExhaustionType::Movement
            )))),
            Some("You are exhausted.")
        );
        assert_eq!(describe_failure(&report(Outcome::Completed)), None);
    }
}
