use crate::conditions::Condition;
use crate::config::EngineConfig;
use crate::engine::event::{Event, EventId, PartitionKey};
use crate::engine::expedite::EventFact;
use crate::engine::notification::{Notification, NotificationSink};
use crate::engine::rng::{RandomSource, SeededRng};
use crate::entities::creature::{CreatureId, ExhaustionType};
use crate::world::pathfinding::{GridPathfinder, Pathfinder};
use crate::world::position::{Direction, Position};
use crate::world::state::World;
use crate::world::time::{Cooldown, GameTick};
use std::time::Duration;

/// Follow-up work an event asks for. Applied by the scheduler, in order,
/// after the event returns.
#[derive(Debug)]
pub enum SchedulerCommand {
    Schedule { event: Event, delay: Duration },
    CancelAllFor(PartitionKey),
    RaiseCondition(Condition),
}

/// Collaborators the scheduler lends to every execution.
pub struct Services {
    pub pathfinder: Box<dyn Pathfinder>,
    pub notifications: Box<dyn NotificationSink>,
    pub rng: Box<dyn RandomSource>,
}

impl Services {
    pub fn new(
        pathfinder: Box<dyn Pathfinder>,
        notifications: Box<dyn NotificationSink>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            pathfinder,
            notifications,
            rng,
        }
    }

    /// Grid pathfinder and seeded RNG as configured.
    pub fn from_config(config: &EngineConfig, notifications: Box<dyn NotificationSink>) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => SeededRng::from_seed(seed),
            None => SeededRng::from_time(),
        };
        Self::new(
            Box::new(GridPathfinder::new(
                config.path_search_distance,
                config.path_cache_capacity,
            )),
            notifications,
            Box::new(rng),
        )
    }
}

/// Everything an event produced besides its outcome.
#[derive(Debug, Default)]
pub struct ExecutionEffects {
    pub commands: Vec<SchedulerCommand>,
    pub facts: Vec<EventFact>,
    pub notifications: Vec<Notification>,
}

/// What one event sees while it runs. World access is direct; anything
/// touching the queue goes through the command outbox.
pub struct ExecutionContext<'a> {
    pub world: &'a mut World,
    pub pathfinder: &'a mut dyn Pathfinder,
    pub rng: &'a mut dyn RandomSource,
    pub config: &'a EngineConfig,
    now: GameTick,
    effects: ExecutionEffects,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        world: &'a mut World,
        pathfinder: &'a mut dyn Pathfinder,
        rng: &'a mut dyn RandomSource,
        config: &'a EngineConfig,
        now: GameTick,
    ) -> Self {
        Self {
            world,
            pathfinder,
            rng,
            config,
            now,
            effects: ExecutionEffects::default(),
        }
    }

    pub fn now(&self) -> GameTick {
        self.now
    }

    pub fn notify(&mut self, notification: Notification) {
        self.effects.notifications.push(notification);
    }

    pub fn schedule(&mut self, event: Event, delay: Duration) -> EventId {
        let id = event.id();
        self.effects
            .commands
            .push(SchedulerCommand::Schedule { event, delay });
        id
    }

    pub fn cancel_all_for(&mut self, key: PartitionKey) {
        self.effects.commands.push(SchedulerCommand::CancelAllFor(key));
    }

    pub fn raise_condition(&mut self, condition: Condition) {
        self.effects
            .commands
            .push(SchedulerCommand::RaiseCondition(condition));
    }

    pub fn record_fact(&mut self, fact: EventFact) {
        self.effects.facts.push(fact);
    }

    pub fn find_path(&mut self, from: Position, to: Position) -> Vec<Direction> {
        self.pathfinder.find_path(self.world, from, to)
    }

    /// Stamps the creature's cooldown and raises the matching exhaustion
    /// condition so the cooldown is cleared when it runs out.
    pub fn charge_exhaustion(&mut self, creature: CreatureId, kind: ExhaustionType, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        let until = self.now.after(duration);
        let Some(live) = self.world.creature_mut(creature) else {
            return;
        };
        live.exhaustion
            .entry(kind)
            .and_modify(|cooldown| cooldown.extend_to(until))
            .or_insert_with(|| Cooldown::new(until));
        self.raise_condition(Condition::exhaustion(creature, kind, until));
    }

    pub fn finish(self) -> ExecutionEffects {
        self.effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{ConditionSubject, ConditionType};
    use crate::entities::creature::{Creature, CreatureKind};
    use crate::entities::item::{Item, ItemTypeId};
    use crate::world::item_types::{ItemLayer, ItemType, ItemTypeIndex};
    use crate::world::map::Map;

    fn world() -> World {
        let mut grass = ItemType::new(ItemTypeId(1), "grass");
        grass.layer = ItemLayer::Ground;
        let types: ItemTypeIndex = [grass].into_iter().collect();
        let position = Position { x: 5, y: 5, z: 7 };
        let mut map = Map::default();
        map.ensure_tile(position);
        let mut world = World::new(map, types);
        world.place_item(position, Item::new(ItemTypeId(1), 1)).expect("ground");
        world
            .spawn_creature(Creature::new(CreatureId(1), "Knight", CreatureKind::Player, position))
            .expect("spawn");
        world
    }

    #[test]
    fn charging_exhaustion_stamps_cooldown_and_raises_condition() {
        let mut world = world();
        let mut pathfinder = GridPathfinder::new(8, 4);
        let mut rng = SeededRng::from_seed(1);
        let config = EngineConfig::default();
        let mut ctx = ExecutionContext::new(&mut world, &mut pathfinder, &mut rng, &config, GameTick(1_000));
        ctx.charge_exhaustion(CreatureId(1), ExhaustionType::Combat, Duration::from_millis(2_000));
        ctx.charge_exhaustion(CreatureId(9), ExhaustionType::Combat, Duration::from_millis(2_000));
        let effects = ctx.finish();
        assert_eq!(effects.commands.len(), 1);
        match &effects.commands[0] {
            SchedulerCommand::RaiseCondition(condition) => {
                assert_eq!(condition.condition_type(), ConditionType::Exhaustion);
                assert_eq!(condition.subject, ConditionSubject::Creature(CreatureId(1)));
                assert_eq!(condition.end_time, GameTick(3_000));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert_eq!(
            world.creature(CreatureId(1)).and_then(|c| c.exhausted_until(ExhaustionType::Combat)),
            Some(GameTick(3_000))
        );
    }
}
