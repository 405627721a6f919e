use crate::engine::event::{EventId, PartitionKey};
use crate::entities::creature::CreatureId;
use crate::world::position::Position;
use crate::world::time::GameTick;

/// Something an executed event did that a parked operation may be waiting
/// for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFact {
    CreatureMoved {
        creature: CreatureId,
        from: Position,
        to: Position,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpediteTrigger {
    /// `creature` lands within `distance` tiles of `target` on its floor.
    CreatureMovedWithin {
        creature: CreatureId,
        target: Position,
        distance: u16,
    },
}

impl ExpediteTrigger {
    pub fn is_satisfied_by(&self, fact: &EventFact) -> bool {
        match (*self, *fact) {
            (
                ExpediteTrigger::CreatureMovedWithin {
                    creature,
                    target,
                    distance,
                },
                EventFact::CreatureMoved {
                    creature: moved, to, ..
                },
            ) => creature == moved && to.is_within(target, distance),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpediteRule {
    pub key: PartitionKey,
    pub waiting: EventId,
    pub trigger: ExpediteTrigger,
    pub expires_at: GameTick,
}

/// Live rules, in registration order.
#[derive(Debug, Default)]
pub struct ExpediteRegistry {
    rules: Vec<ExpediteRule>,
}

impl ExpediteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[ExpediteRule] {
        &self.rules
    }

    /// A waiting event has at most one rule; registering again replaces it.
    pub fn register(&mut self, rule: ExpediteRule) {
        self.rules.retain(|existing| existing.waiting != rule.waiting);
        self.rules.push(rule);
    }

    /// Removes and returns the events whose rule any of `facts` satisfies.
    pub fn take_satisfied(&mut self, facts: &[EventFact]) -> Vec<EventId> {
        if facts.is_empty() || self.rules.is_empty() {
            return Vec::new();
        }
        let mut woken = Vec::new();
        self.rules.retain(|rule| {
            let hit = facts.iter().any(|fact| rule.trigger.is_satisfied_by(fact));
            if hit {
                woken.push(rule.waiting);
            }
            !hit
        });
        woken
    }

    pub fn remove_event(&mut self, id: EventId) -> bool {
        let before = self.rules.len();
        self.rules.retain(|rule| rule.waiting != id);
        self.rules.len() != before
    }

    /// Drops rules whose deadline has passed and hands them back.
    pub fn expire(&mut self, now: GameTick) -> Vec<ExpediteRule> {
        let mut expired = Vec::new();
        self.rules.retain(|rule| {
            if rule.expires_at <= now {
                expired.push(*rule);
                false
            } else {
                true
            }
        });
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::OperationType;

    const ACTOR: CreatureId = CreatureId(3);

    fn moved_to(x: u16) -> EventFact {
        EventFact::CreatureMoved {
            creature: ACTOR,
            from: Position { x: x - 1, y: 5, z: 7 },
            to: Position { x, y: 5, z: 7 },
        }
    }

    fn rule(waiting: u64, expires_at: u64) -> ExpediteRule {
        ExpediteRule {
            key: PartitionKey::new(ACTOR, OperationType::UseItem),
            waiting: EventId(waiting),
            trigger: ExpediteTrigger::CreatureMovedWithin {
                creature: ACTOR,
                target: Position { x: 10, y: 5, z: 7 },
                distance: 1,
            },
            expires_at: GameTick(expires_at),
        }
    }

    #[test]
    fn within_trigger_needs_the_right_creature_and_distance() {
        let trigger = rule(1, 100).trigger;
        assert!(!trigger.is_satisfied_by(&moved_to(8)));
        assert!(trigger.is_satisfied_by(&moved_to(9)));
        let stranger = EventFact::CreatureMoved {
            creature: CreatureId(99),
            from: Position { x: 8, y: 5, z: 7 },
            to: Position { x: 9, y: 5, z: 7 },
        };
        assert!(!trigger.is_satisfied_by(&stranger));
    }

    #[test]
    fn satisfied_rules_are_consumed_once() {
        let mut registry = ExpediteRegistry::new();
        registry.register(rule(1, 100));
        assert!(registry.take_satisfied(&[moved_to(7)]).is_empty());
        assert_eq!(registry.take_satisfied(&[moved_to(9)]), vec![EventId(1)]);
        assert!(registry.take_satisfied(&[moved_to(9)]).is_empty());
    }

    #[test]
    fn expiry_and_event_removal() {
        let mut registry = ExpediteRegistry::new();
        registry.register(rule(1, 100));
        registry.register(rule(2, 300));
        let expired = registry.expire(GameTick(100));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].waiting, EventId(1));
        assert!(!registry.remove_event(EventId(1)));
        assert!(registry.remove_event(EventId(2)));
        assert!(registry.is_empty());
    }
}
