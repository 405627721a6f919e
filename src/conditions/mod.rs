pub mod decay;
pub mod exhaustion;
pub mod in_fight;

use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::outcome::Outcome;
use crate::entities::creature::{CreatureId, ExhaustionType};
use crate::entities::item::ItemId;
use crate::world::time::GameTick;
use std::collections::BTreeMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionType {
    Decay,
    Exhaustion,
    InFight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConditionSubject {
    Creature(CreatureId),
    Item(ItemId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionEffect {
    Decay,
    /// Pending expiry per exhaustion kind.
    Exhaustion(BTreeMap<ExhaustionType, GameTick>),
    InFight,
}

/// Timed status effect on a creature or item. Sleeps until `end_time`,
/// then pulses once; exhaustion keeps pulsing while kinds are pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub subject: ConditionSubject,
    pub end_time: GameTick,
    pub effect: ConditionEffect,
}

impl Condition {
    pub fn decay(item: ItemId, end_time: GameTick) -> Self {
        Self {
            subject: ConditionSubject::Item(item),
            end_time,
            effect: ConditionEffect::Decay,
        }
    }

    pub fn exhaustion(creature: CreatureId, kind: ExhaustionType, until: GameTick) -> Self {
        Self {
            subject: ConditionSubject::Creature(creature),
            end_time: until,
            effect: ConditionEffect::Exhaustion(BTreeMap::from([(kind, until)])),
        }
    }

    pub fn in_fight(creature: CreatureId, end_time: GameTick) -> Self {
        Self {
            subject: ConditionSubject::Creature(creature),
            end_time,
            effect: ConditionEffect::InFight,
        }
    }

    pub fn condition_type(&self) -> ConditionType {
        match self.effect {
            ConditionEffect::Decay => ConditionType::Decay,
            ConditionEffect::Exhaustion(_) => ConditionType::Exhaustion,
            ConditionEffect::InFight => ConditionType::InFight,
        }
    }

    /// At most one condition per key is tracked at a time.
    pub fn key(&self) -> (ConditionType, ConditionSubject) {
        (self.condition_type(), self.subject)
    }

    pub fn expiries(&self) -> Option<&BTreeMap<ExhaustionType, GameTick>> {
        match &self.effect {
            ConditionEffect::Exhaustion(expiries) => Some(expiries),
            _ => None,
        }
    }

    /// Merges a newly raised condition with the same key into this one.
    /// Later end times win; exhaustion merges per kind and wakes at the
    /// earliest kind still pending.
    pub fn aggregate_with(&mut self, other: Condition) {
        if other.key() != self.key() {
            return;
        }
        match (&mut self.effect, other.effect) {
            (ConditionEffect::Exhaustion(mine), ConditionEffect::Exhaustion(theirs)) => {
                exhaustion::merge(mine, theirs);
                if let Some(earliest) = mine.values().min() {
                    self.end_time = *earliest;
                }
            }
            _ => {
                self.end_time = self.end_time.max(other.end_time);
            }
        }
    }

    pub(crate) fn execute(
        &mut self,
        repeat_after: &mut Option<Duration>,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome, EngineError> {
        let now = ctx.now();
        if now < self.end_time {
            *repeat_after = Some(now.until(self.end_time));
            return Ok(Outcome::Snoozed);
        }
        match (&mut self.effect, self.subject) {
            (ConditionEffect::Decay, ConditionSubject::Item(item)) => decay::pulse(item, ctx),
            (ConditionEffect::Exhaustion(expiries), ConditionSubject::Creature(creature)) => {
                let next = exhaustion::pulse(creature, expiries, ctx)?;
                if let Some(next) = next {
                    self.end_time = next;
                    *repeat_after = Some(now.until(next));
                }
                Ok(Outcome::Completed)
            }
            (ConditionEffect::InFight, ConditionSubject::Creature(creature)) => {
                in_fight::pulse(creature, ctx)
            }
            (effect, subject) => Err(EngineError::Fault(format!(
                "{:?} condition cannot apply to {:?}",
                effect, subject
            ))),
        }
    }
}
