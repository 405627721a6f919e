use crate::engine::event::{EventId, EventTag};
use crate::engine::expedite::ExpediteTrigger;
use crate::entities::creature::CreatureId;
use crate::operations::Precondition;
use crate::world::time::GameTick;

/// Why an operation stopped short without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    NoWay,
    OutOfRange,
    TargetLost,
    NotUsable,
    NotMovable,
    NotEnoughRoom,
    CreatureGone,
    ItemGone,
}

/// Result of one execution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    PreconditionFailed(Precondition),
    Blocked(BlockReason),
    /// Waiting for the trigger; the scheduler parks the event meanwhile.
    Deferred(ExpediteTrigger),
    /// Woke too early; `repeat_after` holds the remaining wait.
    Snoozed,
    /// Execution returned an error or panicked; the event was dropped.
    Faulted(String),
}

impl Outcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed)
    }

    /// Zero-cost outcomes: nothing was charged and the world is untouched.
    pub fn is_no_op(&self) -> bool {
        matches!(
            self,
            Outcome::PreconditionFailed(_) | Outcome::Blocked(_) | Outcome::Snoozed
        )
    }
}

/// What callbacks and step reports see after an event ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReport {
    pub event_id: EventId,
    pub requestor: CreatureId,
    pub tag: EventTag,
    pub outcome: Outcome,
    pub executed_at: GameTick,
    /// Set when the event went back into the queue through `repeat_after`.
    pub rescheduled_at: Option<GameTick>,
}
