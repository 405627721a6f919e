pub mod combat;
pub mod movement;
pub mod use_item;

use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::outcome::Outcome;
use crate::entities::creature::{CreatureId, CreditKind, ExhaustionType};
use crate::entities::item::ItemId;
use crate::world::position::{Direction, Position};
use crate::world::state::World;
use crate::world::time::GameTick;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationType {
    Walk,
    AutoWalk,
    Turn,
    AutoAttack,
    SelectTarget,
    RestoreCombatCredit,
    UseItem,
    MoveItem,
}

/// Cooldown an actor accrues for a completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExhaustionCost {
    pub kind: ExhaustionType,
    pub duration: Duration,
}

impl ExhaustionCost {
    pub fn new(kind: ExhaustionType, duration: Duration) -> Self {
        Self { kind, duration }
    }
}

/// Checked in order right before an operation runs. A failing check turns
/// the pass into a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    RequestorExists,
    RequestorAlive,
    NotExhausted(ExhaustionType),
    TargetStillSelected {
        attacker: CreatureId,
        target: CreatureId,
    },
    HasCombatCredits {
        creature: CreatureId,
        credit: CreditKind,
        amount: u8,
    },
    ItemStillAt {
        item: ItemId,
        position: Position,
    },
}

impl Precondition {
    pub fn holds(&self, requestor: CreatureId, world: &World, now: GameTick) -> bool {
        match *self {
            Precondition::RequestorExists => world.creature_exists(requestor),
            Precondition::RequestorAlive => world
                .creature(requestor)
                .map_or(false, |creature| creature.stats.is_alive()),
            Precondition::NotExhausted(kind) => world
                .creature(requestor)
                .map_or(false, |creature| !creature.is_exhausted(kind, now)),
            Precondition::TargetStillSelected { attacker, target } => {
                world.creature_exists(target)
                    && world
                        .creature(attacker)
                        .map_or(false, |creature| creature.attack_target == Some(target))
            }
            Precondition::HasCombatCredits {
                creature,
                credit,
                amount,
            } => world
                .creature(creature)
                .map_or(false, |live| live.credits(credit).available >= amount),
            Precondition::ItemStillAt { item, position } => {
                world.locate_item(item) == Some(position)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationAction {
    Walk {
        direction: Direction,
    },
    AutoWalk {
        steps: VecDeque<Direction>,
    },
    Turn {
        direction: Direction,
    },
    AutoAttack {
        target: CreatureId,
    },
    SelectTarget {
        target: Option<CreatureId>,
    },
    RestoreCombatCredit {
        credit: CreditKind,
    },
    UseItem {
        item: ItemId,
        position: Position,
        /// Set once an approach walk has been scheduled.
        approaching: bool,
    },
    MoveItem {
        item: ItemId,
        from: Position,
        to: Position,
        count: u16,
    },
}

/// What an action body hands back to `Operation::execute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub outcome: Outcome,
    pub cost: Option<ExhaustionCost>,
    pub repeat_after: Option<Duration>,
}

impl ActionResult {
    pub fn completed() -> Self {
        Outcome::Completed.into()
    }

    pub fn with_cost(mut self, kind: ExhaustionType, duration: Duration) -> Self {
        self.cost = Some(ExhaustionCost::new(kind, duration));
        self
    }

    pub fn repeat_after(mut self, delay: Duration) -> Self {
        self.repeat_after = Some(delay);
        self
    }
}

impl From<Outcome> for ActionResult {
    fn from(outcome: Outcome) -> Self {
        Self {
            outcome,
            cost: None,
            repeat_after: None,
        }
    }
}

/// World-mutating work on behalf of one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub preconditions: Vec<Precondition>,
    /// The cost charged by the last completed pass.
    pub exhaustion: Option<ExhaustionCost>,
    pub action: OperationAction,
}

impl Operation {
    pub fn new(action: OperationAction, preconditions: Vec<Precondition>) -> Self {
        Self {
            preconditions,
            exhaustion: None,
            action,
        }
    }

    pub fn walk(direction: Direction) -> Self {
        Self::new(
            OperationAction::Walk { direction },
            vec![
                Precondition::RequestorExists,
                Precondition::RequestorAlive,
                Precondition::NotExhausted(ExhaustionType::Movement),
            ],
        )
    }

    pub fn auto_walk(steps: impl IntoIterator<Item = Direction>) -> Self {
        Self::new(
            OperationAction::AutoWalk {
                steps: steps.into_iter().collect(),
            },
            vec![Precondition::RequestorExists, Precondition::RequestorAlive],
        )
    }

    pub fn turn(direction: Direction) -> Self {
        Self::new(
            OperationAction::Turn { direction },
            vec![Precondition::RequestorExists],
        )
    }

    pub fn auto_attack(attacker: CreatureId, target: CreatureId) -> Self {
        Self::new(
            OperationAction::AutoAttack { target },
            vec![
                Precondition::RequestorExists,
                Precondition::TargetStillSelected { attacker, target },
                Precondition::HasCombatCredits {
                    creature: attacker,
                    credit: CreditKind::Attack,
                    amount: 1,
                },
            ],
        )
    }

    pub fn select_target(target: Option<CreatureId>) -> Self {
        Self::new(
            OperationAction::SelectTarget { target },
            vec![Precondition::RequestorExists, Precondition::RequestorAlive],
        )
    }

    /// Runs on behalf of the creature whose credits it refills.
    pub fn restore_combat_credit(credit: CreditKind) -> Self {
        Self::new(
            OperationAction::RestoreCombatCredit { credit },
            vec![Precondition::RequestorExists],
        )
    }

    pub fn use_item(item: ItemId, position: Position) -> Self {
        Self::new(
            OperationAction::UseItem {
                item,
                position,
                approaching: false,
            },
            vec![
                Precondition::RequestorExists,
                Precondition::RequestorAlive,
                Precondition::ItemStillAt { item, position },
            ],
        )
    }

    pub fn move_item(item: ItemId, from: Position, to: Position, count: u16) -> Self {
        Self::new(
            OperationAction::MoveItem {
                item,
                from,
                to,
                count,
            },
            vec![
                Precondition::RequestorExists,
                Precondition::RequestorAlive,
                Precondition::ItemStillAt {
                    item,
                    position: from,
                },
            ],
        )
    }

    pub fn operation_type(&self) -> OperationType {
        match self.action {
            OperationAction::Walk { .. } => OperationType::Walk,
            OperationAction::AutoWalk { .. } => OperationType::AutoWalk,
            OperationAction::Turn { .. } => OperationType::Turn,
            OperationAction::AutoAttack { .. } => OperationType::AutoAttack,
            OperationAction::SelectTarget { .. } => OperationType::SelectTarget,
            OperationAction::RestoreCombatCredit { .. } => OperationType::RestoreCombatCredit,
            OperationAction::UseItem { .. } => OperationType::UseItem,
            OperationAction::MoveItem { .. } => OperationType::MoveItem,
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub(crate) fn execute(
        &mut self,
        requestor: CreatureId,
        repeat_after: &mut Option<Duration>,
        ctx: &mut ExecutionContext<'_>,
    ) -> Result<Outcome, EngineError> {
        let now = ctx.now();
        let world = &*ctx.world;
        if let Some(failed) = self
            .preconditions
            .iter()
            .find(|precondition| !precondition.holds(requestor, world, now))
            .copied()
        {
            if let (OperationAction::AutoAttack { target }, Precondition::HasCombatCredits { .. }) =
                (&self.action, failed)
            {
                *repeat_after = combat::credit_retry(requestor, *target, ctx);
            }
            return Ok(Outcome::PreconditionFailed(failed));
        }

        let result = match &mut self.action {
            OperationAction::Walk { direction } => movement::walk(requestor, *direction, ctx)?,
            OperationAction::AutoWalk { steps } => movement::auto_walk(requestor, steps, ctx)?,
            OperationAction::Turn { direction } => movement::turn(requestor, *direction, ctx)?,
            OperationAction::AutoAttack { target } => combat::auto_attack(requestor, *target, ctx)?,
            OperationAction::SelectTarget { target } => {
                combat::select_target(requestor, *target, ctx)?
            }
            OperationAction::RestoreCombatCredit { credit } => {
                combat::restore_credit(requestor, *credit, ctx)?
            }
            OperationAction::UseItem {
                item,
                position,
                approaching,
            } => use_item::use_item(requestor, *item, *position, approaching, ctx)?,
            OperationAction::MoveItem {
                item,
                from,
                to,
                count,
            } => movement::move_item(requestor, *item, *from, *to, *count, ctx)?,
        };

        if result.outcome.is_completed() && !requestor.is_system() {
            if let Some(cost) = result.cost {
                ctx.charge_exhaustion(requestor, cost.kind, cost.duration);
                self.exhaustion = Some(cost);
            }
        }
        *repeat_after = result.repeat_after;
        Ok(result.outcome)
    }
}
