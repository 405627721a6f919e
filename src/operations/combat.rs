use crate::conditions::in_fight;
use crate::engine::context::ExecutionContext;
use crate::engine::error::EngineError;
use crate::engine::event::{Event, PartitionKey};
use crate::engine::notification::{
    MagicEffect, Notification, NotificationPayload, TEXT_COLOR_BLUE, TEXT_COLOR_LIGHT_GREEN,
    TEXT_COLOR_LIGHT_GREY, TEXT_COLOR_ORANGE, TEXT_COLOR_PURPLE, TEXT_COLOR_RED,
};
use crate::engine::outcome::{BlockReason, Outcome};
use crate::entities::creature::{BloodType, CreatureId, CreditKind, ExhaustionType};
use crate::operations::{ActionResult, Operation, OperationType, Precondition};
use std::time::Duration;

const MELEE_RANGE: u16 = 1;

/// Effect and text colour for a hit. Positive damage hurts, zero was
/// blocked, negative heals. No colour means no text.
pub fn hit_effect(damage: i32, blood: BloodType) -> (MagicEffect, Option<u8>) {
    if damage < 0 {
        return (MagicEffect::BlueShimmer, Some(TEXT_COLOR_BLUE));
    }
    if damage == 0 {
        return (MagicEffect::Puff, None);
    }
    match blood {
        BloodType::Blood => (MagicEffect::DrawBlood, Some(TEXT_COLOR_RED)),
        BloodType::Slime => (MagicEffect::Poison, Some(TEXT_COLOR_LIGHT_GREEN)),
        BloodType::Bones => (MagicEffect::BoneHit, Some(TEXT_COLOR_LIGHT_GREY)),
        BloodType::Fire => (MagicEffect::HitByFire, Some(TEXT_COLOR_ORANGE)),
        BloodType::Energy => (MagicEffect::EnergyHit, Some(TEXT_COLOR_PURPLE)),
    }
}

/// One melee swing. Keeps the attack loop going while the target stays
/// selected.
pub(super) fn auto_attack(
    requestor: CreatureId,
    target: CreatureId,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    let Some(attacker) = ctx.world.creature(requestor) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone).into());
    };
    let attacker_position = attacker.position;
    let attacker_direction = attacker.direction;
    let attack = i32::from(attacker.attack);
    let interval = ctx.config.attack_interval(attacker.attack_speed);
    let Some(victim) = ctx.world.creature(target) else {
        return Ok(Outcome::Blocked(BlockReason::TargetLost).into());
    };
    let target_position = victim.position;
    if !attacker_position.is_within(target_position, MELEE_RANGE) {
        return Ok(Outcome::Blocked(BlockReason::OutOfRange).into());
    }

    if let Some(attacker) = ctx.world.creature_mut(requestor) {
        if !attacker.credits_mut(CreditKind::Attack).consume(1) {
            return Ok(Outcome::PreconditionFailed(Precondition::HasCombatCredits {
                creature: requestor,
                credit: CreditKind::Attack,
                amount: 1,
            })
            .into());
        }
    }
    let block_chance = ctx.config.block_chance_percent;
    let defended = ctx
        .world
        .creature_mut(target)
        .map_or(false, |victim| victim.credits_mut(CreditKind::Defense).consume(1));
    let blocked = defended && ctx.rng.roll_percent(block_chance);
    let damage = if blocked {
        0
    } else {
        let armor = ctx
            .world
            .creature(target)
            .map_or(0, |victim| i32::from(victim.armor));
        (ctx.rng.roll_range(0, attack) - armor).max(0)
    };

    let Some(victim) = ctx.world.creature_mut(target) else {
        return Ok(Outcome::Blocked(BlockReason::TargetLost).into());
    };
    let applied = victim.stats.apply_signed(damage);
    let health_percent = victim.stats.health_percent();
    let alive = victim.stats.is_alive();
    let (effect, color) = hit_effect(applied, victim.blood);

    ctx.notify(Notification::spectators(
        target_position,
        NotificationPayload::MagicEffect(effect),
    ));
    if let Some(color) = color {
        ctx.notify(Notification::spectators(
            target_position,
            NotificationPayload::AnimatedText {
                color,
                text: applied.unsigned_abs().to_string(),
            },
        ));
    }
    ctx.notify(Notification::spectators(
        target_position,
        NotificationPayload::CreatureHealth {
            creature: target,
            health_percent,
        },
    ));
    in_fight::enter(requestor, ctx);
    in_fight::enter(target, ctx);

    if !alive {
        ctx.world.remove_creature(target);
        ctx.notify(Notification::spectators(
            target_position,
            NotificationPayload::CreatureRemoved { creature: target },
        ));
    }

    if let Some(facing) = attacker_position.direction_to(target_position) {
        if facing != attacker_direction {
            ctx.schedule(
                Event::operation(requestor, Operation::turn(facing)),
                Duration::ZERO,
            );
        }
    }

    let still_targeting = ctx
        .world
        .creature(requestor)
        .map_or(false, |attacker| attacker.attack_target == Some(target));
    if still_targeting {
        ctx.schedule(
            Event::operation(requestor, Operation::auto_attack(requestor, target)),
            interval,
        );
    }
    Ok(ActionResult::completed().with_cost(ExhaustionType::Combat, interval))
}

/// When the next swing is due after running out of attack credits. Nothing
/// while the target is gone, deselected or out of reach.
pub(super) fn credit_retry(
    requestor: CreatureId,
    target: CreatureId,
    ctx: &ExecutionContext<'_>,
) -> Option<Duration> {
    let attacker = ctx.world.creature(requestor)?;
    let victim = ctx.world.creature(target)?;
    if attacker.attack_target != Some(target)
        || !attacker.position.is_within(victim.position, MELEE_RANGE)
    {
        return None;
    }
    let interval = ctx.config.attack_interval(attacker.attack_speed);
    Some(interval.max(ctx.config.credit_restore_interval()))
}

/// Switches the attack target, dropping any queued swings at the old one.
pub(super) fn select_target(
    requestor: CreatureId,
    target: Option<CreatureId>,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    if let Some(target) = target {
        if target == requestor || !ctx.world.creature_exists(target) {
            return Ok(Outcome::Blocked(BlockReason::TargetLost).into());
        }
    }
    let Some(attacker) = ctx.world.creature_mut(requestor) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone).into());
    };
    attacker.attack_target = target;
    ctx.cancel_all_for(PartitionKey::new(requestor, OperationType::AutoAttack));
    if let Some(target) = target {
        ctx.schedule(
            Event::operation(requestor, Operation::auto_attack(requestor, target)),
            Duration::ZERO,
        );
    }
    Ok(ActionResult::completed())
}

/// Refills one credit and re-arms itself for as long as the creature lives.
pub(super) fn restore_credit(
    requestor: CreatureId,
    credit: CreditKind,
    ctx: &mut ExecutionContext<'_>,
) -> Result<ActionResult, EngineError> {
    let interval = ctx.config.credit_restore_interval();
    let Some(creature) = ctx.world.creature_mut(requestor) else {
        return Ok(Outcome::Blocked(BlockReason::CreatureGone).into());
    };
    creature.credits_mut(credit).restore(1);
    Ok(ActionResult::completed().repeat_after(interval))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::SchedulerCommand;
    use crate::entities::creature::CombatCredits;
    use crate::operations::test_support::*;
    use crate::operations::OperationAction;
    use crate::world::time::GameTick;

    fn duel() -> crate::world::state::World {
        let mut world = field();
        spawn(&mut world, 1, at(4, 4));
        spawn(&mut world, 2, at(5, 4));
        if let Some(knight) = world.creature_mut(CreatureId(1)) {
            knight.attack_target = Some(CreatureId(2));
            knight.direction = crate::world::position::Direction::East;
        }
        world
    }

    #[test]
    fn effect_follows_damage_sign_and_blood() {
        assert_eq!(hit_effect(0, BloodType::Blood), (MagicEffect::Puff, None));
        assert_eq!(
            hit_effect(12, BloodType::Slime),
            (MagicEffect::Poison, Some(TEXT_COLOR_LIGHT_GREEN))
        );
        assert_eq!(
            hit_effect(-5, BloodType::Fire),
            (MagicEffect::BlueShimmer, Some(TEXT_COLOR_BLUE))
        );
    }

    #[test]
    fn swing_consumes_credits_and_rearms() {
        let mut world = duel();
        let (result, effects) = with_context(&mut world, GameTick(0), |ctx| {
            auto_attack(CreatureId(1), CreatureId(2), ctx).expect("attack")
        });
        assert_eq!(result.outcome, Outcome::Completed);
        assert_eq!(
            result.cost.map(|cost| cost.kind),
            Some(ExhaustionType::Combat)
        );
        let knight = world.creature(CreatureId(1)).expect("knight");
        assert_eq!(knight.attack_credits.available, 0);
        assert!(knight.in_fight);
        let rat = world.creature(CreatureId(2)).expect("rat");
        assert_eq!(rat.defense_credits.available, 0);
        assert!(rat.in_fight);
        let rearmed = effects.commands.iter().any(|command| {
            matches!(
                command,
                SchedulerCommand::Schedule { event, delay }
                    if *delay == Duration::from_millis(2_000)
                        && event.as_operation().map(|op| op.operation_type()) == Some(OperationType::AutoAttack)
            )
        });
        assert!(rearmed);
        let turned = effects.commands.iter().any(|command| {
            matches!(command, SchedulerCommand::Schedule { event, .. }
                if event.as_operation().map(|op| op.operation_type()) == Some(OperationType::Turn))
        });
        assert!(!turned, "already facing the target");
    }

    #[test]
    fn lethal_hit_removes_target_and_ends_loop() {
        let mut world = duel();
        if let Some(rat) = world.creature_mut(CreatureId(2)) {
            rat.stats.health = 1;
            rat.defense_credits = CombatCredits::full(0);
        }
        if let Some(knight) = world.creature_mut(CreatureId(1)) {
            knight.attack = 50;
        }
        let (result, effects) = with_context(&mut world, GameTick(0), |ctx| {
            auto_attack(CreatureId(1), CreatureId(2), ctx).expect("attack")
        });
        assert_eq!(result.outcome, Outcome::Completed);
        assert!(!world.creature_exists(CreatureId(2)));
        assert_eq!(world.creature(CreatureId(1)).and_then(|c| c.attack_target), None);
        assert!(effects.notifications.iter().any(|n| matches!(
            n.payload,
            NotificationPayload::CreatureRemoved { creature } if creature == CreatureId(2)
        )));
        let rearmed = effects.commands.iter().any(|command| {
            matches!(command, SchedulerCommand::Schedule { event, .. }
                if event.as_operation().map(|op| op.operation_type()) == Some(OperationType::AutoAttack))
        });
        assert!(!rearmed);
    }

    #[test]
    fn out_of_reach_target_is_blocked() {
        let mut world = field();
        spawn(&mut world, 1, at(1, 1));
        spawn(&mut world, 2, at(4, 1));
        let (result, _) = with_context(&mut world, GameTick(0), |ctx| {
            auto_attack(CreatureId(1), CreatureId(2), ctx).expect("attack")
        });
        assert_eq!(result.outcome, Outcome::Blocked(BlockReason::OutOfRange));
        assert_eq!(world.creature(CreatureId(1)).map(|c| c.attack_credits.available), Some(1));
    }

    #[test]
    fn selecting_a_target_replaces_the_loop() {
        let mut world = duel();
        let (result, effects) = with_context(&mut world, GameTick(0), |ctx| {
            select_target(CreatureId(1), Some(CreatureId(2)), ctx).expect("select")
        });
        assert_eq!(result.outcome, Outcome::Completed);
        assert!(matches!(
            &effects.commands[0],
            SchedulerCommand::CancelAllFor(key) if key.operation_type == OperationType::AutoAttack
        ));
        match &effects.commands[1] {
            SchedulerCommand::Schedule { event, delay } => {
                assert_eq!(*delay, Duration::ZERO);
                assert!(matches!(
                    event.as_operation().map(|op| &op.action),
                    Some(OperationAction::AutoAttack { target }) if *target == CreatureId(2)
                ));
            }
            other => panic!("unexpected command {:?}", other),
        }
        let (result, _) = with_context(&mut world, GameTick(0), |ctx| {
            select_target(CreatureId(1), Some(CreatureId(1)), ctx).expect("self")
        });
        assert_eq!(result.outcome, Outcome::Blocked(BlockReason::TargetLost));
    }

    #[test]
    fn restore_adds_one_credit_and_repeats() {
        let mut world = duel();
        if let Some(knight) = world.creature_mut(CreatureId(1)) {
            knight.attack_credits = CombatCredits { available: 0, max: 2 };
        }
        let (result, _) = with_context(&mut world, GameTick(0), |ctx| {
            restore_credit(CreatureId(1), CreditKind::Attack, ctx).expect("restore")
        });
        assert_eq!(result.repeat_after, Some(Duration::from_millis(2_000)));
        assert_eq!(world.creature(CreatureId(1)).map(|c| c.attack_credits.available), Some(1));
    }
}
