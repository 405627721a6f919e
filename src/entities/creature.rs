use crate::entities::stats::Stats;
use crate::world::position::{Direction, Position};
use crate::world::time::{Cooldown, GameTick};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CreatureId(pub u32);

impl CreatureId {
    /// Requestor id of events the server raises on its own.
    pub const SYSTEM: CreatureId = CreatureId(0);

    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatureKind {
    Player,
    Npc,
    Monster,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloodType {
    #[default]
    Blood,
    Slime,
    Bones,
    Fire,
    Energy,
}

/// Per-category cooldown an actor accrues after acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionType {
    Combat,
    Movement,
    Magic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditKind {
    Attack,
    Defense,
}

/// Token bucket for one kind of combat action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatCredits {
    pub available: u8,
    pub max: u8,
}

impl CombatCredits {
    pub fn full(max: u8) -> Self {
        Self { available: max, max }
    }

    pub fn consume(&mut self, amount: u8) -> bool {
        if self.available < amount {
            return false;
        }
        self.available -= amount;
        true
    }

    pub fn restore(&mut self, amount: u8) -> u8 {
        let before = self.available;
        self.available = self.available.saturating_add(amount).min(self.max);
        self.available - before
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creature {
    pub id: CreatureId,
    pub name: String,
    pub kind: CreatureKind,
    pub position: Position,
    pub direction: Direction,
    pub stats: Stats,
    pub speed: u16,
    pub blood: BloodType,
    pub attack: u16,
    pub armor: u16,
    /// Percent of the base attack rate; 100 is normal.
    pub attack_speed: u16,
    pub attack_credits: CombatCredits,
    pub defense_credits: CombatCredits,
    pub attack_target: Option<CreatureId>,
    pub in_fight: bool,
    pub exhaustion: BTreeMap<ExhaustionType, Cooldown>,
}

impl Creature {
    pub fn new(id: CreatureId, name: impl Into<String>, kind: CreatureKind, position: Position) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            position,
            direction: Direction::South,
            stats: Stats::default(),
            speed: 220,
            blood: BloodType::Blood,
            attack: 10,
            armor: 0,
            attack_speed: 100,
            attack_credits: CombatCredits::full(1),
            defense_credits: CombatCredits::full(1),
            attack_target: None,
            in_fight: false,
            exhaustion: BTreeMap::new(),
        }
    }

    pub fn credits_mut(&mut self, kind: CreditKind) -> &mut CombatCredits {
        match kind {
            CreditKind::Attack => &mut self.attack_credits,
            CreditKind::Defense => &mut self.defense_credits,
        }
    }

    pub fn credits(&self, kind: CreditKind) -> CombatCredits {
        match kind {
            CreditKind::Attack => self.attack_credits,
            CreditKind::Defense => self.defense_credits,
        }
    }

    pub fn is_exhausted(&self, kind: ExhaustionType, now: GameTick) -> bool {
        self.exhaustion
            .get(&kind)
            .map_or(false, |cooldown| !cooldown.is_ready(now))
    }

    pub fn exhausted_until(&self, kind: ExhaustionType) -> Option<GameTick> {
        self.exhaustion.get(&kind).map(Cooldown::ready_at)
    }

    /// Active exhaustion kinds as the client's status bitmask.
    pub fn status_flags(&self, now: GameTick) -> u8 {
        let mut flags = 0u8;
        if self.in_fight {
            flags |= 0x01;
        }
        for (kind, cooldown) in &self.exhaustion {
            if cooldown.is_ready(now) {
                continue;
            }
            flags |= match kind {
                ExhaustionType::Combat => 0x02,
                ExhaustionType::Movement => 0x04,
                ExhaustionType::Magic => 0x08,
            };
        }
        flags
    }
}
