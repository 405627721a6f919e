use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub health: u32,
    pub max_health: u32,
}

impl Stats {
    pub fn with_health(max_health: u32) -> Self {
        Self {
            health: max_health,
            max_health,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn apply_raw_damage(&mut self, amount: u32) -> u32 {
        let applied = amount.min(self.health);
        self.health = self.health.saturating_sub(applied);
        applied
    }

    pub fn apply_heal(&mut self, amount: u32) -> u32 {
        if self.max_health == 0 {
            return 0;
        }
        let before = self.health;
        let new = before.saturating_add(amount).min(self.max_health);
        self.health = new;
        new.saturating_sub(before)
    }

    /// Health change in the client's sign convention: positive hurts,
    /// negative heals. Returns the amount actually applied, same sign.
    pub fn apply_signed(&mut self, damage: i32) -> i32 {
        if damage >= 0 {
            self.apply_raw_damage(damage as u32) as i32
        } else {
            -(self.apply_heal(damage.unsigned_abs()) as i32)
        }
    }

    pub fn health_percent(&self) -> u8 {
        if self.max_health == 0 {
            return 0;
        }
        ((u64::from(self.health) * 100) / u64::from(self.max_health)).min(100) as u8
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::with_health(150)
    }
}
