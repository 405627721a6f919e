use std::time::{SystemTime, UNIX_EPOCH};

const DEFAULT_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Randomness handed to event logic. Seeded in tests so outcomes repeat.
pub trait RandomSource: Send {
    fn next_u32(&mut self) -> u32;

    fn roll_percent(&mut self, chance: u32) -> bool {
        if chance >= 100 {
            return true;
        }
        if chance == 0 {
            return false;
        }
        self.next_u32() % 100 < chance
    }

    /// Uniform value in `min..=max`; bounds are swapped if reversed.
    fn roll_range(&mut self, min: i32, max: i32) -> i32 {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let span = (i64::from(max) - i64::from(min) + 1) as u64;
        let value = u64::from(self.next_u32()) % span;
        (i64::from(min) + value as i64) as i32
    }
}

/// Linear congruential generator, same constants as the map and monster
/// rolls have always used.
#[derive(Debug, Clone, Copy)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    pub fn from_seed(seed: u64) -> Self {
        let seed = if seed == 0 { DEFAULT_SEED } else { seed };
        Self { state: seed }
    }

    pub fn from_time() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_nanos() as u64)
            .unwrap_or(DEFAULT_SEED);
        Self::from_seed(seed)
    }
}

impl Default for SeededRng {
    fn default() -> Self {
        Self { state: DEFAULT_SEED }
    }
}

impl RandomSource for SeededRng {
    fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (self.state >> 32) as u32
    }
}
