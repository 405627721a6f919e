use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Simulation time in milliseconds since the engine started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameTick(pub u64);

impl GameTick {
    pub const ZERO: GameTick = GameTick(0);

    pub fn from_millis(millis: u64) -> Self {
        GameTick(millis)
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn after(self, delay: Duration) -> Self {
        let millis = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        GameTick(self.0.saturating_add(millis))
    }

    /// Time left until `later`; zero once `later` has passed.
    pub fn until(self, later: GameTick) -> Duration {
        Duration::from_millis(later.0.saturating_sub(self.0))
    }
}

impl std::fmt::Display for GameTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t+{}ms", self.0)
    }
}

/// Source of the current simulation time. Event logic reads time only
/// through this.
pub trait Clock: Send + Sync {
    fn now(&self) -> GameTick;
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn new(start: GameTick) -> Self {
        Self {
            millis: AtomicU64::new(start.0),
        }
    }

    pub fn advance(&self, delta: Duration) -> GameTick {
        let millis = delta.as_millis().min(u128::from(u64::MAX)) as u64;
        let previous = self.millis.fetch_add(millis, Ordering::SeqCst);
        GameTick(previous.saturating_add(millis))
    }

    /// Jumps forward to `tick`. Never moves the clock back.
    pub fn set(&self, tick: GameTick) -> GameTick {
        let previous = self.millis.fetch_max(tick.0, Ordering::SeqCst);
        GameTick(previous.max(tick.0))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> GameTick {
        GameTick(self.millis.load(Ordering::SeqCst))
    }
}

/// Monotonic clock anchored at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> GameTick {
        let elapsed = self.started.elapsed().as_millis();
        GameTick(elapsed.min(u128::from(u64::MAX)) as u64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cooldown {
    ready_at: GameTick,
}

impl Cooldown {
    pub fn new(ready_at: GameTick) -> Self {
        Self { ready_at }
    }

    pub fn ready_at(&self) -> GameTick {
        self.ready_at
    }

    pub fn is_ready(&self, now: GameTick) -> bool {
        now >= self.ready_at
    }

    pub fn remaining(&self, now: GameTick) -> Duration {
        now.until(self.ready_at)
    }

    /// Pushes the ready time out to `ready_at` if that is later.
    pub fn extend_to(&mut self, ready_at: GameTick) {
        if ready_at > self.ready_at {
            self.ready_at = ready_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_only_when_told() {
        let clock = ManualClock::new(GameTick(100));
        assert_eq!(clock.now(), GameTick(100));
        assert_eq!(clock.advance(Duration::from_millis(250)), GameTick(350));
        assert_eq!(clock.now(), GameTick(350));
        assert_eq!(clock.set(GameTick(10)), GameTick(350));
        assert_eq!(clock.now(), GameTick(350));
        assert_eq!(clock.set(GameTick(1_000)), GameTick(1_000));
    }

    #[test]
    fn until_saturates_at_zero() {
        assert_eq!(GameTick(500).until(GameTick(200)), Duration::ZERO);
        assert_eq!(GameTick(200).until(GameTick(500)), Duration::from_millis(300));
    }

    #[test]
    fn cooldown_extends_but_never_shrinks() {
        let mut cooldown = Cooldown::new(GameTick(2_000));
        assert!(!cooldown.is_ready(GameTick(1_999)));
        assert!(cooldown.is_ready(GameTick(2_000)));
        cooldown.extend_to(GameTick(1_000));
        assert_eq!(cooldown.ready_at(), GameTick(2_000));
        cooldown.extend_to(GameTick(3_000));
        assert_eq!(cooldown.remaining(GameTick(2_500)), Duration::from_millis(500));
    }
}
