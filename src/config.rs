use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENGINE_CONFIG_FILE: &str = "engine.yml";
pub const WORLD_FILE: &str = "world.yml";

/// Tunables for the scheduling core. Every field has a default, so an
/// `engine.yml` only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_ms: u64,
    pub max_events_per_step: usize,
    pub lag_threshold_ms: u64,
    pub expedite_timeout_ms: u64,
    pub credit_restore_interval_ms: u64,
    pub base_attack_interval_ms: u64,
    pub fight_duration_ms: u64,
    pub block_chance_percent: u32,
    pub throw_range: u16,
    pub path_search_distance: u16,
    pub path_cache_capacity: usize,
    pub rng_seed: Option<u64>,
    pub run_for_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: 50,
            max_events_per_step: 10_000,
            lag_threshold_ms: 100,
            expedite_timeout_ms: 30_000,
            credit_restore_interval_ms: 2_000,
            base_attack_interval_ms: 2_000,
            fight_duration_ms: 60_000,
            block_chance_percent: 25,
            throw_range: 7,
            path_search_distance: 16,
            path_cache_capacity: 256,
            rng_seed: None,
            run_for_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|err| format!("invalid engine config: {}", err))
    }

    /// Reads `path` if it exists; a missing file means all defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
        Self::from_yaml_str(&text)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn lag_threshold(&self) -> Duration {
        Duration::from_millis(self.lag_threshold_ms)
    }

    pub fn expedite_timeout(&self) -> Duration {
        Duration::from_millis(self.expedite_timeout_ms)
    }

    pub fn credit_restore_interval(&self) -> Duration {
        Duration::from_millis(self.credit_restore_interval_ms.max(1))
    }

    /// Delay between two auto attacks at the given attack speed percent.
    pub fn attack_interval(&self, attack_speed: u16) -> Duration {
        let speed = u64::from(attack_speed.max(1));
        Duration::from_millis((self.base_attack_interval_ms * 100 / speed).max(1))
    }

    pub fn fight_duration(&self) -> Duration {
        Duration::from_millis(self.fight_duration_ms)
    }

    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_ms.map(Duration::from_millis)
    }
}

#[derive(Debug)]
pub struct AppConfig {
    pub root: PathBuf,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err("usage: tibia-core <world-root> [run_for_ms]".to_string());
        }

        let root = Path::new(&args[1]).to_path_buf();
        let mut engine = EngineConfig::load(&root.join(ENGINE_CONFIG_FILE))?;
        if args.len() > 2 {
            let run_for = args[2]
                .parse::<u64>()
                .map_err(|_| format!("invalid run_for_ms: {}", args[2]))?;
            engine.run_for_ms = Some(run_for);
        }
        if let Some(seed) = env_value("TIBIA_RNG_SEED") {
            engine.rng_seed = Some(
                seed.parse()
                    .map_err(|_| format!("invalid TIBIA_RNG_SEED: {}", seed))?,
            );
        }
        if let Some(tick) = env_value("TIBIA_TICK_MS") {
            engine.tick_ms = tick
                .parse()
                .map_err(|_| format!("invalid TIBIA_TICK_MS: {}", tick))?;
        }
        Ok(Self { root, engine })
    }

    pub fn world_path(&self) -> PathBuf {
        self.root.join(WORLD_FILE)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("tick_ms: 20\nrng_seed: 7\n").expect("config");
        assert_eq!(config.tick_ms, 20);
        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.expedite_timeout_ms, 30_000);
        assert_eq!(EngineConfig::from_yaml_str("  ").expect("empty"), EngineConfig::default());
        assert!(EngineConfig::from_yaml_str("tick_ms: soon").is_err());
    }

    #[test]
    fn attack_interval_scales_with_speed() {
        let config = EngineConfig::default();
        assert_eq!(config.attack_interval(100), Duration::from_millis(2_000));
        assert_eq!(config.attack_interval(200), Duration::from_millis(1_000));
        assert_eq!(config.attack_interval(0), Duration::from_millis(200_000));
    }

    #[test]
    fn args_need_a_root() {
        assert!(AppConfig::from_args(&["tibia-core".to_string()]).is_err());
        let config = AppConfig::from_args(&[
            "tibia-core".to_string(),
            "/nonexistent/root".to_string(),
            "1500".to_string(),
        ])
        .expect("config");
        assert_eq!(config.engine.run_for_ms, Some(1_500));
        assert_eq!(config.world_path(), PathBuf::from("/nonexistent/root/world.yml"));
        assert!(AppConfig::from_args(&[
            "tibia-core".to_string(),
            "/nonexistent/root".to_string(),
            "soon".to_string(),
        ])
        .is_err());
    }
}
