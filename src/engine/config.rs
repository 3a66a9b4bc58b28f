use chrono::Duration;
use std::env;
use std::str::FromStr;

/// Gamification tunables. Shapes are fixed by the product rules, the
/// constants are deployment configuration read from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Energy granted for a single logged activity before multipliers.
    pub base_energy: i32,
    /// Ceiling on the weekly repeat-completion multiplier.
    pub multiplier_cap: i32,
    /// Starting momentum level, also the decay floor.
    pub momentum_baseline: i32,
    /// Energy needed to leave the baseline level.
    pub level_base: i32,
    /// Additional energy required per level above the baseline.
    pub level_step: i32,
    pub shield_base_window_hours: i64,
    pub shield_min_hours: i64,
    pub shield_max_hours: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            base_energy: 20,
            multiplier_cap: 16,
            momentum_baseline: 1,
            level_base: 100,
            level_step: 25,
            shield_base_window_hours: 168,
            shield_min_hours: 24,
            shield_max_hours: 168,
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = EngineConfig::default();
        EngineConfig {
            base_energy: env_or("BASE_ENERGY", defaults.base_energy),
            multiplier_cap: env_or("MULTIPLIER_CAP", defaults.multiplier_cap),
            momentum_baseline: env_or("MOMENTUM_BASELINE", defaults.momentum_baseline),
            level_base: env_or("LEVEL_BASE_ENERGY", defaults.level_base),
            level_step: env_or("LEVEL_STEP_ENERGY", defaults.level_step),
            shield_base_window_hours: env_or("SHIELD_BASE_WINDOW_HOURS", defaults.shield_base_window_hours),
            shield_min_hours: env_or("SHIELD_MIN_HOURS", defaults.shield_min_hours),
            shield_max_hours: env_or("SHIELD_MAX_HOURS", defaults.shield_max_hours),
        }
    }

    /// Threshold curve for leveling up. Linear in the level, never decreasing.
    pub fn energy_for_next_level(&self, momentum: i32) -> i32 {
        let above_baseline = (momentum - self.momentum_baseline).max(0);
        self.level_base + self.level_step * above_baseline
    }

    /// Multiplier for the Nth completion of the same goal within one period:
    /// doubles each repeat, capped.
    pub fn multiplier(&self, nth_completion: i32) -> i32 {
        let exponent = (nth_completion - 1).clamp(0, 30) as u32;
        ((1i64 << exponent).min(self.multiplier_cap as i64)) as i32
    }

    /// Shield window derived from the most demanding active goal: the more
    /// often a user has committed to train, the shorter their grace window.
    pub fn shield_duration(&self, max_active_frequency: i32) -> Duration {
        let frequency = max_active_frequency.max(1) as i64;
        let hours = (self.shield_base_window_hours / frequency)
            .clamp(self.shield_min_hours, self.shield_max_hours);
        Duration::hours(hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplier_doubles_then_caps() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.multiplier(1), 1);
        assert_eq!(cfg.multiplier(2), 2);
        assert_eq!(cfg.multiplier(3), 4);
        assert_eq!(cfg.multiplier(4), 8);
        assert_eq!(cfg.multiplier(5), 16);
        assert_eq!(cfg.multiplier(6), 16);
        assert_eq!(cfg.multiplier(50), 16);
    }

    #[test]
    fn threshold_curve_is_monotonic() {
        let cfg = EngineConfig::default();
        let mut previous = 0;
        for momentum in 1..40 {
            let threshold = cfg.energy_for_next_level(momentum);
            assert!(threshold >= previous);
            previous = threshold;
        }
    }

    #[test]
    fn threshold_below_baseline_does_not_shrink() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.energy_for_next_level(0), cfg.level_base);
        assert_eq!(cfg.energy_for_next_level(1), cfg.level_base);
    }

    #[test]
    fn shield_duration_scales_with_frequency_and_clamps() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.shield_duration(1), Duration::hours(168));
        assert_eq!(cfg.shield_duration(3), Duration::hours(56));
        assert_eq!(cfg.shield_duration(7), Duration::hours(24));
        // High frequency bottoms out at the one-day minimum
        assert_eq!(cfg.shield_duration(30), Duration::hours(24));
        // No active goals: treated as frequency 1
        assert_eq!(cfg.shield_duration(0), Duration::hours(168));
    }
}
