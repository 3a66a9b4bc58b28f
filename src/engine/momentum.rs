use chrono::{DateTime, Duration, Utc};

use crate::engine::config::EngineConfig;
use crate::models::momentum::MomentumState;

/// What `log_activity` reports back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GainOutcome {
    pub energy_gained: i32,
    pub leveled_up: bool,
}

/// Energy earned by the Nth in-period completion of a goal. Goalless
/// activities pass 1 and earn the plain base amount.
pub fn energy_for_completion(cfg: &EngineConfig, nth_completion: i32) -> i32 {
    cfg.base_energy * cfg.multiplier(nth_completion)
}

/// Adds earned energy to the state and runs the level-up loop. A single
/// large-multiplier gain can cross several thresholds at once, so this loops
/// until the remainder sits strictly below the next threshold.
pub fn absorb_energy(state: &mut MomentumState, cfg: &EngineConfig, gained: i32) -> bool {
    state.current_energy += gained;
    state.lifetime_energy += gained as i64;

    let mut leveled_up = false;
    let mut threshold = cfg.energy_for_next_level(state.current_momentum);
    while state.current_energy >= threshold {
        state.current_energy -= threshold;
        state.current_momentum += 1;
        leveled_up = true;
        threshold = cfg.energy_for_next_level(state.current_momentum);
    }

    if state.current_momentum > state.lifetime_momentum {
        state.lifetime_momentum = state.current_momentum;
    }
    leveled_up
}

/// Shield expired but decay not necessarily applied yet.
pub fn is_in_danger(state: &MomentumState, now: DateTime<Utc>) -> bool {
    now > state.shield_expires_at
}

/// Decay waits until the full UTC calendar day of the expiry has elapsed,
/// giving the user until end of day to log something.
fn decay_due(shield_expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > shield_expires_at && now.date_naive() > shield_expires_at.date_naive()
}

/// Lazily applies at most one momentum decrement for the current expiry
/// window. Rolling the shield forward past `now` is what keeps a second read
/// in the same window from docking again. Returns whether the state changed
/// and must be persisted.
pub fn settle_decay(
    state: &mut MomentumState,
    cfg: &EngineConfig,
    shield_duration: Duration,
    now: DateTime<Utc>,
) -> bool {
    if !decay_due(state.shield_expires_at, now) {
        return false;
    }
    if state.current_momentum > cfg.momentum_baseline {
        state.current_momentum -= 1;
    }
    state.shield_expires_at = now + shield_duration;
    true
}

/// Every successful activity log restarts the shield window.
pub fn reset_shield(state: &mut MomentumState, shield_duration: Duration, now: DateTime<Utc>) {
    state.shield_expires_at = now + shield_duration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn state_at(shield_expires_at: DateTime<Utc>) -> MomentumState {
        MomentumState {
            user_id: Uuid::new_v4(),
            current_energy: 0,
            current_momentum: 1,
            lifetime_energy: 0,
            lifetime_momentum: 1,
            shield_expires_at,
            updated_at: shield_expires_at,
        }
    }

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn base_gain_without_levelup() {
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 1, 1, 12));
        let leveled = absorb_energy(&mut state, &cfg, 20);
        assert!(!leveled);
        assert_eq!(state.current_energy, 20);
        assert_eq!(state.current_momentum, 1);
        assert_eq!(state.lifetime_energy, 20);
    }

    #[test]
    fn energy_always_below_threshold_after_absorb() {
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 1, 1, 12));
        for gain in [20, 320, 5, 640, 80, 20] {
            absorb_energy(&mut state, &cfg, gain);
            assert!(state.current_energy >= 0);
            assert!(state.current_energy < cfg.energy_for_next_level(state.current_momentum));
        }
    }

    #[test]
    fn one_big_gain_can_cross_multiple_levels() {
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 1, 1, 12));
        // 100 + 125 = 225 clears two thresholds exactly, third level needs 150
        let leveled = absorb_energy(&mut state, &cfg, 300);
        assert!(leveled);
        assert_eq!(state.current_momentum, 3);
        assert_eq!(state.current_energy, 75);
        assert_eq!(state.lifetime_momentum, 3);
    }

    #[test]
    fn lifetime_energy_is_monotonic() {
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 1, 1, 12));
        let mut last = 0i64;
        for gain in [20, 40, 80, 160, 320, 20] {
            absorb_energy(&mut state, &cfg, gain);
            assert!(state.lifetime_energy >= last);
            last = state.lifetime_energy;
        }
        assert_eq!(last, 640);
    }

    #[test]
    fn lifetime_momentum_tracks_peak_across_decay() {
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 1, 1, 12));
        absorb_energy(&mut state, &cfg, 300);
        assert_eq!(state.lifetime_momentum, 3);

        // Decay two windows apart, then a small gain: peak must survive
        let duration = Duration::hours(48);
        assert!(settle_decay(&mut state, &cfg, duration, at(2025, 1, 3, 12)));
        assert_eq!(state.current_momentum, 2);
        absorb_energy(&mut state, &cfg, 20);
        assert_eq!(state.lifetime_momentum, 3);
    }

    #[test]
    fn spec_example_three_runs_in_a_week() {
        // base=20, threshold=100: 20 + 40 + 80 = 140 -> one level-up, 40 left
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 1, 1, 12));
        let mut any_leveled = false;
        for nth in 1..=3 {
            let gained = energy_for_completion(&cfg, nth);
            any_leveled |= absorb_energy(&mut state, &cfg, gained);
        }
        assert!(any_leveled);
        assert_eq!(state.lifetime_energy, 140);
        assert_eq!(state.current_momentum, 2);
        assert_eq!(state.current_energy, 40);
    }

    #[test]
    fn multiplier_resets_at_period_boundary() {
        use crate::engine::period::settled_completions;
        let cfg = EngineConfig::default();

        // Three completions within one period double each time
        let mut completions = 0;
        for expected in [20, 40, 80] {
            let nth = completions + 1;
            assert_eq!(energy_for_completion(&cfg, nth), expected);
            completions = nth;
        }

        // Counter written in period 0, read in period 1: back to base
        let settled = settled_completions(0, completions, 1);
        assert_eq!(settled, 0);
        assert_eq!(energy_for_completion(&cfg, settled + 1), 20);
    }

    #[test]
    fn danger_starts_at_expiry_decay_waits_for_end_of_day() {
        let cfg = EngineConfig::default();
        let expires = at(2025, 3, 10, 9);
        let mut state = state_at(expires);
        state.current_momentum = 5;

        // Same day, past expiry: danger but no decay yet
        let later_same_day = at(2025, 3, 10, 23);
        assert!(is_in_danger(&state, later_same_day));
        assert!(!settle_decay(&mut state, &cfg, Duration::hours(56), later_same_day));
        assert_eq!(state.current_momentum, 5);

        // Next day: decay fires once
        let next_day = at(2025, 3, 11, 1);
        assert!(settle_decay(&mut state, &cfg, Duration::hours(56), next_day));
        assert_eq!(state.current_momentum, 4);
        assert!(!is_in_danger(&state, next_day));
    }

    #[test]
    fn decay_applies_once_per_window() {
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 3, 10, 9));
        state.current_momentum = 5;
        let duration = Duration::hours(56);

        let first_read = at(2025, 3, 12, 8);
        assert!(settle_decay(&mut state, &cfg, duration, first_read));
        // Second read shortly after must be a no-op
        let second_read = at(2025, 3, 12, 9);
        assert!(!settle_decay(&mut state, &cfg, duration, second_read));
        assert_eq!(state.current_momentum, 4);
    }

    #[test]
    fn decay_never_drops_below_baseline() {
        let cfg = EngineConfig::default();
        let mut state = state_at(at(2025, 3, 10, 9));
        assert_eq!(state.current_momentum, cfg.momentum_baseline);
        assert!(settle_decay(&mut state, &cfg, Duration::hours(24), at(2025, 3, 12, 9)));
        assert_eq!(state.current_momentum, cfg.momentum_baseline);
    }

    #[test]
    fn logging_resets_the_shield() {
        let now = at(2025, 3, 10, 9);
        let mut state = state_at(now - Duration::hours(2));
        assert!(is_in_danger(&state, now));
        reset_shield(&mut state, Duration::hours(56), now);
        assert!(!is_in_danger(&state, now));
        assert_eq!(state.shield_expires_at, now + Duration::hours(56));
    }
}
