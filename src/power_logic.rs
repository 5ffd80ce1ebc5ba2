//! Idle-driven power decisions while a host is connected.

use crate::config::{DEEP_SLEEP_KEY_TIMEOUT_MS, POWER_SAVE_TIMEOUT_MS};
use crate::state::{DeviceState, PowerState};

/// What the idle timer asks for this tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IdleVerdict {
    Stay,
    EnterPowerSaving,
    /// Go to deep sleep; `revert_first` means power saving must be undone
    /// before sleeping so the next boot starts from a known profile.
    DeepSleep { idle_ms: u64, revert_first: bool },
}

/// Milliseconds since the last key activity.
pub fn idle_ms(state: &DeviceState, now: u64) -> u64 {
    now.saturating_sub(state.timing.last_key_press())
}

/// Decide the idle transition. Returns `None` while disconnected.
pub fn evaluate_idle(state: &DeviceState, now: u64) -> Option<IdleVerdict> {
    if !state.link.is_connected() {
        return None;
    }

    let idle = idle_ms(state, now);
    let verdict = if idle > DEEP_SLEEP_KEY_TIMEOUT_MS {
        IdleVerdict::DeepSleep {
            idle_ms: idle,
            revert_first: state.power_saving(),
        }
    } else if idle > POWER_SAVE_TIMEOUT_MS && !state.power_saving() {
        IdleVerdict::EnterPowerSaving
    } else {
        IdleVerdict::Stay
    };
    Some(verdict)
}

/// Switch to power saving. Returns `false` if it was already active.
pub fn enter_power_saving(state: &mut DeviceState) -> bool {
    if state.power_saving() {
        return false;
    }
    state.power = PowerState::PowerSaving;
    true
}

/// Back to full speed ahead of user input. Returns `true` if the state changed.
pub fn wake_for_activity(state: &mut DeviceState) -> bool {
    if !state.power_saving() {
        return false;
    }
    state.power = PowerState::FullSpeed;
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link_logic::observe_link;

    fn connected_at(t: u64) -> DeviceState {
        let mut state = DeviceState::boot(0);
        observe_link(&mut state, true, t);
        state
    }

    #[test]
    fn disconnected_is_not_evaluated() {
        let state = DeviceState::boot(0);
        assert_eq!(evaluate_idle(&state, 1_000_000), None);
    }

    #[test]
    fn stays_full_speed_up_to_threshold() {
        let state = connected_at(0);
        assert_eq!(evaluate_idle(&state, 0), Some(IdleVerdict::Stay));
        assert_eq!(
            evaluate_idle(&state, POWER_SAVE_TIMEOUT_MS),
            Some(IdleVerdict::Stay)
        );
        assert_eq!(
            evaluate_idle(&state, POWER_SAVE_TIMEOUT_MS + 1),
            Some(IdleVerdict::EnterPowerSaving)
        );
    }

    #[test]
    fn power_saving_is_entered_once() {
        let mut state = connected_at(0);
        assert!(enter_power_saving(&mut state));
        assert!(!enter_power_saving(&mut state));
        assert_eq!(evaluate_idle(&state, 20_000), Some(IdleVerdict::Stay));
    }

    #[test]
    fn deep_sleep_reverts_power_saving_first() {
        let mut state = connected_at(0);
        enter_power_saving(&mut state);
        assert_eq!(
            evaluate_idle(&state, DEEP_SLEEP_KEY_TIMEOUT_MS + 1),
            Some(IdleVerdict::DeepSleep {
                idle_ms: DEEP_SLEEP_KEY_TIMEOUT_MS + 1,
                revert_first: true
            })
        );
    }

    #[test]
    fn deep_sleep_from_full_speed_needs_no_revert() {
        let state = connected_at(0);
        assert_eq!(
            evaluate_idle(&state, 31_000),
            Some(IdleVerdict::DeepSleep {
                idle_ms: 31_000,
                revert_first: false
            })
        );
    }

    #[test]
    fn wake_only_changes_power_saving() {
        let mut state = connected_at(0);
        assert!(!wake_for_activity(&mut state));
        enter_power_saving(&mut state);
        assert!(wake_for_activity(&mut state));
        assert_eq!(state.power, PowerState::FullSpeed);
    }
}
