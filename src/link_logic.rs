//! Link-state edge detection and the disconnected deep-sleep timer.

use crate::config::{DISCONNECTED_TIMEOUT_MS, LINK_BLINK_HALF_PERIOD_MS};
use crate::state::{DeviceState, LinkState};

/// A change of link state seen between two ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkEdge {
    Connected,
    Disconnected,
}

/// Compare the transport's status with the last tick and record edges.
///
/// Connecting restarts both the key idle timer and the link timer;
/// disconnecting restarts only the link timer.
pub fn observe_link(state: &mut DeviceState, connected: bool, now: u64) -> Option<LinkEdge> {
    match (state.link, connected) {
        (LinkState::Disconnected, true) => {
            state.link = LinkState::Connected;
            state.timing.record_key_activity(now);
            state.timing.record_link_change(now);
            Some(LinkEdge::Connected)
        }
        (LinkState::Connected, false) => {
            state.link = LinkState::Disconnected;
            state.timing.record_link_change(now);
            Some(LinkEdge::Disconnected)
        }
        _ => None,
    }
}

/// Link LED level while waiting for a host: on/off every 500 ms.
pub fn link_blink_level(now: u64) -> bool {
    (now / LINK_BLINK_HALF_PERIOD_MS) % 2 == 1
}

/// Outcome of the disconnected timer for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GuardVerdict {
    /// Keep advertising; drive the link LED to `indicator_on`.
    Waiting { indicator_on: bool, elapsed_ms: u64 },
    /// No host for too long.
    DeepSleep { elapsed_ms: u64 },
}

/// Evaluate the disconnected timer. Returns `None` while connected.
pub fn guard_disconnected(state: &DeviceState, now: u64) -> Option<GuardVerdict> {
    if state.link.is_connected() {
        return None;
    }

    let elapsed_ms = now.saturating_sub(state.timing.last_connected());
    if elapsed_ms > DISCONNECTED_TIMEOUT_MS {
        Some(GuardVerdict::DeepSleep { elapsed_ms })
    } else {
        Some(GuardVerdict::Waiting {
            indicator_on: link_blink_level(now),
            elapsed_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_edge_resets_both_timers() {
        let mut state = DeviceState::boot(0);
        assert_eq!(observe_link(&mut state, true, 5_000), Some(LinkEdge::Connected));
        assert_eq!(state.link, LinkState::Connected);
        assert_eq!(state.timing.last_key_press(), 5_000);
        assert_eq!(state.timing.last_connected(), 5_000);
    }

    #[test]
    fn disconnect_edge_keeps_key_timer() {
        let mut state = DeviceState::boot(0);
        observe_link(&mut state, true, 1_000);
        assert_eq!(
            observe_link(&mut state, false, 9_000),
            Some(LinkEdge::Disconnected)
        );
        assert_eq!(state.timing.last_key_press(), 1_000);
        assert_eq!(state.timing.last_connected(), 9_000);
    }

    #[test]
    fn steady_link_has_no_edge() {
        let mut state = DeviceState::boot(0);
        assert_eq!(observe_link(&mut state, false, 100), None);
        observe_link(&mut state, true, 200);
        let before = state;
        assert_eq!(observe_link(&mut state, true, 300), None);
        assert_eq!(state, before);
    }

    #[test]
    fn blink_toggles_every_half_second() {
        assert!(!link_blink_level(0));
        assert!(!link_blink_level(499));
        assert!(link_blink_level(500));
        assert!(link_blink_level(999));
        assert!(!link_blink_level(1_000));
    }

    #[test]
    fn guard_is_inactive_while_connected() {
        let mut state = DeviceState::boot(0);
        observe_link(&mut state, true, 0);
        assert_eq!(guard_disconnected(&state, 500_000), None);
    }

    #[test]
    fn guard_boundary_is_exclusive() {
        let state = DeviceState::boot(1_000);
        assert!(matches!(
            guard_disconnected(&state, 1_000 + DISCONNECTED_TIMEOUT_MS),
            Some(GuardVerdict::Waiting { .. })
        ));
        assert_eq!(
            guard_disconnected(&state, 1_001 + DISCONNECTED_TIMEOUT_MS),
            Some(GuardVerdict::DeepSleep {
                elapsed_ms: DISCONNECTED_TIMEOUT_MS + 1
            })
        );
    }
}
