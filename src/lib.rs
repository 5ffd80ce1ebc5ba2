//! Host-testable core of the pony-keeb firmware.
//!
//! Every time-based decision of the keyboard lives here: link tracking,
//! idle power scaling, deep-sleep timeouts, short/long press
//! classification and bond reset.  Nothing in this library touches
//! hardware, so it builds and tests on the host.
//!
//! Usage: `cargo test --lib` and `cargo test --test integration`
//!
//! Note: The embedded binary uses main.rs with #![no_std] and #![no_main]
//! and links against this library for its control logic.

#![cfg_attr(not(test), no_std)]

pub mod bond_record;
pub mod button_logic;
pub mod config;
pub mod controller;
pub mod hid;
pub mod link_logic;
pub mod power_logic;
pub mod state;

// The embedded `ble` module lives next to this file; only its pure
// payload builder is shared with the library.
#[path = "ble/adv_data.rs"]
mod ble_adv_data_impl;

pub mod ble {
    pub mod adv_data {
        pub use crate::ble_adv_data_impl::*;
    }
}

pub use controller::{Controller, Effect, Event, Flow, TickInputs, TickReport};
pub use state::{ButtonLevels, ButtonLine, DeviceState, LinkState, PowerState, WakeCause};

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests - cross-module timing behaviour
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::config::*;
    use super::controller::ResetTrigger;
    use super::*;

    fn boot(config: DeviceConfig, wake: WakeCause, levels: ButtonLevels) -> (Controller, TickReport) {
        let (mut c, report) = Controller::boot(config, wake, levels, 0);
        c.advertising_started(0);
        (c, report)
    }

    fn inputs(connected: bool, action: bool, config: bool) -> TickInputs {
        TickInputs {
            connected,
            buttons: ButtonLevels { action, config },
        }
    }

    fn keystrokes(report: &TickReport) -> usize {
        report
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::Keystroke(_)))
            .count()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Idle power controller
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn deep_sleep_when_idle_past_timeout_for_any_idle_duration() {
        for idle in [30_001u64, 30_500, 45_000, 3_600_000] {
            let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
            c.tick(inputs(true, false, false), 0);
            let report = c.tick(inputs(true, false, false), idle);
            assert_eq!(report.flow, Flow::DeepSleep, "idle {}", idle);
            assert!(report.events.contains(&Event::IdleTimeout { idle_ms: idle }));
        }
    }

    #[test]
    fn power_saving_active_throughout_middle_window() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 0);

        let mut t = 10_001;
        while t <= DEEP_SLEEP_KEY_TIMEOUT_MS {
            let report = c.tick(inputs(true, false, false), t);
            assert!(!report.is_terminal());
            assert_eq!(c.state().power, PowerState::PowerSaving, "t = {}", t);
            t += 997;
        }
        let report = c.tick(inputs(true, false, false), DEEP_SLEEP_KEY_TIMEOUT_MS);
        assert!(!report.is_terminal());
    }

    #[test]
    fn power_saving_entered_exactly_once() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 0);
        let mut entries = 0;
        for t in (10_000..20_000).step_by(10) {
            let report = c.tick(inputs(true, false, false), t);
            entries += report
                .effects
                .iter()
                .filter(|e| **e == Effect::ApplyPower(PowerState::PowerSaving))
                .count();
        }
        assert_eq!(entries, 1);
    }

    #[test]
    fn idle_deep_sleep_reverts_power_saving_before_sleeping() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 0);
        c.tick(inputs(true, false, false), 15_000);
        assert_eq!(c.state().power, PowerState::PowerSaving);

        let report = c.tick(inputs(true, false, false), 31_000);
        assert_eq!(
            report.effects.as_slice(),
            &[Effect::ApplyPower(PowerState::FullSpeed)]
        );
        assert_eq!(report.flow, Flow::DeepSleep);
        assert_eq!(c.state().power, PowerState::FullSpeed);
    }

    // ════════════════════════════════════════════════════════════════════════
    // Disconnected sleep guard
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn link_led_blinks_at_one_hertz_while_waiting() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        let mut t = 0;
        while t <= DISCONNECTED_TIMEOUT_MS {
            let report = c.tick(inputs(false, false, false), t);
            let expected = (t / 500) % 2 == 1;
            assert_eq!(report.effects.last(), Some(&Effect::LinkIndicator(expected)));
            assert_eq!(
                report.flow,
                Flow::Continue {
                    poll_after_ms: DISCONNECTED_POLL_MS
                }
            );
            t += DISCONNECTED_POLL_MS;
        }
    }

    #[test]
    fn deep_sleep_after_two_minutes_without_host() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 1_000);
        c.tick(inputs(false, false, false), 5_000);
        assert!(!c.tick(inputs(false, false, false), 125_000).is_terminal());
        let report = c.tick(inputs(false, false, false), 125_001);
        assert_eq!(report.flow, Flow::DeepSleep);
        assert!(report.events.contains(&Event::NoHostTimeout {
            elapsed_ms: 120_001
        }));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Button classification
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn second_press_within_debounce_is_ignored() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 0);

        let first = c.tick(inputs(true, true, false), 1_000);
        assert_eq!(keystrokes(&first), 1);
        c.tick(inputs(true, false, false), 1_060);
        let bounced = c.tick(inputs(true, true, false), 1_200);
        assert_eq!(keystrokes(&bounced), 0);
        c.tick(inputs(true, false, false), 1_240);
        let second = c.tick(inputs(true, true, false), 1_251);
        assert_eq!(keystrokes(&second), 1);
    }

    #[test]
    fn held_action_key_repeats_after_debounce() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 0);

        let mut sent = std::vec::Vec::new();
        for t in (1_000..=3_000).step_by(10) {
            if keystrokes(&c.tick(inputs(true, true, false), t)) > 0 {
                sent.push(t);
            }
        }
        assert!(sent.len() > 1, "sent {:?}", sent);
        assert_eq!(sent[0], 1_000);
        assert!(sent.windows(2).all(|w| w[1] - w[0] > DEBOUNCE_MS));
        assert_eq!(c.state().timing.last_key_press(), *sent.last().unwrap());
    }

    #[test]
    fn single_button_hold_boundary() {
        // 2990 ms then release: short press, one keystroke.
        let (mut c, _) = boot(SINGLE_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 0);
        let mut t = 1_000;
        while t < 3_990 {
            assert!(c.tick(inputs(true, true, false), t).effects.is_empty());
            t += 10;
        }
        let report = c.tick(inputs(true, false, false), 3_990);
        assert_eq!(keystrokes(&report), 1);
        assert_eq!(report.flow, Flow::Continue { poll_after_ms: CONNECTED_POLL_MS });

        // 3000 ms held: long press, bond reset, restart.
        let (mut c, _) = boot(SINGLE_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(true, false, false), 0);
        let mut t = 1_000;
        let report = loop {
            let report = c.tick(inputs(true, true, false), t);
            if report.is_terminal() {
                break report;
            }
            t += 10;
        };
        assert_eq!(t, 4_000);
        assert_eq!(report.flow, Flow::Restart);
        assert_eq!(
            report.effects.as_slice(),
            &[Effect::ClearBonds, Effect::Blink(RUNTIME_RESET_BLINK)]
        );
        assert!(report
            .events
            .contains(&Event::BondReset(ResetTrigger::LongPress(ButtonLine::Action))));
    }

    #[test]
    fn config_hold_resets_bonds_even_while_disconnected() {
        let (mut c, _) = boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
        c.tick(inputs(false, false, true), 500);
        let report = c.tick(inputs(false, false, true), 3_500);
        assert_eq!(report.flow, Flow::Restart);
        assert!(report.effects.contains(&Effect::ClearBonds));
    }

    // ════════════════════════════════════════════════════════════════════════
    // Boot paths
    // ════════════════════════════════════════════════════════════════════════

    #[test]
    fn boot_with_reset_line_held_clears_bonds_and_continues() {
        let held = ButtonLevels {
            action: false,
            config: true,
        };
        let (mut c, report) = boot(DUAL_BUTTON, WakeCause::Cold, held);
        assert_eq!(
            report.effects.as_slice(),
            &[Effect::ClearBonds, Effect::Blink(BOOT_RESET_BLINK)]
        );
        assert_eq!(BOOT_RESET_BLINK.count, 10);
        assert!(!report.is_terminal());

        // The still-held line does not turn into a runtime reset.
        for t in (0..10_000).step_by(10) {
            assert!(!c.tick(inputs(false, false, true), t).is_terminal());
        }
    }

    #[test]
    fn wake_replay_types_once_before_polling() {
        let held = ButtonLevels {
            action: true,
            config: false,
        };
        let (mut c, report) = boot(SINGLE_BUTTON, WakeCause::ExternalWake, held);
        assert_eq!(report.effects.as_slice(), &[Effect::Keystroke(KEY_SPACE)]);
        assert!(report.events.contains(&Event::WakeReplay {
            line: ButtonLine::Action
        }));

        // Releasing the wake press does not produce a second keystroke.
        c.tick(inputs(true, true, false), 100);
        let report = c.tick(inputs(true, false, false), 400);
        assert_eq!(keystrokes(&report), 0);
    }

    #[test]
    fn dual_layout_never_replays_wake_press() {
        let held = ButtonLevels {
            action: true,
            config: false,
        };
        let (_, report) = boot(DUAL_BUTTON, WakeCause::ExternalWake, held);
        assert!(report.effects.is_empty());
    }
}
