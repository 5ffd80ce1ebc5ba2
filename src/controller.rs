//! Cooperative control loop: one call to [`Controller::tick`] per poll.
//!
//! The controller owns the [`DeviceState`] record and sequences the
//! link monitor, the disconnected timer, the idle power controller and
//! the button classifiers in that order.  It never touches hardware:
//! each tick yields a [`TickReport`] listing the side effects to carry
//! out, the notable events to log, and whether the firmware keeps
//! polling, enters deep sleep, or restarts.

use heapless::Vec;

use crate::button_logic::{ButtonClassifier, PressOutcome};
use crate::config::{
    BlinkPattern, ButtonAction, ButtonBinding, DeviceConfig, BOOT_RESET_BLINK,
    CONNECTED_POLL_MS, DISCONNECTED_POLL_MS, RUNTIME_RESET_BLINK,
};
use crate::link_logic::{guard_disconnected, observe_link, GuardVerdict, LinkEdge};
use crate::power_logic::{enter_power_saving, evaluate_idle, wake_for_activity, IdleVerdict};
use crate::state::{ButtonLevels, ButtonLine, DeviceState, PowerState, TimingRegisters, WakeCause};

/// Populated buttons supported by one layout.
pub const MAX_BUTTONS: usize = 2;

/// Upper bound of effects produced by one tick.
pub const MAX_EFFECTS: usize = 8;

/// Upper bound of events produced by one tick.
pub const MAX_EVENTS: usize = 8;

/// Hardware side effect, in the order it must be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Drive the link LED.
    LinkIndicator(bool),
    /// Reconfigure CPU and radio for the given state.
    ApplyPower(PowerState),
    /// Press and release the key, with a confirmation LED pulse.
    Keystroke(u8),
    /// Erase every stored bond.
    ClearBonds,
    /// Blink the confirmation LED.
    Blink(BlinkPattern),
}

/// What triggered a bond reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetTrigger {
    BootHold(ButtonLine),
    LongPress(ButtonLine),
}

/// Something worth a log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    LinkUp,
    LinkDown,
    PowerSavingOn { idle_ms: u64 },
    PowerSavingOff,
    IdleTimeout { idle_ms: u64 },
    NoHostTimeout { elapsed_ms: u64 },
    /// Short press on a line without a short action.
    Released { line: ButtonLine, held_ms: u64 },
    /// Keystroke requested while no host is connected.
    KeystrokeDropped { line: ButtonLine },
    WakeReplay { line: ButtonLine },
    BondReset(ResetTrigger),
}

/// What the firmware does after applying the effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Flow {
    /// Keep polling after the given delay.
    Continue { poll_after_ms: u64 },
    /// Flush logs, arm the wake line and power off. Does not return.
    DeepSleep,
    /// Full system reset. Does not return.
    Restart,
}

/// Outcome of one boot or tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub effects: Vec<Effect, MAX_EFFECTS>,
    pub events: Vec<Event, MAX_EVENTS>,
    pub flow: Flow,
}

impl TickReport {
    fn new(poll_after_ms: u64) -> Self {
        Self {
            effects: Vec::new(),
            events: Vec::new(),
            flow: Flow::Continue { poll_after_ms },
        }
    }

    fn effect(&mut self, effect: Effect) {
        let _ = self.effects.push(effect);
    }

    fn event(&mut self, event: Event) {
        let _ = self.events.push(event);
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self.flow, Flow::Continue { .. })
    }
}

/// Sampled inputs for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickInputs {
    pub connected: bool,
    pub buttons: ButtonLevels,
}

struct Button {
    binding: ButtonBinding,
    classifier: ButtonClassifier,
}

pub struct Controller {
    config: DeviceConfig,
    state: DeviceState,
    buttons: Vec<Button, MAX_BUTTONS>,
    halted: Option<Flow>,
}

impl Controller {
    /// Power-up sequence, before the transport starts advertising.
    ///
    /// Clears bonds if the boot-reset line is held, and replays the wake
    /// press as a keystroke when the layout asks for it.  Call
    /// [`Controller::advertising_started`] once advertising is running.
    pub fn boot(
        config: DeviceConfig,
        wake: WakeCause,
        levels: ButtonLevels,
        now: u64,
    ) -> (Self, TickReport) {
        let mut buttons = Vec::new();
        for binding in config.bindings.iter().take(MAX_BUTTONS) {
            let mut classifier = ButtonClassifier::new(binding.has_long_action());
            classifier.arm(levels.pressed(binding.line));
            let _ = buttons.push(Button {
                binding: *binding,
                classifier,
            });
        }

        let mut controller = Self {
            config,
            state: DeviceState::boot(now),
            buttons,
            halted: None,
        };
        let mut report = TickReport::new(DISCONNECTED_POLL_MS);

        let woke_by_press = wake == WakeCause::ExternalWake;
        let held_for_wake = woke_by_press && config.boot_reset_line == config.wake_line;
        if levels.pressed(config.boot_reset_line) && !held_for_wake {
            report.event(Event::BondReset(ResetTrigger::BootHold(config.boot_reset_line)));
            report.effect(Effect::ClearBonds);
            report.effect(Effect::Blink(BOOT_RESET_BLINK));
        }

        if woke_by_press && config.wake_replay {
            if let Some(ButtonAction::Keystroke(code)) =
                config.binding(config.wake_line).map(|b| b.short)
            {
                report.event(Event::WakeReplay {
                    line: config.wake_line,
                });
                controller.state.timing.record_action_press(now);
                controller.state.timing.record_key_activity(now);
                report.effect(Effect::Keystroke(code));
            }
        }

        (controller, report)
    }

    /// Start every timer from the moment the transport began advertising.
    pub fn advertising_started(&mut self, now: u64) {
        self.state.timing = TimingRegisters::new(now);
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Run one polling step.
    pub fn tick(&mut self, inputs: TickInputs, now: u64) -> TickReport {
        if let Some(flow) = self.halted {
            let mut report = TickReport::new(0);
            report.flow = flow;
            return report;
        }

        let mut report = TickReport::new(CONNECTED_POLL_MS);

        match observe_link(&mut self.state, inputs.connected, now) {
            Some(LinkEdge::Connected) => {
                report.event(Event::LinkUp);
                report.effect(Effect::LinkIndicator(true));
                // Every new link starts at full speed in the transport.
                if self.state.power_saving() {
                    report.effect(Effect::ApplyPower(PowerState::PowerSaving));
                }
            }
            Some(LinkEdge::Disconnected) => {
                report.event(Event::LinkDown);
                report.effect(Effect::LinkIndicator(false));
            }
            None => {}
        }

        match guard_disconnected(&self.state, now) {
            Some(GuardVerdict::DeepSleep { elapsed_ms }) => {
                report.event(Event::NoHostTimeout { elapsed_ms });
                return self.halt(report, Flow::DeepSleep);
            }
            Some(GuardVerdict::Waiting { indicator_on, .. }) => {
                report.effect(Effect::LinkIndicator(indicator_on));
                report.flow = Flow::Continue {
                    poll_after_ms: DISCONNECTED_POLL_MS,
                };
            }
            None => {}
        }

        match evaluate_idle(&self.state, now) {
            Some(IdleVerdict::DeepSleep {
                idle_ms,
                revert_first,
            }) => {
                if revert_first && wake_for_activity(&mut self.state) {
                    report.event(Event::PowerSavingOff);
                    report.effect(Effect::ApplyPower(PowerState::FullSpeed));
                }
                report.event(Event::IdleTimeout { idle_ms });
                return self.halt(report, Flow::DeepSleep);
            }
            Some(IdleVerdict::EnterPowerSaving) => {
                if enter_power_saving(&mut self.state) {
                    let idle_ms = crate::power_logic::idle_ms(&self.state, now);
                    report.event(Event::PowerSavingOn { idle_ms });
                    report.effect(Effect::ApplyPower(PowerState::PowerSaving));
                }
            }
            Some(IdleVerdict::Stay) | None => {}
        }

        // Buttons are read in both link states, so a long press can clear
        // bonds while no host is connected. Keystrokes are dropped then.
        if self.classify_buttons(inputs.buttons, now, &mut report) {
            return self.halt(report, Flow::Restart);
        }

        report
    }

    /// Poll every classifier. Returns `true` when a bond reset was requested.
    fn classify_buttons(&mut self, levels: ButtonLevels, now: u64, report: &mut TickReport) -> bool {
        for button in self.buttons.iter_mut() {
            let line = button.binding.line;
            let outcome = button.classifier.poll(
                levels.pressed(line),
                now,
                self.state.timing.last_action_press(),
            );
            let action = match outcome {
                PressOutcome::None => continue,
                PressOutcome::Short => button.binding.short,
                PressOutcome::Long => button.binding.long,
            };

            match action {
                ButtonAction::Keystroke(code) => {
                    issue_keystroke(&mut self.state, line, code, now, report);
                }
                ButtonAction::BondReset => {
                    report.event(Event::BondReset(ResetTrigger::LongPress(line)));
                    report.effect(Effect::ClearBonds);
                    report.effect(Effect::Blink(RUNTIME_RESET_BLINK));
                    return true;
                }
                ButtonAction::None => report.event(Event::Released {
                    line,
                    held_ms: button.classifier.last_hold_ms(),
                }),
            }
        }
        false
    }

    fn halt(&mut self, mut report: TickReport, flow: Flow) -> TickReport {
        self.halted = Some(flow);
        report.flow = flow;
        report
    }
}

/// Key activity: full speed first, then the keystroke.
fn issue_keystroke(
    state: &mut DeviceState,
    line: ButtonLine,
    code: u8,
    now: u64,
    report: &mut TickReport,
) {
    state.timing.record_action_press(now);
    if !state.link.is_connected() {
        report.event(Event::KeystrokeDropped { line });
        return;
    }

    state.timing.record_key_activity(now);
    if wake_for_activity(state) {
        report.event(Event::PowerSavingOff);
        report.effect(Effect::ApplyPower(PowerState::FullSpeed));
    }
    report.effect(Effect::Keystroke(code));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DUAL_BUTTON, KEY_SPACE, SINGLE_BUTTON};

    const CONNECTED: TickInputs = TickInputs {
        connected: true,
        buttons: ButtonLevels::RELEASED,
    };

    fn action(pressed: bool) -> TickInputs {
        TickInputs {
            connected: true,
            buttons: ButtonLevels {
                action: pressed,
                config: false,
            },
        }
    }

    fn booted(config: DeviceConfig) -> Controller {
        let (mut c, report) = Controller::boot(config, WakeCause::Cold, ButtonLevels::RELEASED, 0);
        assert!(report.effects.is_empty());
        c.advertising_started(0);
        c
    }

    #[test]
    fn connect_edge_lights_link_led() {
        let mut c = booted(DUAL_BUTTON);
        let report = c.tick(CONNECTED, 1_000);
        assert_eq!(report.events.as_slice(), &[Event::LinkUp]);
        assert_eq!(report.effects.as_slice(), &[Effect::LinkIndicator(true)]);
        assert_eq!(
            report.flow,
            Flow::Continue {
                poll_after_ms: CONNECTED_POLL_MS
            }
        );
    }

    #[test]
    fn disconnect_edge_turns_led_off_then_blinks() {
        let mut c = booted(DUAL_BUTTON);
        c.tick(CONNECTED, 1_000);
        let report = c.tick(TickInputs::default(), 2_600);
        assert_eq!(
            report.effects.as_slice(),
            &[Effect::LinkIndicator(false), Effect::LinkIndicator(true)]
        );
        assert_eq!(
            report.flow,
            Flow::Continue {
                poll_after_ms: DISCONNECTED_POLL_MS
            }
        );
    }

    #[test]
    fn reconnect_reapplies_power_saving() {
        let mut c = booted(DUAL_BUTTON);
        c.tick(CONNECTED, 0);
        c.tick(CONNECTED, 10_001);
        c.tick(TickInputs::default(), 11_000);
        assert_eq!(c.state().power, PowerState::PowerSaving);

        let report = c.tick(CONNECTED, 12_000);
        assert_eq!(
            report.effects.as_slice(),
            &[
                Effect::LinkIndicator(true),
                Effect::ApplyPower(PowerState::PowerSaving)
            ]
        );
    }

    #[test]
    fn keystroke_in_power_saving_restores_full_speed_first() {
        let mut c = booted(DUAL_BUTTON);
        c.tick(CONNECTED, 0);
        let report = c.tick(CONNECTED, 10_001);
        assert_eq!(
            report.effects.as_slice(),
            &[Effect::ApplyPower(PowerState::PowerSaving)]
        );

        let report = c.tick(action(true), 12_000);
        assert_eq!(
            report.effects.as_slice(),
            &[
                Effect::ApplyPower(PowerState::FullSpeed),
                Effect::Keystroke(KEY_SPACE)
            ]
        );
        assert_eq!(c.state().power, PowerState::FullSpeed);
        assert_eq!(c.state().timing.last_key_press(), 12_000);
    }

    #[test]
    fn config_short_press_only_logs() {
        let mut c = booted(DUAL_BUTTON);
        c.tick(CONNECTED, 0);
        let held = TickInputs {
            connected: true,
            buttons: ButtonLevels {
                action: false,
                config: true,
            },
        };
        c.tick(held, 1_000);
        let report = c.tick(CONNECTED, 1_400);
        assert_eq!(
            report.events.as_slice(),
            &[Event::Released {
                line: ButtonLine::Config,
                held_ms: 400
            }]
        );
        assert!(report.effects.is_empty());
        assert_eq!(c.state().timing.last_key_press(), 0);
    }

    #[test]
    fn keystroke_while_disconnected_is_dropped() {
        let mut c = booted(SINGLE_BUTTON);
        let pressed = TickInputs {
            connected: false,
            buttons: ButtonLevels {
                action: true,
                config: false,
            },
        };
        c.tick(pressed, 1_000);
        let report = c.tick(TickInputs::default(), 1_200);
        assert!(report.events.contains(&Event::KeystrokeDropped {
            line: ButtonLine::Action
        }));
        assert!(!report.effects.iter().any(|e| matches!(e, Effect::Keystroke(_))));
        assert_eq!(c.state().timing.last_action_press(), 1_200);
    }

    #[test]
    fn halted_controller_repeats_flow_without_effects() {
        let mut c = booted(DUAL_BUTTON);
        c.tick(CONNECTED, 0);
        assert_eq!(c.tick(CONNECTED, 30_001).flow, Flow::DeepSleep);
        let again = c.tick(action(true), 30_050);
        assert_eq!(again.flow, Flow::DeepSleep);
        assert!(again.effects.is_empty());
        assert!(again.events.is_empty());
    }
}
