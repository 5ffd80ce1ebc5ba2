//! Scenario tests: drive the controller the way the firmware loop does.

use pony_keeb::config::{
    DeviceConfig, BOOT_RESET_BLINK, DUAL_BUTTON, KEY_PULSE_MS, KEY_SPACE, SINGLE_BUTTON,
};
use pony_keeb::{ButtonLevels, Controller, Effect, Flow, PowerState, TickInputs, WakeCause};

/// Minimal stand-in for the board: applies effects and advances a clock.
struct Sim {
    now: u64,
    controller: Controller,
    applied: Vec<(u64, Effect)>,
    link_led: bool,
    bonds_cleared: usize,
    blinks: u32,
    power: PowerState,
}

impl Sim {
    fn boot(config: DeviceConfig, wake: WakeCause, levels: ButtonLevels) -> Self {
        let (controller, report) = Controller::boot(config, wake, levels, 0);
        let mut sim = Self {
            now: 0,
            controller,
            applied: Vec::new(),
            link_led: false,
            bonds_cleared: 0,
            blinks: 0,
            power: PowerState::FullSpeed,
        };
        sim.apply(&report.effects);
        let now = sim.now;
        sim.controller.advertising_started(now);
        sim
    }

    fn apply(&mut self, effects: &[Effect]) {
        for effect in effects {
            self.applied.push((self.now, *effect));
            match *effect {
                Effect::LinkIndicator(on) => self.link_led = on,
                Effect::ApplyPower(state) => self.power = state,
                Effect::Keystroke(_) => self.now += 2 * KEY_PULSE_MS,
                Effect::ClearBonds => self.bonds_cleared += 1,
                Effect::Blink(pattern) => {
                    self.blinks += u32::from(pattern.count);
                    self.now += pattern.duration_ms();
                }
            }
        }
    }

    /// Poll until `until` or a terminal flow; returns the terminal flow if any.
    fn run(&mut self, until: u64, mut inputs: impl FnMut(u64) -> TickInputs) -> Option<Flow> {
        while self.now < until {
            let report = self.controller.tick(inputs(self.now), self.now);
            self.apply(&report.effects);
            match report.flow {
                Flow::Continue { poll_after_ms } => self.now += poll_after_ms,
                terminal => return Some(terminal),
            }
        }
        None
    }

    fn keystrokes(&self) -> usize {
        self.applied
            .iter()
            .filter(|(_, e)| matches!(e, Effect::Keystroke(_)))
            .count()
    }
}

fn connected(_: u64) -> TickInputs {
    TickInputs {
        connected: true,
        buttons: ButtonLevels::RELEASED,
    }
}

#[test]
fn boot_with_config_held_clears_bonds_then_boots_normally() {
    let held = ButtonLevels {
        action: false,
        config: true,
    };
    let mut sim = Sim::boot(DUAL_BUTTON, WakeCause::Cold, held);
    assert_eq!(sim.bonds_cleared, 1);
    assert_eq!(sim.blinks, 10);
    assert_eq!(sim.now, BOOT_RESET_BLINK.duration_ms());

    // Timers start after the feedback, so the host has the full window.
    assert_eq!(sim.run(sim.now + 20_000, connected), None);
    assert_eq!(sim.controller.state().timing.last_key_press(), 1_000);
}

#[test]
fn idle_thirty_one_seconds_reverts_then_sleeps() {
    let mut sim = Sim::boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
    let flow = sim.run(31_000, connected);
    assert_eq!(flow, Some(Flow::DeepSleep));
    assert!(sim.now > 30_000 && sim.now <= 30_010);

    let power: Vec<_> = sim
        .applied
        .iter()
        .filter_map(|(_, e)| match e {
            Effect::ApplyPower(state) => Some(*state),
            _ => None,
        })
        .collect();
    assert_eq!(power, [PowerState::PowerSaving, PowerState::FullSpeed]);
    assert_eq!(sim.power, PowerState::FullSpeed);
}

#[test]
fn wake_from_deep_sleep_replays_keystroke_before_polling() {
    let held = ButtonLevels {
        action: true,
        config: false,
    };
    let mut sim = Sim::boot(SINGLE_BUTTON, WakeCause::ExternalWake, held);
    assert_eq!(sim.applied.first(), Some(&(0, Effect::Keystroke(KEY_SPACE))));
    assert_eq!(sim.bonds_cleared, 0);

    // Wake press is released 300 ms later; host connects at 1 s.
    let flow = sim.run(5_000, |t| TickInputs {
        connected: t >= 1_000,
        buttons: ButtonLevels {
            action: t < 300,
            config: false,
        },
    });
    assert_eq!(flow, None);
    assert_eq!(sim.keystrokes(), 1);
    assert!(sim.link_led);
}

#[test]
fn typing_keeps_device_awake() {
    let mut sim = Sim::boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
    // A tap every 20 s for two minutes.
    let flow = sim.run(120_000, |t| TickInputs {
        connected: true,
        buttons: ButtonLevels {
            action: (1_000..1_100).contains(&(t % 20_000)),
            config: false,
        },
    });
    assert_eq!(flow, None);
    assert_eq!(sim.keystrokes(), 6);
    // Each tap after a 10 s lull woke the device from power saving.
    assert_eq!(sim.power, PowerState::PowerSaving);
}

#[test]
fn host_never_connects() {
    let mut sim = Sim::boot(DUAL_BUTTON, WakeCause::Cold, ButtonLevels::RELEASED);
    let flow = sim.run(200_000, |_| TickInputs::default());
    assert_eq!(flow, Some(Flow::DeepSleep));
    assert!(sim.now > 120_000 && sim.now <= 120_050);
}
