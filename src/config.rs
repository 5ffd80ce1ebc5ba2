//! Application-wide constants and compile-time configuration.
//!
//! All timing thresholds, BLE parameters, pin polarity and flash layout
//! live here so they can be tuned in one place.

use crate::state::{ButtonLine, PowerState};

// Timing

/// Minimum gap between two classified presses (ms).
pub const DEBOUNCE_MS: u64 = 250;

/// Idle time while connected before dropping into power saving (ms).
pub const POWER_SAVE_TIMEOUT_MS: u64 = 10_000;

/// Idle time while connected before entering deep sleep (ms).
pub const DEEP_SLEEP_KEY_TIMEOUT_MS: u64 = 30_000;

/// Time spent disconnected before entering deep sleep (ms).
pub const DISCONNECTED_TIMEOUT_MS: u64 = 120_000;

/// Hold duration that turns a press into a long press (ms, inclusive).
pub const LONG_PRESS_MS: u64 = 3_000;

/// Half period of the "waiting for host" link LED blink (ms). 500 = 1 Hz.
pub const LINK_BLINK_HALF_PERIOD_MS: u64 = 500;

/// Poll cadence of the control loop while connected (ms).
pub const CONNECTED_POLL_MS: u64 = 10;

/// Poll cadence of the control loop while disconnected (ms).
pub const DISCONNECTED_POLL_MS: u64 = 50;

/// Width of the key press assertion and of the confirmation LED pulse (ms).
pub const KEY_PULSE_MS: u64 = 50;

/// How long a queued keyboard report waits for the host to enable
/// notifications before it is dropped (ms).
pub const REPORT_HOLD_MS: u64 = 5_000;

/// Retry spacing for a report the host is not yet listening for (ms).
pub const REPORT_RETRY_MS: u64 = 50;

/// LED blink pattern used as feedback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlinkPattern {
    pub count: u8,
    pub on_ms: u64,
    pub off_ms: u64,
}

impl BlinkPattern {
    /// Total wall-clock time the pattern occupies.
    pub const fn duration_ms(&self) -> u64 {
        self.count as u64 * (self.on_ms + self.off_ms)
    }
}

/// Feedback after bonds were cleared because a button was held at power-up.
pub const BOOT_RESET_BLINK: BlinkPattern = BlinkPattern {
    count: 10,
    on_ms: 50,
    off_ms: 50,
};

/// Feedback after bonds were cleared by a long press, right before restart.
pub const RUNTIME_RESET_BLINK: BlinkPattern = BlinkPattern {
    count: 6,
    on_ms: 80,
    off_ms: 80,
};

// HID

/// USB HID usage code for the space bar.
pub const KEY_SPACE: u8 = 0x2C;

// BLE

/// GAP device name, also placed in the scan response.
pub const DEVICE_NAME: &str = "Pony-Keeb";

/// Advertising interval (in 0.625 ms units). 160 = 100 ms.
pub const BLE_ADV_INTERVAL: u32 = 160;

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms (lowest latency for HID).
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// How the radio link and CPU are configured in a given power state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerProfile {
    /// Let the CPU drop into low-power idle between radio events.
    pub low_power_idle: bool,
    /// Connection events the peripheral may skip (BLE slave latency).
    pub peripheral_latency: u16,
}

/// Profile while the user is typing.
pub const FULL_SPEED_PROFILE: PowerProfile = PowerProfile {
    low_power_idle: false,
    peripheral_latency: 0,
};

/// Profile once the device has been idle for `POWER_SAVE_TIMEOUT_MS`.
/// The link stays up; only responsiveness of idle connection events drops.
pub const POWER_SAVING_PROFILE: PowerProfile = PowerProfile {
    low_power_idle: true,
    peripheral_latency: 20,
};

impl PowerState {
    pub const fn profile(self) -> PowerProfile {
        match self {
            PowerState::FullSpeed => FULL_SPEED_PROFILE,
            PowerState::PowerSaving => POWER_SAVING_PROFILE,
        }
    }
}

// GPIO pin assignments (nRF52840-DK headers)
//
// Logical names only; the concrete `embassy_nrf::peripherals::*` are
// selected in `main.rs`.  Buttons use an external 10 kΩ pull-down and
// read High while pressed.
//
//   Boot LED       → P0.13   (on once the CPU runs)
//   Link LED       → P0.14   (solid = connected, 1 Hz blink = waiting)
//   Confirm LED    → P0.15   (keystroke / bond reset feedback)
//   Action button  → P0.11
//   Config button  → P0.12

/// Buttons read High while pressed.
pub const BUTTON_ACTIVE_HIGH: bool = true;

/// Internal pull resistor on a button line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinePull {
    Down,
    Up,
}

/// Pull towards the released level of a line with the given polarity.
pub const fn button_pull(active_high: bool) -> LinePull {
    if active_high {
        LinePull::Down
    } else {
        LinePull::Up
    }
}

/// Pull used on every button line, while awake and when armed as the
/// System OFF wake source.
pub const BUTTON_PULL: LinePull = button_pull(BUTTON_ACTIVE_HIGH);

/// GPIO number of the Action line on port 0 (System OFF wake source).
pub const ACTION_PIN: u8 = 11;

/// GPIO number of the Config line on port 0.
pub const CONFIG_PIN: u8 = 12;

// Bond storage

/// Maximum number of bonded hosts kept in flash.
pub const MAX_BONDS: usize = 4;

/// Flash page index where bond storage starts (4 KB per page on nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for bond storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

// Button layout

/// What a classified press does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonAction {
    /// Nothing beyond a log line.
    None,
    /// Tap the given HID usage code.
    Keystroke(u8),
    /// Forget every bonded host and restart.
    BondReset,
}

/// Short/long press assignment for one physical line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonBinding {
    pub line: ButtonLine,
    pub short: ButtonAction,
    pub long: ButtonAction,
}

impl ButtonBinding {
    /// Whether this line needs hold timing at all.
    pub const fn has_long_action(&self) -> bool {
        !matches!(self.long, ButtonAction::None)
    }
}

/// Which buttons exist, what they do, and how waking from deep sleep behaves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    /// One binding per populated button (1 or 2).
    pub bindings: &'static [ButtonBinding],
    /// Line that clears bonds when held during power-up.
    pub boot_reset_line: ButtonLine,
    /// Line armed as the System OFF wake source.
    pub wake_line: ButtonLine,
    /// Treat the press that woke the device as a completed short press.
    pub wake_replay: bool,
}

impl DeviceConfig {
    /// Binding of the given line, if that button is populated.
    pub fn binding(&self, line: ButtonLine) -> Option<&ButtonBinding> {
        self.bindings.iter().find(|b| b.line == line)
    }
}

/// Two discrete buttons: Action types, Config resets bonds.
pub const DUAL_BUTTON: DeviceConfig = DeviceConfig {
    bindings: &[
        ButtonBinding {
            line: ButtonLine::Action,
            short: ButtonAction::Keystroke(KEY_SPACE),
            long: ButtonAction::None,
        },
        ButtonBinding {
            line: ButtonLine::Config,
            short: ButtonAction::None,
            long: ButtonAction::BondReset,
        },
    ],
    boot_reset_line: ButtonLine::Config,
    wake_line: ButtonLine::Action,
    wake_replay: false,
};

/// One dual-purpose button: tap types, hold resets bonds, wake press types.
pub const SINGLE_BUTTON: DeviceConfig = DeviceConfig {
    bindings: &[ButtonBinding {
        line: ButtonLine::Action,
        short: ButtonAction::Keystroke(KEY_SPACE),
        long: ButtonAction::BondReset,
    }],
    boot_reset_line: ButtonLine::Action,
    wake_line: ButtonLine::Action,
    wake_replay: true,
};

/// Layout the firmware is built for.
pub const ACTIVE_CONFIG: DeviceConfig = DUAL_BUTTON;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_lines_pull_towards_released_level() {
        assert_eq!(button_pull(true), LinePull::Down);
        assert_eq!(button_pull(false), LinePull::Up);
        // Active-high buttons: the wake line keeps its pull-down in System OFF.
        assert!(BUTTON_ACTIVE_HIGH);
        assert_eq!(BUTTON_PULL, LinePull::Down);
    }
}
