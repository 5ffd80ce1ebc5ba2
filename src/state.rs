//! Device state record shared by every control component.
//!
//! All timestamps are milliseconds on the same monotonic clock.  The
//! record is owned by the [`Controller`](crate::controller::Controller)
//! and handed by reference to each component in turn, so a tick never
//! sees two writers of the same field.

/// Link status as last observed from the BLE transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
}

impl LinkState {
    pub fn is_connected(self) -> bool {
        self == LinkState::Connected
    }
}

/// CPU / radio power level.
///
/// Deep sleep is not a state: it halts the firmware and the device boots
/// cold on wake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
    #[default]
    FullSpeed,
    PowerSaving,
}

/// Why the firmware is running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeCause {
    /// Power-on, reset pin, watchdog or software restart.
    Cold,
    /// Woken from System OFF by the wake line.
    ExternalWake,
}

/// Physical button lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonLine {
    Action,
    Config,
}

/// Logical (pressed = `true`) level of every button line, sampled once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonLevels {
    pub action: bool,
    pub config: bool,
}

impl ButtonLevels {
    pub const RELEASED: Self = Self {
        action: false,
        config: false,
    };

    pub fn pressed(&self, line: ButtonLine) -> bool {
        match line {
            ButtonLine::Action => self.action,
            ButtonLine::Config => self.config,
        }
    }
}

/// Timestamps of the last qualifying events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingRegisters {
    last_key_press: u64,
    last_connected: u64,
    last_action_press: u64,
}

impl TimingRegisters {
    /// All registers start at advertising start.
    pub const fn new(now: u64) -> Self {
        Self {
            last_key_press: now,
            last_connected: now,
            last_action_press: now,
        }
    }

    pub fn last_key_press(&self) -> u64 {
        self.last_key_press
    }

    pub fn last_connected(&self) -> u64 {
        self.last_connected
    }

    pub fn last_action_press(&self) -> u64 {
        self.last_action_press
    }

    /// Key activity never moves the register backwards.
    pub(crate) fn record_key_activity(&mut self, now: u64) {
        self.last_key_press = self.last_key_press.max(now);
    }

    pub(crate) fn record_link_change(&mut self, now: u64) {
        self.last_connected = now;
    }

    pub(crate) fn record_action_press(&mut self, now: u64) {
        self.last_action_press = self.last_action_press.max(now);
    }
}

/// Everything the control loop remembers between ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceState {
    pub link: LinkState,
    pub power: PowerState,
    pub timing: TimingRegisters,
}

impl DeviceState {
    /// Fresh state right after boot: disconnected, full speed.
    pub const fn boot(now: u64) -> Self {
        Self {
            link: LinkState::Disconnected,
            power: PowerState::FullSpeed,
            timing: TimingRegisters::new(now),
        }
    }

    pub fn power_saving(&self) -> bool {
        self.power == PowerState::PowerSaving
    }
}
