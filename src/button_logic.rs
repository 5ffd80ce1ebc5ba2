//! Short / long press classification for one button line.
//!
//! The classifier never blocks: every tick it is handed the sampled
//! level and the current time, and it reports at most one outcome.
//!
//! ```text
//!            pressed && gate open
//!  Released ─────────────────────▶ Held{since} ── held >= LONG ──▶ Long ──▶ AwaitRelease
//!     ▲                                 │                                        │
//!     ├──────── Short ◀── released early┘                                        │
//!     └──────────────────────────────── released ────────────────────────────────┘
//! ```
//!
//! Lines without a long action skip `Held`: they report `Short` whenever
//! the line reads pressed and the gate is open, so a held key repeats
//! once per gate period.

use crate::config::{DEBOUNCE_MS, LONG_PRESS_MS};

/// Result of classifying one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PressOutcome {
    None,
    Short,
    Long,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Phase {
    Released,
    Held { since: u64 },
    /// A press was already consumed; wait for the line to drop.
    AwaitRelease,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonClassifier {
    phase: Phase,
    timed: bool,
    last_hold_ms: u64,
}

impl ButtonClassifier {
    /// `timed` enables hold timing (the line has a long action).
    pub const fn new(timed: bool) -> Self {
        Self {
            phase: Phase::Released,
            timed,
            last_hold_ms: 0,
        }
    }

    /// Start up with the level seen at power-up. A line that is already
    /// pressed is ignored until it has been released once.
    pub fn arm(&mut self, pressed_at_boot: bool) {
        self.phase = if pressed_at_boot {
            Phase::AwaitRelease
        } else {
            Phase::Released
        };
    }

    /// True while a timed hold is in progress.
    pub fn is_holding(&self) -> bool {
        matches!(self.phase, Phase::Held { .. })
    }

    /// Hold time of the most recently classified timed press.
    pub fn last_hold_ms(&self) -> u64 {
        self.last_hold_ms
    }

    /// Feed one sample.
    ///
    /// `last_action_press` is the time of the previous classified press;
    /// a new press is only accepted more than `DEBOUNCE_MS` after it.
    pub fn poll(&mut self, pressed: bool, now: u64, last_action_press: u64) -> PressOutcome {
        match self.phase {
            Phase::Released => {
                if !pressed || now.saturating_sub(last_action_press) <= DEBOUNCE_MS {
                    return PressOutcome::None;
                }
                if self.timed {
                    self.phase = Phase::Held { since: now };
                    PressOutcome::None
                } else {
                    self.last_hold_ms = 0;
                    PressOutcome::Short
                }
            }
            Phase::Held { since } => {
                let held = now.saturating_sub(since);
                if held >= LONG_PRESS_MS {
                    self.last_hold_ms = held;
                    self.phase = Phase::AwaitRelease;
                    PressOutcome::Long
                } else if !pressed {
                    self.last_hold_ms = held;
                    self.phase = Phase::Released;
                    PressOutcome::Short
                } else {
                    PressOutcome::None
                }
            }
            Phase::AwaitRelease => {
                if !pressed {
                    self.phase = Phase::Released;
                }
                PressOutcome::None
            }
        }
    }
}
