//! GPIO button input.
//!
//! Two physical buttons (active-high with an external pull-down):
//!   - ACTION - sends the keystroke, wakes the device from deep sleep
//!   - CONFIG - long press clears bonds (dual-button layout only)
//!
//! Debounce and short/long classification happen in
//! `pony_keeb::button_logic`; this module only reads levels.

use embassy_nrf::gpio::{AnyPin, Input, Pull};
use pony_keeb::config::{LinePull, BUTTON_ACTIVE_HIGH, BUTTON_PULL};

/// Configure a button line as an input.
pub fn button_input<'d>(pin: AnyPin) -> Input<'d> {
    let pull = match BUTTON_PULL {
        LinePull::Down => Pull::Down,
        LinePull::Up => Pull::Up,
    };
    Input::new(pin, pull)
}

/// True while the button is held.
pub fn is_pressed(input: &Input<'_>) -> bool {
    input.is_high() == BUTTON_ACTIVE_HIGH
}
