//! User interface subsystem - three LEDs + one or two buttons.
//!
//! ## Components
//!
//! - **LEDs**: boot (power on), link (connected / waiting), confirm
//!   (keystroke and bond reset feedback)
//! - **Buttons**: Action and Config lines, sampled by the control loop

pub mod buttons;
pub mod leds;

use embassy_nrf::gpio::{AnyPin, Input, Level, Output, OutputDrive};
use pony_keeb::config::{BlinkPattern, ACTION_PIN, CONFIG_PIN};
use pony_keeb::{ButtonLevels, ButtonLine};

/// Port-0 GPIO number of a button line.
pub fn pin_number(line: ButtonLine) -> u8 {
    match line {
        ButtonLine::Action => ACTION_PIN,
        ButtonLine::Config => CONFIG_PIN,
    }
}

/// Pins handed over by `main` (see the pin map in `config.rs`).
pub struct BoardPins {
    pub boot_led: AnyPin,
    pub link_led: AnyPin,
    pub confirm_led: AnyPin,
    pub action: AnyPin,
    pub config: AnyPin,
}

/// Every GPIO the firmware drives or samples.
pub struct Board<'d> {
    boot_led: Output<'d>,
    link_led: Output<'d>,
    confirm_led: Output<'d>,
    action: Input<'d>,
    config: Input<'d>,
}

impl<'d> Board<'d> {
    pub fn new(pins: BoardPins) -> Self {
        Self {
            boot_led: Output::new(pins.boot_led, Level::Low, OutputDrive::Standard),
            link_led: Output::new(pins.link_led, Level::Low, OutputDrive::Standard),
            confirm_led: Output::new(pins.confirm_led, Level::Low, OutputDrive::Standard),
            action: buttons::button_input(pins.action),
            config: buttons::button_input(pins.config),
        }
    }

    /// Current level of both lines.
    pub fn levels(&self) -> ButtonLevels {
        ButtonLevels {
            action: buttons::is_pressed(&self.action),
            config: buttons::is_pressed(&self.config),
        }
    }

    pub fn set_boot_led(&mut self, on: bool) {
        self.boot_led.set_level(Level::from(on));
    }

    pub fn set_link_led(&mut self, on: bool) {
        self.link_led.set_level(Level::from(on));
    }

    pub async fn blink(&mut self, pattern: BlinkPattern) {
        leds::blink(&mut self.confirm_led, pattern).await;
    }

    /// Press and release `keycode`, lighting the confirm LED meanwhile.
    pub async fn keystroke(&mut self, keycode: u8) {
        leds::keystroke_pulse(&mut self.confirm_led, keycode).await;
    }

    pub fn all_leds_off(&mut self) {
        self.boot_led.set_low();
        self.link_led.set_low();
        self.confirm_led.set_low();
    }
}
