//! Confirmation LED patterns and the keystroke pulse.

use defmt::{debug, warn};
use embassy_nrf::gpio::Output;
use embassy_time::Timer;
use pony_keeb::config::{BlinkPattern, KEY_PULSE_MS};
use pony_keeb::hid::KeyboardReport;

use crate::ble;

pub async fn blink(led: &mut Output<'_>, pattern: BlinkPattern) {
    for _ in 0..pattern.count {
        led.set_high();
        Timer::after_millis(pattern.on_ms).await;
        led.set_low();
        Timer::after_millis(pattern.off_ms).await;
    }
}

fn queue(report: KeyboardReport) {
    if ble::REPORTS.try_send(report).is_err() {
        warn!("[HID] report queue full - dropping report");
    }
}

/// LED on, press, hold, release, settle, LED off.
pub async fn keystroke_pulse(led: &mut Output<'_>, keycode: u8) {
    debug!("[HID] keystroke {=u8:#x}", keycode);
    led.set_high();
    queue(KeyboardReport::press(keycode));
    Timer::after_millis(KEY_PULSE_MS).await;
    queue(KeyboardReport::released());
    Timer::after_millis(KEY_PULSE_MS).await;
    led.set_low();
}
