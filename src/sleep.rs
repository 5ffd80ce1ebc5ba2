//! Wake cause, System OFF and restart.
//!
//! System OFF draws ~0.4 µA; the only way out is a reset, either from
//! the GPIO DETECT signal of the wake line or from the reset pin.  The
//! firmware therefore always boots from the top after deep sleep.

use defmt::info;
use embassy_nrf::pac;
use embassy_nrf::pac::gpio::vals;
use nrf_softdevice::raw;
use pony_keeb::config::{LinePull, BUTTON_PULL};
use pony_keeb::{ButtonLine, WakeCause};

use crate::ui::{self, Board};

/// Read and clear RESETREAS.
///
/// Must run before the SoftDevice is enabled, which restricts access to
/// the POWER block.
pub fn take_wake_cause() -> WakeCause {
    let reason = pac::POWER.resetreas().read();
    // Bits are cleared by writing 1.
    pac::POWER.resetreas().write_value(reason);

    if reason.off() {
        WakeCause::ExternalWake
    } else {
        WakeCause::Cold
    }
}

/// SENSE level and pull for the wake line. The pull is the one the line
/// had while awake; SENSE watches for the opposite level.
fn wake_pin_levels(pull: LinePull) -> (vals::Sense, vals::Pull) {
    match pull {
        LinePull::Down => (vals::Sense::HIGH, vals::Pull::PULLDOWN),
        LinePull::Up => (vals::Sense::LOW, vals::Pull::PULLUP),
    }
}

/// Configure `pin` as an input whose level wakes the chip from System OFF.
fn arm_wake_pin(pin: u8) {
    let (sense, pull) = wake_pin_levels(BUTTON_PULL);
    pac::P0.pin_cnf(usize::from(pin)).write(|w| {
        w.set_dir(vals::Dir::INPUT);
        w.set_input(vals::Input::CONNECT);
        w.set_pull(pull);
        w.set_sense(sense);
    });
}

/// Turn everything off and enter System OFF. Never returns.
pub fn enter_deep_sleep(board: &mut Board<'_>, wake_line: ButtonLine) -> ! {
    info!("[PWR] Entering DEEP SLEEP. Press {} to wake.", wake_line);
    board.all_leds_off();
    arm_wake_pin(ui::pin_number(wake_line));
    defmt::flush();

    // SAFETY: SVC call into the enabled SoftDevice; on success it does not return.
    unsafe {
        raw::sd_power_system_off();
    }

    // Only reached if the SoftDevice refused; a debugger keeps the chip in
    // emulated System OFF, so wait for the reset here.
    loop {
        cortex_m::asm::wfe();
    }
}

/// Full system reset. Never returns.
pub fn restart() -> ! {
    info!("[PWR] Restarting");
    defmt::flush();
    cortex_m::peripheral::SCB::sys_reset()
}
