//! Power management - applies the controller's power state to hardware.
//!
//! nRF52840 power knobs used here:
//! - DC/DC regulator: enabled once at boot (~40% less current with BLE active)
//! - SoftDevice power mode: CONSTLAT while typing, LOWPWR when idle
//! - Peripheral latency: lets the radio skip idle connection events
//!
//! System OFF lives in `sleep.rs`.

use defmt::{info, warn};
use nrf_softdevice::raw;
use pony_keeb::PowerState;

use crate::ble;
use crate::error::{check_sd, Error};

/// Enable the DC/DC converter. Needs the SoftDevice to be enabled.
pub fn init() {
    // SAFETY: plain SVC call into the enabled SoftDevice.
    let ret = unsafe {
        raw::sd_power_dcdc_mode_set(raw::NRF_POWER_DCDC_MODES_NRF_POWER_DCDC_ENABLE as u8)
    };
    if let Err(e) = check_sd(ret) {
        warn!("[PWR] DC/DC enable failed: {}", e);
    }
}

/// Reconfigure CPU idle behaviour and the live connection for `state`.
pub fn apply(state: PowerState) -> Result<(), Error> {
    let profile = state.profile();
    let mode = if profile.low_power_idle {
        raw::NRF_POWER_MODES_NRF_POWER_MODE_LOWPWR
    } else {
        raw::NRF_POWER_MODES_NRF_POWER_MODE_CONSTLAT
    };

    // SAFETY: plain SVC call into the enabled SoftDevice.
    let ret = unsafe { raw::sd_power_mode_set(mode as u8) };
    ble::PROFILE.signal(profile);
    info!("[PWR] -> {}", state);
    check_sd(ret)
}
