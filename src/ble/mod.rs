//! Bluetooth Low Energy subsystem.
//!
//! This module drives the Nordic SoftDevice S140 in **Peripheral** role:
//!
//! 1. **Advertising** - connectable advertising as a HID keyboard until a
//!    host connects, restarted after every disconnect.
//! 2. **HID Server** - the HID-over-GATT service that carries keystrokes.
//! 3. **Bonder** - Just Works pairing with keys persisted to flash.
//!
//! Advertising payloads are built by `pony_keeb::ble::adv_data`, which
//! shares this directory but is compiled into the host-tested library.
//!
//! The control loop in `main.rs` talks to the connection task only
//! through the statics below: it reads the link flag, queues keyboard
//! reports and requests connection parameter changes.

pub mod bonder;
pub mod hid_service;
pub mod peripheral;

use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use nrf_softdevice::{raw, Softdevice};
use pony_keeb::config::{PowerProfile, DEVICE_NAME};
use pony_keeb::hid::KeyboardReport;

/// Reports queued while the host catches up; a key pulse uses two.
pub const REPORT_QUEUE_DEPTH: usize = 8;

/// True while a host is connected.
static LINK_UP: AtomicBool = AtomicBool::new(false);

/// Keyboard reports waiting to be notified to the host.
pub static REPORTS: Channel<CriticalSectionRawMutex, KeyboardReport, REPORT_QUEUE_DEPTH> =
    Channel::new();

/// Latest power profile requested for the live connection.
pub static PROFILE: Signal<CriticalSectionRawMutex, PowerProfile> = Signal::new();

/// Raised when the host enables input report notifications.
static SUBSCRIBED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

pub fn is_connected() -> bool {
    LINK_UP.load(Ordering::Acquire)
}

fn set_connected(up: bool) {
    LINK_UP.store(up, Ordering::Release);
}

/// Configure and enable the SoftDevice for a single peripheral link.
pub fn enable_softdevice() -> &'static mut Softdevice {
    let config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 64 }),
        gatts_attr_tab_size: Some(raw::ble_gatts_cfg_attr_tab_size_t {
            attr_tab_size: raw::BLE_GATTS_ATTR_TAB_SIZE_DEFAULT,
        }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        gap_device_name: Some(raw::ble_gap_cfg_device_name_t {
            p_value: DEVICE_NAME.as_ptr() as _,
            current_len: DEVICE_NAME.len() as u16,
            max_len: DEVICE_NAME.len() as u16,
            // SAFETY: an all-zero security mode is "no access", which keeps
            // the name read-only for the host.
            write_perm: unsafe { mem::zeroed() },
            _bitfield_1: raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    };

    Softdevice::enable(&config)
}

#[embassy_executor::task]
pub async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}
