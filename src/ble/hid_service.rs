//! HID-over-GATT server: the keyboard side of HOGP.
//!
//! Exposes:
//! 1. HID Service (0x1812) with a single boot-compatible keyboard input
//!    report, the report map and the control point.
//! 2. Battery Service (0x180F), which hosts expect next to HID.

use defmt::{debug, info};
use nrf_softdevice::ble::Connection;
use pony_keeb::hid::KeyboardReport;

use crate::error::{BleError, Error};

/// nrf-softdevice GATT service for the HID keyboard.
///
/// The `#[nrf_softdevice::gatt_service]` macro generates registration,
/// write events and notify helpers for the listed characteristics.
#[nrf_softdevice::gatt_service(uuid = "1812")]
pub struct HidService {
    /// HID Information - bcdHID 1.11, no country code, remote wake + normally connectable.
    #[characteristic(uuid = "2a4a", read, value = "pony_keeb::hid::keyboard::HID_INFORMATION")]
    pub hid_info: [u8; 4],

    /// Report Map - the keyboard report descriptor.
    #[characteristic(uuid = "2a4b", read, value = "pony_keeb::hid::keyboard::KEYBOARD_REPORT_MAP")]
    pub report_map: [u8; pony_keeb::hid::keyboard::KEYBOARD_REPORT_MAP_LEN],

    /// HID Control Point - suspend / exit suspend from the host.
    #[characteristic(uuid = "2a4c", write_without_response)]
    pub control_point: u8,

    /// Protocol Mode - 0 = Boot Protocol, 1 = Report Protocol.
    #[characteristic(uuid = "2a4e", read, write_without_response, value = "1")]
    pub protocol_mode: u8,

    /// Input Report (no report ID, type Input) - keystrokes are notified here.
    #[characteristic(uuid = "2a4d", security = "JustWorks", read, notify)]
    #[descriptor(uuid = "2908", security = "JustWorks", value = "[0, 1]")]
    pub input_report: [u8; 8],
}

impl HidService {
    pub fn on_event(&self, event: HidServiceEvent) {
        match event {
            HidServiceEvent::ControlPointWrite(value) => {
                info!("[HID] control point: {}", if value == 0 { "suspend" } else { "exit suspend" });
            }
            HidServiceEvent::ProtocolModeWrite(mode) => {
                info!("[HID] protocol mode set to {}", mode);
            }
            HidServiceEvent::InputReportCccdWrite { notifications } => {
                info!("[HID] input report notifications: {}", notifications);
            }
        }
    }

    /// Notify one keyboard report to the connected host.
    pub fn send(&self, conn: &Connection, report: &KeyboardReport) -> Result<(), Error> {
        let bytes = report.to_bytes();
        debug!("[HID] report {:02x}", bytes);
        self.input_report_notify(conn, &bytes)
            .map_err(|_| Error::Ble(BleError::NotifyFailed))
    }
}

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    #[characteristic(uuid = "2a19", read, notify, value = "100")]
    pub battery_level: u8,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub bas: BatteryService,
    pub hid: HidService,
}
