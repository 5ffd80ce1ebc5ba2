//! Advertising and scan-response payloads for a BLE HID keyboard.

use heapless::Vec;

/// Maximum legacy advertising payload.
pub const ADV_PAYLOAD_MAX: usize = 31;

const AD_FLAGS: u8 = 0x01;
const AD_UUID16_COMPLETE: u8 = 0x03;
const AD_NAME_SHORTENED: u8 = 0x08;
const AD_NAME_COMPLETE: u8 = 0x09;
const AD_APPEARANCE: u8 = 0x19;

/// LE General Discoverable, BR/EDR not supported.
const FLAGS_GENERAL_DISC: u8 = 0x06;

/// GAP appearance: HID keyboard.
pub const APPEARANCE_KEYBOARD: u16 = 0x03C1;

/// HID service.
pub const HID_SERVICE_UUID: u16 = 0x1812;

/// Battery service.
pub const BATTERY_SERVICE_UUID: u16 = 0x180F;

/// Advertising payload, at most 31 bytes.
pub type Payload = Vec<u8, ADV_PAYLOAD_MAX>;

fn push_field(out: &mut Payload, ad_type: u8, data: &[u8]) {
    let _ = out.push(data.len() as u8 + 1);
    let _ = out.push(ad_type);
    let _ = out.extend_from_slice(data);
}

/// Flags, keyboard appearance and the service UUID list.
pub fn advertisement() -> Payload {
    let mut out = Payload::new();
    push_field(&mut out, AD_FLAGS, &[FLAGS_GENERAL_DISC]);
    push_field(&mut out, AD_APPEARANCE, &APPEARANCE_KEYBOARD.to_le_bytes());

    let hid = HID_SERVICE_UUID.to_le_bytes();
    let bas = BATTERY_SERVICE_UUID.to_le_bytes();
    push_field(&mut out, AD_UUID16_COMPLETE, &[hid[0], hid[1], bas[0], bas[1]]);
    out
}

/// Scan response carrying the device name, shortened if it does not fit.
pub fn scan_response(name: &str) -> Payload {
    let mut out = Payload::new();
    let room = ADV_PAYLOAD_MAX - 2;
    let bytes = name.as_bytes();
    if bytes.len() <= room {
        push_field(&mut out, AD_NAME_COMPLETE, bytes);
    } else {
        push_field(&mut out, AD_NAME_SHORTENED, &bytes[..room]);
    }
    out
}
