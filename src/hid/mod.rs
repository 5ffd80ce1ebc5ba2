//! HID report types served by the keyboard GATT service.

pub mod delivery;
pub mod keyboard;

pub use delivery::{PendingReport, Retry};
pub use keyboard::KeyboardReport;
