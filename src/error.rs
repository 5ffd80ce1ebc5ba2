//! Firmware error type.
//!
//! We avoid `alloc` - all error variants carry only fixed-size data.
//! Implements `defmt::Format` for efficient on-target logging.

use defmt::Format;

/// Top-level error type used by the firmware tasks.
#[derive(Debug, Format)]
pub enum Error {
    // BLE
    /// The SoftDevice returned a BLE-level error.
    Ble(BleError),

    // Storage
    /// Flash read/write/erase failed.
    Storage,

    // Generic
    /// Buffer too small for the requested operation.
    BufferOverflow,
}

/// Subset of BLE errors we propagate (keeps the enum `Copy`-friendly).
#[derive(Debug, Clone, Copy, Format)]
pub enum BleError {
    /// Raw NRF error code returned by a SoftDevice call.
    Raw(u32),
    /// Advertising could not start or timed out.
    AdvertiseFailed,
    /// Input report notification failed.
    NotifyFailed,
    /// Connection parameter update was rejected.
    ConnParamsFailed,
}

// Convenience conversions

impl From<BleError> for Error {
    fn from(e: BleError) -> Self {
        Error::Ble(e)
    }
}

/// Map an NRF return code to `Ok(())` or `BleError::Raw`.
pub fn check_sd(ret: u32) -> Result<(), Error> {
    if ret == nrf_softdevice::raw::NRF_SUCCESS {
        Ok(())
    } else {
        Err(BleError::Raw(ret).into())
    }
}
