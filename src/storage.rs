//! Persistent storage for BLE bonds.
//!
//! Uses the nRF52840's internal flash via `sequential-storage` crate
//! so that a host paired once reconnects without pairing again after a
//! deep sleep or restart.
//!
//! Storage layout:
//!   - A single map item holds the serialized `BondTable`.
//!   - The flash pages are managed by `sequential-storage` which handles
//!     wear levelling and GC; a bond reset erases the whole range.

use core::ops::Range;

use defmt::{debug, error, info};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embedded_storage_async::nor_flash::NorFlash;
use nrf_softdevice::{Flash, Softdevice};
use pony_keeb::bond_record::{BondTable, BOND_TABLE_SIZE};
use pony_keeb::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};

use crate::ble::bonder::Bonder;
use crate::error::Error;

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Key for the bond table in the map storage. Bumped whenever the record
/// layout changes; tables under an older key are ignored.
const KEY_BOND_TABLE: u8 = 0x02;

/// Scratch buffer for `sequential-storage`: item plus header overhead.
const SCRATCH_SIZE: usize = BOND_TABLE_SIZE + 32;

fn flash_range() -> Range<u32> {
    STORAGE_START..STORAGE_END
}

/// Work the storage task performs on behalf of other tasks.
#[derive(Clone, Copy, defmt::Format)]
pub enum StorageRequest {
    /// Write the bond table if it changed.
    Persist,
    /// Erase every stored bond; completion is reported on `ERASED`.
    EraseAll,
}

pub static REQUESTS: Channel<CriticalSectionRawMutex, StorageRequest, 4> = Channel::new();

/// Raised once the stored bonds are loaded into the bonder.
pub static LOADED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Raised when an `EraseAll` request finished (successfully or not).
pub static ERASED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Erase all bonds and wait until flash reflects it.
pub async fn erase_all_bonds() {
    ERASED.reset();
    REQUESTS.send(StorageRequest::EraseAll).await;
    ERASED.wait().await;
}

/// Load the bond table from flash. Missing or unreadable data leaves it empty.
pub async fn load(flash: &mut impl NorFlash, table: &mut BondTable) -> Result<(), Error> {
    let mut buf = [0u8; SCRATCH_SIZE];

    let fetched = sequential_storage::map::fetch_item::<u8, &[u8], _>(
        flash,
        flash_range(),
        &mut sequential_storage::cache::NoCache::new(),
        &mut buf,
        &KEY_BOND_TABLE,
    )
    .await;

    match fetched {
        Ok(Some(data)) => {
            table.load(data);
            info!("[STORE] Loaded {} bonds from flash", table.len());
            Ok(())
        }
        Ok(None) => {
            table.load(&[]);
            info!("[STORE] No bonds in flash");
            Ok(())
        }
        Err(e) => {
            table.load(&[]);
            error!("[STORE] Flash read error: {:?}", defmt::Debug2Format(&e));
            Err(Error::Storage)
        }
    }
}

/// Persist the bond table if it differs from flash.
pub async fn save(flash: &mut impl NorFlash, table: &mut BondTable) -> Result<(), Error> {
    if !table.is_dirty() {
        debug!("[STORE] no changes to save");
        return Ok(());
    }

    let mut buf = [0u8; SCRATCH_SIZE];
    let mut data_buf = [0u8; BOND_TABLE_SIZE];

    let len = table.serialize_all(&mut data_buf);
    if len == 0 {
        return Err(Error::BufferOverflow);
    }
    let item = &data_buf[..len];

    sequential_storage::map::store_item::<u8, &[u8], _>(
        flash,
        flash_range(),
        &mut sequential_storage::cache::NoCache::new(),
        &mut buf,
        &KEY_BOND_TABLE,
        &item,
    )
    .await
    .map_err(|e| {
        error!("[STORE] Flash write error: {:?}", defmt::Debug2Format(&e));
        Error::Storage
    })?;

    table.mark_clean();
    info!("[STORE] Saved {} bonds to flash", table.len());
    Ok(())
}

/// Erase the whole bond region.
pub async fn erase(flash: &mut impl NorFlash) -> Result<(), Error> {
    sequential_storage::erase_all(flash, flash_range())
        .await
        .map_err(|e| {
            error!("[STORE] Flash erase error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })?;
    info!("[STORE] Bond storage erased");
    Ok(())
}

/// Owns the SoftDevice flash and serializes every bond write.
#[embassy_executor::task]
pub async fn storage_task(sd: &'static Softdevice, bonder: &'static Bonder) -> ! {
    let mut flash = Flash::take(sd);

    {
        let mut table = bonder.snapshot();
        // A failed read already left the table empty.
        let _ = load(&mut flash, &mut table).await;
        bonder.restore(table);
    }
    LOADED.signal(());

    loop {
        match REQUESTS.receive().await {
            StorageRequest::Persist => {
                let mut table = bonder.snapshot();
                if save(&mut flash, &mut table).await.is_ok() {
                    bonder.mark_persisted(&table);
                }
            }
            StorageRequest::EraseAll => {
                bonder.clear();
                if erase(&mut flash).await.is_ok() {
                    bonder.mark_persisted(&BondTable::new());
                }
                ERASED.signal(());
            }
        }
    }
}
