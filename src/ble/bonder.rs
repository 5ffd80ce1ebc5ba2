//! Pairing and bonding for the peripheral role.
//!
//! Keys live in a [`BondTable`]; every new bond is handed to the storage
//! task so the host reconnects encrypted after a restart.  The GATT
//! system attributes (the host's CCCD writes) are kept with the bond, so
//! notifications are enabled again as soon as the link is encrypted.

use core::cell::RefCell;

use defmt::{info, warn};
use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
use nrf_softdevice::ble::{
    gatt_server, Address, AddressType, Connection, EncryptionInfo, IdentityKey,
    IdentityResolutionKey, MasterId, SecurityMode,
};
use nrf_softdevice::raw;
use pony_keeb::bond_record::{BondRecord, BondTable, SYS_ATTRS_MAX};

use crate::storage::{StorageRequest, REQUESTS};

pub struct Bonder {
    table: RefCell<BondTable>,
}

impl Bonder {
    pub const fn new() -> Self {
        Self {
            table: RefCell::new(BondTable::new()),
        }
    }

    /// Copy of the table for the storage task to work on.
    pub fn snapshot(&self) -> BondTable {
        self.table.borrow().clone()
    }

    pub fn restore(&self, table: BondTable) {
        *self.table.borrow_mut() = table;
    }

    /// Clear the dirty flag after `saved` reached flash, unless a bond
    /// arrived while the write was in progress.
    pub fn mark_persisted(&self, saved: &BondTable) {
        let mut table = self.table.borrow_mut();
        if table.iter().eq(saved.iter()) {
            table.mark_clean();
        }
    }

    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }

    pub fn bond_count(&self) -> usize {
        self.table.borrow().len()
    }

    /// Capture the system attributes of `conn` into its bond.
    ///
    /// Called by the SoftDevice glue on disconnect and by the peripheral
    /// when the host enables notifications, since System OFF drops the link
    /// without a disconnect event.
    pub fn store_sys_attrs(&self, conn: &Connection) {
        let mut buf = [0u8; SYS_ATTRS_MAX];
        let len = match gatt_server::get_sys_attrs(conn, &mut buf) {
            Ok(len) => len,
            Err(e) => {
                warn!("[BLE] reading system attributes failed: {:?}", defmt::Debug2Format(&e));
                return;
            }
        };

        let peer = conn.peer_address();
        let changed = self
            .table
            .borrow_mut()
            .store_sys_attrs(|r| identity_key(r).is_match(peer), &buf[..len]);
        if changed {
            info!("[BLE] system attributes updated ({} bytes)", len);
            if REQUESTS.try_send(StorageRequest::Persist).is_err() {
                warn!("[BLE] Storage queue full - system attributes kept in RAM only");
            }
        }
    }
}

fn address_type_code(addr_type: AddressType) -> u8 {
    match addr_type {
        AddressType::Public => 0,
        AddressType::RandomStatic => 1,
        AddressType::RandomPrivateResolvable => 2,
        AddressType::RandomPrivateNonResolvable => 3,
        AddressType::Anonymous => 4,
    }
}

fn address_type_from_code(code: u8) -> AddressType {
    match code {
        0 => AddressType::Public,
        2 => AddressType::RandomPrivateResolvable,
        3 => AddressType::RandomPrivateNonResolvable,
        4 => AddressType::Anonymous,
        _ => AddressType::RandomStatic,
    }
}

fn identity_key(record: &BondRecord) -> IdentityKey {
    IdentityKey {
        irk: IdentityResolutionKey::from_raw(raw::ble_gap_irk_t { irk: record.irk }),
        addr: Address::new(address_type_from_code(record.addr_type), record.addr),
    }
}

fn to_record(master_id: MasterId, key: EncryptionInfo, peer_id: IdentityKey) -> BondRecord {
    // A fresh bond starts without system attributes.
    let mut record = BondRecord::default();
    record.ediv = master_id.ediv;
    record.rand = master_id.rand;
    record.ltk = key.ltk;
    record.ltk_flags = key.flags;
    record.irk = peer_id.irk.as_raw().irk;
    record.addr_type = address_type_code(peer_id.addr.address_type());
    record.addr = peer_id.addr.bytes();
    record
}

impl SecurityHandler for Bonder {
    fn io_capabilities(&self) -> IoCapabilities {
        IoCapabilities::None
    }

    fn can_bond(&self, _conn: &Connection) -> bool {
        true
    }

    fn on_bonded(
        &self,
        _conn: &Connection,
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    ) {
        let evicted = self
            .table
            .borrow_mut()
            .upsert(to_record(master_id, key, peer_id));
        if evicted {
            warn!("[BLE] Bond table full - evicted oldest host");
        }
        info!("[BLE] Bonded with host ({} stored)", self.bond_count());

        if REQUESTS.try_send(StorageRequest::Persist).is_err() {
            warn!("[BLE] Storage queue full - bond kept in RAM only");
        }
    }

    fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
        self.table
            .borrow()
            .find_by_master(master_id.ediv, &master_id.rand)
            .map(|r| EncryptionInfo {
                ltk: r.ltk,
                flags: r.ltk_flags,
            })
    }

    fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
        info!("[BLE] security mode updated: {}", mode);
    }

    fn save_sys_attrs(&self, conn: &Connection) {
        self.store_sys_attrs(conn);
    }

    fn load_sys_attrs(&self, conn: &Connection) {
        let peer = conn.peer_address();
        let table = self.table.borrow();
        let attrs = table
            .find(|r| identity_key(r).is_match(peer))
            .and_then(BondRecord::sys_attrs);
        if attrs.is_some() {
            info!("[BLE] restoring system attributes of bonded host");
        }
        // `None` starts the host with every CCCD cleared.
        if let Err(e) = gatt_server::set_sys_attrs(conn, attrs) {
            warn!("[BLE] restoring system attributes failed: {:?}", defmt::Debug2Format(&e));
        }
    }
}
