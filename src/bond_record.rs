//! Bond records and the in-memory bond table persisted to flash.
//!
//! Storage layout of the table (one `sequential-storage` map item):
//! ```text
//! [1 count][count × BOND_RECORD_SIZE record bytes]
//! ```
//! Record layout:
//! ```text
//! [2 ediv LE][8 rand][16 ltk][1 ltk flags][16 irk][1 addr type][6 addr]
//! [1 sys attrs len][SYS_ATTRS_MAX sys attrs]
//! ```
//!
//! The system attributes are the SoftDevice's opaque blob of CCCD values
//! the host wrote (notification enables). Restoring them on reconnect lets
//! the first report go out before the host rewrites the CCCD.

use heapless::Vec;

use crate::config::MAX_BONDS;

/// Capacity for the GATT system attributes of one host.
pub const SYS_ATTRS_MAX: usize = 62;

/// Serialized size of one [`BondRecord`].
pub const BOND_RECORD_SIZE: usize = 2 + 8 + 16 + 1 + 16 + 1 + 6 + 1 + SYS_ATTRS_MAX;

/// Serialized size of a full [`BondTable`].
pub const BOND_TABLE_SIZE: usize = 1 + MAX_BONDS * BOND_RECORD_SIZE;

/// Keys exchanged with one bonded host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BondRecord {
    /// Encrypted diversifier of the master id.
    pub ediv: u16,
    /// Random number of the master id.
    pub rand: [u8; 8],
    /// Long-term key.
    pub ltk: [u8; 16],
    /// LTK flags (authenticated / LESC bits).
    pub ltk_flags: u8,
    /// Identity resolution key of the host.
    pub irk: [u8; 16],
    /// Address type of the host's identity address.
    pub addr_type: u8,
    /// Identity address.
    pub addr: [u8; 6],
    sys_attrs_len: u8,
    sys_attrs: [u8; SYS_ATTRS_MAX],
}

impl Default for BondRecord {
    fn default() -> Self {
        Self {
            ediv: 0,
            rand: [0; 8],
            ltk: [0; 16],
            ltk_flags: 0,
            irk: [0; 16],
            addr_type: 0,
            addr: [0; 6],
            sys_attrs_len: 0,
            sys_attrs: [0; SYS_ATTRS_MAX],
        }
    }
}

impl BondRecord {
    /// Stored system attributes, `None` until the host wrote a CCCD.
    pub fn sys_attrs(&self) -> Option<&[u8]> {
        let len = usize::from(self.sys_attrs_len);
        (len > 0).then(|| &self.sys_attrs[..len])
    }

    /// Replace the system attributes. Returns `true` if they changed.
    ///
    /// An oversized blob clears them: a partial blob is rejected by the
    /// SoftDevice anyway.
    pub fn set_sys_attrs(&mut self, attrs: &[u8]) -> bool {
        let attrs = if attrs.len() > SYS_ATTRS_MAX { &[][..] } else { attrs };
        if self.sys_attrs().unwrap_or(&[]) == attrs {
            return false;
        }
        self.sys_attrs = [0; SYS_ATTRS_MAX];
        self.sys_attrs[..attrs.len()].copy_from_slice(attrs);
        self.sys_attrs_len = attrs.len() as u8;
        true
    }

    pub fn same_master(&self, ediv: u16, rand: &[u8; 8]) -> bool {
        self.ediv == ediv && &self.rand == rand
    }

    /// Serialize to bytes for flash storage.
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < BOND_RECORD_SIZE {
            return 0;
        }
        buf[0..2].copy_from_slice(&self.ediv.to_le_bytes());
        buf[2..10].copy_from_slice(&self.rand);
        buf[10..26].copy_from_slice(&self.ltk);
        buf[26] = self.ltk_flags;
        buf[27..43].copy_from_slice(&self.irk);
        buf[43] = self.addr_type;
        buf[44..50].copy_from_slice(&self.addr);
        buf[50] = self.sys_attrs_len;
        buf[51..BOND_RECORD_SIZE].copy_from_slice(&self.sys_attrs);
        BOND_RECORD_SIZE
    }

    /// Deserialize from bytes.
    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < BOND_RECORD_SIZE {
            return None;
        }
        let mut record = Self {
            ediv: u16::from_le_bytes([data[0], data[1]]),
            ltk_flags: data[26],
            addr_type: data[43],
            ..Self::default()
        };
        record.rand.copy_from_slice(&data[2..10]);
        record.ltk.copy_from_slice(&data[10..26]);
        record.irk.copy_from_slice(&data[27..43]);
        record.addr.copy_from_slice(&data[44..50]);
        // A corrupt length only loses the CCCD state, not the keys.
        if usize::from(data[50]) <= SYS_ATTRS_MAX {
            record.sys_attrs_len = data[50];
            record.sys_attrs.copy_from_slice(&data[51..BOND_RECORD_SIZE]);
        }
        Some(record)
    }
}

/// Bounded list of bonds, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BondTable {
    records: Vec<BondRecord, MAX_BONDS>,
    /// True if the table differs from flash.
    dirty: bool,
}

impl BondTable {
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn iter(&self) -> impl Iterator<Item = &BondRecord> {
        self.records.iter()
    }

    /// Add or refresh a bond. Returns `true` if an old bond was evicted.
    pub fn upsert(&mut self, record: BondRecord) -> bool {
        self.dirty = true;

        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.same_master(record.ediv, &record.rand) || r.addr == record.addr)
        {
            *existing = record;
            return false;
        }

        let evicted = self.records.is_full();
        if evicted {
            self.records.remove(0);
        }
        let _ = self.records.push(record);
        evicted
    }

    pub fn find_by_master(&self, ediv: u16, rand: &[u8; 8]) -> Option<&BondRecord> {
        self.records.iter().find(|r| r.same_master(ediv, rand))
    }

    /// First bond accepted by `matches`.
    pub fn find(&self, matches: impl FnMut(&&BondRecord) -> bool) -> Option<&BondRecord> {
        self.records.iter().find(matches)
    }

    /// Store the system attributes of the first bond accepted by `matches`.
    ///
    /// Returns `true` if the table changed and needs persisting.
    pub fn store_sys_attrs(
        &mut self,
        mut matches: impl FnMut(&BondRecord) -> bool,
        attrs: &[u8],
    ) -> bool {
        let Some(record) = self.records.iter_mut().find(|r| matches(r)) else {
            return false;
        };
        let changed = record.set_sys_attrs(attrs);
        self.dirty |= changed;
        changed
    }

    /// Forget every bond.
    pub fn clear(&mut self) {
        self.dirty = !self.records.is_empty();
        self.records.clear();
    }

    /// Serialize all records to a byte buffer.
    pub fn serialize_all(&self, buf: &mut [u8]) -> usize {
        if buf.len() < 1 + self.records.len() * BOND_RECORD_SIZE {
            return 0;
        }

        buf[0] = self.records.len() as u8;
        let mut offset = 1;
        for record in &self.records {
            offset += record.serialize(&mut buf[offset..]);
        }
        offset
    }

    /// Replace the table with the records found in `data`.
    ///
    /// Truncated trailing records are dropped; the result is clean.
    pub fn load(&mut self, data: &[u8]) {
        self.records.clear();
        self.dirty = false;

        let Some((&count, mut rest)) = data.split_first() else {
            return;
        };

        for _ in 0..count {
            let Some(record) = BondRecord::deserialize(rest) else {
                break;
            };
            if self.records.push(record).is_err() {
                break;
            }
            rest = &rest[BOND_RECORD_SIZE..];
        }
    }
}
