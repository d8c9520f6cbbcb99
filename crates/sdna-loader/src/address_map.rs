//! Original address → record index.

use sdna_common::OpenHashMap;

use crate::record::RecordId;
use crate::Result;

/// Map from the address an object had in the writing process to its record.
#[derive(Debug, Default)]
pub struct AddressMap {
    map: OpenHashMap<u64, RecordId>,
    /// Addresses are cut to their low 32 bits before use.
    reduced: bool,
}

impl AddressMap {
    /// Create a map. `reduced` applies when file and memory pointer widths differ.
    pub fn new(reduced: bool) -> Self {
        Self {
            map: OpenHashMap::new(),
            reduced,
        }
    }

    #[inline]
    pub fn is_reduced(&self) -> bool {
        self.reduced
    }

    /// Canonical form of an address read from the file.
    #[inline]
    pub fn normalize(&self, address: u64) -> u64 {
        if self.reduced {
            address & 0xFFFF_FFFF
        } else {
            address
        }
    }

    /// Register a record. Returns the record already holding the address, if any.
    ///
    /// Records at address zero are never registered, since nothing can point
    /// at them.
    pub fn register(&mut self, address: u64, id: RecordId) -> Result<Option<RecordId>> {
        let address = self.normalize(address);
        if address == 0 {
            return Ok(None);
        }
        if let Some(&existing) = self.map.get(&address) {
            return Ok(Some(existing));
        }
        self.map.insert(address, id)?;
        Ok(None)
    }

    /// Look up the record for an address. Null never resolves.
    pub fn lookup(&self, address: u64) -> Option<RecordId> {
        let address = self.normalize(address);
        if address == 0 {
            return None;
        }
        self.map.get(&address).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
