use crate::store::{Store, TableId};
use alloc::vec::Vec;
use wasmparser::TableType;

/// A table in a [`Store`].
#[derive(Debug, Clone, Copy)]
pub struct Table(pub(crate) TableId);

impl Table {
    /// Current size in elements.
    pub fn size(&self, store: &Store) -> u32 {
        store.tables[self.0].elements.len() as u32
    }
}

/// Backing storage for one table.
///
/// Elements are raw 64-bit reference slots: funcref handles or externref
/// values, with zero as null.
#[derive(Debug)]
pub(crate) struct TableData {
    pub elements: Vec<u64>,
    /// Declared type, kept for import compatibility checks.
    pub ty: TableType,
    maximum: u64,
}

impl TableData {
    pub fn new(ty: TableType, init: u64) -> Self {
        let maximum = ty.maximum.unwrap_or(u64::from(u32::MAX));
        Self {
            elements: alloc::vec![init; ty.initial as usize],
            ty,
            maximum,
        }
    }

    /// Grow by `delta` elements filled with `init`. Returns the previous
    /// element count, or `None` when the maximum would be exceeded.
    pub fn grow(&mut self, delta: u32, init: u64) -> Option<u32> {
        let old_len = self.elements.len() as u64;
        let new_len = old_len.checked_add(u64::from(delta))?;
        if new_len > self.maximum || new_len > u64::from(u32::MAX) {
            return None;
        }
        self.elements.resize(new_len as usize, init);
        Some(old_len as u32)
    }
}
