use crate::store::{MemoryId, Store};
use crate::{WASM32_MAX_PAGES, WASM_PAGE_SIZE};
use alloc::vec::Vec;
use wasmparser::MemoryType;

/// A linear memory in a [`Store`].
#[derive(Debug, Clone, Copy)]
pub struct Memory(pub(crate) MemoryId);

impl Memory {
    /// Current size in WebAssembly pages.
    pub fn size(&self, store: &Store) -> u32 {
        store.memories[self.0].size_pages() as u32
    }

    pub fn data<'a>(&self, store: &'a Store) -> &'a [u8] {
        &store.memories[self.0].data
    }

    pub fn data_mut<'a>(&self, store: &'a mut Store) -> &'a mut [u8] {
        &mut store.memories[self.0].data
    }

    /// Grow by `delta` pages, returning the previous size in pages, or
    /// `None` if the limits do not allow it.
    pub fn grow(&self, store: &mut Store, delta: u32) -> Option<u32> {
        store.memories[self.0]
            .grow(u64::from(delta))
            .map(|pages| pages as u32)
    }
}

/// Backing storage for one linear memory: a plain byte vector grown in page
/// units.
#[derive(Debug)]
pub(crate) struct MemoryData {
    pub data: Vec<u8>,
    /// Declared type, kept for import compatibility checks.
    pub ty: MemoryType,
    maximum_pages: u64,
}

impl MemoryData {
    pub fn new(ty: MemoryType) -> Self {
        let maximum_pages = ty.maximum.unwrap_or(WASM32_MAX_PAGES).min(WASM32_MAX_PAGES);
        let initial_bytes =
            crate::utils::wasm_pages_to_bytes(ty.initial).expect("validated memory size");
        Self {
            data: alloc::vec![0; initial_bytes as usize],
            ty,
            maximum_pages,
        }
    }

    #[inline]
    pub fn size_pages(&self) -> u64 {
        self.data.len() as u64 / u64::from(WASM_PAGE_SIZE)
    }

    /// Grow by `delta` pages. Returns the previous page count, or `None`
    /// when the maximum would be exceeded.
    pub fn grow(&mut self, delta: u64) -> Option<u64> {
        let old_pages = self.size_pages();
        let new_pages = old_pages.checked_add(delta)?;
        if new_pages > self.maximum_pages {
            return None;
        }
        let new_bytes = usize::try_from(new_pages * u64::from(WASM_PAGE_SIZE)).ok()?;
        self.data.resize(new_bytes, 0);
        Some(old_pages)
    }
}
