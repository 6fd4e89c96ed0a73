//! Cell store without bounds checks
//!
//! Same layout as [`crate::CheckedCells`]. Positions are masked before every
//! access, so the index is always below the length and the bounds check the
//! checked store performs is redundant.

use crate::cell_store::{validate_length, CellStore};
use fastlog_core::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cells in a boxed slice of atomics, indexed without bounds checks
pub struct UncheckedCells {
    cells: Box<[AtomicU64]>,
    mask: u64,
}

impl UncheckedCells {
    /// Create a zero-filled store.
    pub fn new(length: usize) -> Result<Self> {
        Self::with_fill(length, 0)
    }

    /// Create a store with every cell set to `fill`.
    pub fn with_fill(length: usize, fill: u64) -> Result<Self> {
        validate_length(length)?;
        let cells = (0..length)
            .map(|_| AtomicU64::new(fill))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            cells,
            mask: (length - 1) as u64,
        })
    }

    #[inline(always)]
    fn cell(&self, position: u64) -> &AtomicU64 {
        let index = (position & self.mask) as usize;
        debug_assert!(index < self.cells.len());
        // SAFETY: mask == len - 1 with len a power of two, so index < len.
        unsafe { self.cells.get_unchecked(index) }
    }
}

impl CellStore for UncheckedCells {
    #[inline]
    fn length(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    fn get(&self, position: u64) -> u64 {
        self.cell(position).load(Ordering::Relaxed)
    }

    #[inline]
    fn put(&self, position: u64, value: u64) {
        self.cell(position).store(value, Ordering::Relaxed)
    }

    #[inline]
    fn put_publish(&self, position: u64, value: u64) {
        self.cell(position).store(value, Ordering::Release)
    }

    #[inline]
    fn get_observe(&self, position: u64) -> u64 {
        self.cell(position).load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for UncheckedCells {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UncheckedCells")
            .field("length", &self.cells.len())
            .finish()
    }
}
