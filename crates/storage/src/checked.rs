//! Bounds-checked cell store

use crate::cell_store::{validate_length, CellStore};
use fastlog_core::Result;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cells in a boxed slice of atomics, indexed with bounds checks
pub struct CheckedCells {
    cells: Box<[AtomicU64]>,
    mask: u64,
}

impl CheckedCells {
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

    #[inline]
    fn cell(&self, position: u64) -> &AtomicU64 {
        &self.cells[(position & self.mask) as usize]
    }
}

impl CellStore for CheckedCells {
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

impl std::fmt::Debug for CheckedCells {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckedCells")
            .field("length", &self.cells.len())
            .finish()
    }
}
