//! Cell store backed by a memory mapping
//!
//! The cells live outside the normal allocator: in an anonymous mapping for
//! an off-heap ring, or in a shared file mapping when the ring contents
//! should be inspectable from outside the process.

use crate::cell_store::{validate_length, CellStore};
use fastlog_core::{Error, Result};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::mem::size_of;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Cells inside a `memmap2` mapping
pub struct MappedCells {
    // Keeps the mapping alive for `cells`.
    map: MmapMut,
    cells: *const AtomicU64,
    length: usize,
    mask: u64,
}

// SAFETY: `cells` points into `map`, which is owned by this struct and never
// remapped; every access goes through `AtomicU64`.
unsafe impl Send for MappedCells {}
unsafe impl Sync for MappedCells {}

impl MappedCells {
    /// Map `length` cells anonymously, every cell set to `fill`.
    pub fn anonymous(length: usize, fill: u64) -> Result<Self> {
        validate_length(length)?;
        let map = MmapMut::map_anon(byte_len(length)?)?;
        Ok(Self::from_map(map, length, fill))
    }

    /// Map `length` cells onto the file at `path`, creating or resizing it.
    ///
    /// Existing content is overwritten with `fill`.
    pub fn open(path: impl AsRef<Path>, length: usize, fill: u64) -> Result<Self> {
        validate_length(length)?;
        let bytes = byte_len(length)?;
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(bytes as u64)?;

        // SAFETY: the file was just sized to `bytes`; callers must not truncate
        // it while the mapping is alive.
        let map = unsafe { MmapMut::map_mut(&file)? };
        debug!(path = %path.display(), length, "mapped cell store file");
        Ok(Self::from_map(map, length, fill))
    }

    fn from_map(mut map: MmapMut, length: usize, fill: u64) -> Self {
        // Mappings are page aligned, which satisfies AtomicU64 alignment.
        let cells = map.as_mut_ptr() as *const AtomicU64;
        let store = Self {
            map,
            cells,
            length,
            mask: (length - 1) as u64,
        };
        for position in 0..length as u64 {
            store.put(position, fill);
        }
        store
    }

    /// Flush a file-backed mapping to disk (no-op for anonymous maps).
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }

    #[inline(always)]
    fn cell(&self, position: u64) -> &AtomicU64 {
        let index = (position & self.mask) as usize;
        debug_assert!(index < self.length);
        // SAFETY: index < length and the mapping holds `length` cells.
        unsafe { &*self.cells.add(index) }
    }
}

fn byte_len(length: usize) -> Result<usize> {
    length
        .checked_mul(size_of::<u64>())
        .ok_or_else(|| Error::config(format!("cell store length {} overflows", length)))
}

impl CellStore for MappedCells {
    #[inline]
    fn length(&self) -> usize {
        self.length
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

impl std::fmt::Debug for MappedCells {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedCells")
            .field("length", &self.length)
            .finish()
    }
}
