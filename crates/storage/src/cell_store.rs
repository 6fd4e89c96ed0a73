//! The cell store contract
//!
//! A cell store is a power-of-two array of 64-bit cells addressed by an
//! unbounded, monotonically growing position. `index(pos) = pos & (len - 1)`,
//! so two positions share a cell iff they differ by a multiple of the length.
//!
//! # Ordering
//!
//! | Accessor | Ordering | Used for |
//! |----------|----------|----------|
//! | `get` / `put` | Relaxed | argument cells, reclamation |
//! | `put_publish` | Release | header write at submit |
//! | `get_observe` | Acquire | header read while draining |
//!
//! Every plain write a thread performs before `put_publish` is visible to a
//! thread whose `get_observe` reads the published value.

use fastlog_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Circular array of 64-bit cells shared between producers and the drainer
pub trait CellStore: Send + Sync {
    /// Number of cells (a power of two)
    fn length(&self) -> usize;

    /// Plain read.
    fn get(&self, position: u64) -> u64;

    /// Plain write.
    fn put(&self, position: u64, value: u64);

    /// Release-ordered write; publishes every earlier write of this thread.
    fn put_publish(&self, position: u64, value: u64);

    /// Acquire-ordered read; pairs with [`CellStore::put_publish`].
    fn get_observe(&self, position: u64) -> u64;
}

/// Reject lengths that are zero or not a power of two.
pub fn validate_length(length: usize) -> Result<()> {
    if length == 0 {
        return Err(Error::config("cell store length must be > 0"));
    }
    if !length.is_power_of_two() {
        return Err(Error::config(format!(
            "cell store length {} must be a power of 2",
            length
        )));
    }
    Ok(())
}

/// Cell store implementation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStoreKind {
    /// [`crate::CheckedCells`]
    #[default]
    Checked,
    /// [`crate::UncheckedCells`]
    Unchecked,
    /// [`crate::MappedCells`] over an anonymous mapping
    Mapped,
}

impl CellStoreKind {
    /// Build a store of this kind, every cell set to `fill`.
    pub fn build(self, length: usize, fill: u64) -> Result<Box<dyn CellStore>> {
        Ok(match self {
            CellStoreKind::Checked => Box::new(crate::CheckedCells::with_fill(length, fill)?),
            CellStoreKind::Unchecked => {
                Box::new(crate::UncheckedCells::with_fill(length, fill)?)
            }
            CellStoreKind::Mapped => Box::new(crate::MappedCells::anonymous(length, fill)?),
        })
    }
}
